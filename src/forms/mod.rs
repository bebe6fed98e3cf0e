//! Schema-driven questionnaire: selection, answers, completion and submission state.

pub mod engine;
pub mod fields;
pub mod schema;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

pub use engine::{FormEngine, FormKey, SubmitOutcome};
pub use fields::{FieldRegistry, FieldView, FieldWidget};
pub use schema::{FieldDefinition, FieldKind, FormSchema, FormSection};

pub const SUBMIT_SUCCESS_MESSAGE: &str = "Form submitted successfully!";
pub const SUBMIT_FAILURE_MESSAGE: &str = "Failed to submit the form";

/// Field name → selected value.
pub type AnswerSet = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    NoneSelected,
    SubsectionActive(String),
}

impl Selection {
    pub fn active(&self) -> Option<&str> {
        match self {
            Selection::NoneSelected => None,
            Selection::SubsectionActive(id) => Some(id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

/// A subsection is complete when every required field has a non-empty answer. A
/// subsection the schema does not know is never complete.
pub fn is_complete(schema: &FormSchema, subsection: &str, answers: &AnswerSet) -> bool {
    if !schema.has_subsection(subsection) {
        return false;
    }
    schema
        .fields(subsection)
        .iter()
        .filter(|field| field.required)
        .all(|field| answers.get(&field.name).is_some_and(|v| !v.is_empty()))
}

/// Body for `POST /api/screenings`: every answer plus `subjectId`, which always wins.
pub fn submission_payload(answers: &AnswerSet, subject_id: &str) -> Value {
    let mut body: Map<String, Value> = answers
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();
    body.insert("subjectId".to_string(), Value::String(subject_id.to_string()));
    Value::Object(body)
}

/// State of one subject's form for one browser session.
#[derive(Clone, Debug, Default)]
pub struct FormSession {
    selection: Selection,
    answers: AnswerSet,
    field_errors: BTreeMap<String, String>,
    submitting: bool,
    notice: Option<Notice>,
}

impl FormSession {
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn answer(&self, name: &str) -> Option<&str> {
        self.answers.get(name).map(String::as_str)
    }

    pub fn field_error(&self, name: &str) -> Option<&str> {
        self.field_errors.get(name).map(String::as_str)
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Navigation only; answers for other subsections are untouched.
    pub fn select(&mut self, subsection: impl Into<String>) {
        self.selection = Selection::SubsectionActive(subsection.into());
    }

    /// Overwrites any previous value for `name`.
    pub fn set_answer(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.field_errors.remove(&name);
        self.answers.insert(name, value.into());
    }

    pub fn reject_answer(&mut self, name: impl Into<String>, error: impl Into<String>) {
        self.field_errors.insert(name.into(), error.into());
    }

    pub fn is_complete(&self, schema: &FormSchema, subsection: &str) -> bool {
        is_complete(schema, subsection, &self.answers)
    }

    /// Marks a submission in flight and returns its payload, or `None` when one is
    /// already pending.
    pub fn begin_submit(&mut self, subject_id: &str) -> Option<Value> {
        if self.submitting {
            return None;
        }
        self.submitting = true;
        self.notice = None;
        Some(submission_payload(&self.answers, subject_id))
    }

    /// Settles the in-flight submission. Answers are cleared only on success.
    pub fn finish_submit(&mut self, result: Result<(), String>) {
        self.submitting = false;
        match result {
            Ok(()) => {
                self.answers.clear();
                self.field_errors.clear();
                self.notice = Some(Notice::Success(SUBMIT_SUCCESS_MESSAGE.to_string()));
            }
            Err(message) => {
                self.notice = Some(Notice::Error(message));
            }
        }
    }

    /// Returns the pending notice and forgets it, so it shows once.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }
}
