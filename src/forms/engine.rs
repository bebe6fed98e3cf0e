use std::{collections::HashMap, future::Future, sync::Arc};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::{FieldRegistry, FormSchema, FormSession, SUBMIT_FAILURE_MESSAGE};
use crate::api::ApiError;

/// Identifies one subject's form within one browser session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FormKey {
    pub session_id: Uuid,
    pub subject_id: String,
}

impl FormKey {
    pub fn new(session_id: Uuid, subject_id: impl Into<String>) -> Self {
        Self {
            session_id,
            subject_id: subject_id.into(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted,
    Failed(String),
    /// Another submission for the same form had not settled; nothing was sent.
    AlreadyPending,
}

/// Owns every open form session. The lock is never held across a backend call.
#[derive(Clone)]
pub struct FormEngine {
    schema: Arc<FormSchema>,
    registry: Arc<FieldRegistry>,
    forms: Arc<Mutex<HashMap<FormKey, FormSession>>>,
}

impl FormEngine {
    pub fn new(schema: FormSchema, registry: FieldRegistry) -> Self {
        Self {
            schema: Arc::new(schema),
            registry: Arc::new(registry),
            forms: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Returns a snapshot of the form for `key` for rendering, applying an optional
    /// subsection selection first. A pending notice is handed out once. Without a
    /// selection and without prior state nothing is stored.
    pub async fn open(&self, key: &FormKey, subsection: Option<&str>) -> FormSession {
        let mut forms = self.forms.lock().await;
        let form = match subsection {
            Some(subsection) => {
                let form = forms.entry(key.clone()).or_default();
                form.select(subsection);
                form
            }
            None => match forms.get_mut(key) {
                Some(form) => form,
                None => return FormSession::default(),
            },
        };
        let snapshot = form.clone();
        form.take_notice();
        snapshot
    }

    /// Writes posted answers. Unknown names are ignored; invalid values leave the previous
    /// answer in place and record an inline error. Returns how many values were rejected.
    pub async fn record_answers<I>(&self, key: &FormKey, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut forms = self.forms.lock().await;
        let form = forms.entry(key.clone()).or_default();
        let mut rejected = 0;

        for (name, value) in entries {
            let Some(field) = self.schema.field(&name) else {
                warn!(field = %name, subject = %key.subject_id, "ignoring answer for unknown field");
                continue;
            };
            let value = value.trim().to_string();
            match self.registry.validate(field, &value) {
                Ok(()) => form.set_answer(name, value),
                Err(message) => {
                    rejected += 1;
                    form.reject_answer(name, message);
                }
            }
        }

        rejected
    }

    /// Sends the whole answer set through `send`. At most one call per form is in flight.
    pub async fn submit<F, Fut>(&self, key: &FormKey, send: F) -> SubmitOutcome
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = Result<(), ApiError>>,
    {
        let payload = {
            let mut forms = self.forms.lock().await;
            let form = forms.entry(key.clone()).or_default();
            match form.begin_submit(&key.subject_id) {
                Some(payload) => payload,
                None => return SubmitOutcome::AlreadyPending,
            }
        };

        let result = send(payload).await.map_err(|err| {
            warn!(?err, subject = %key.subject_id, "screening submission failed");
            if err.is_rejection() {
                err.user_message(SUBMIT_FAILURE_MESSAGE)
            } else {
                format!("Error submitting the form: {err}")
            }
        });

        let mut forms = self.forms.lock().await;
        if let Some(form) = forms.get_mut(key) {
            form.finish_submit(result.clone());
        }

        match result {
            Ok(()) => {
                info!(subject = %key.subject_id, "screening submitted");
                SubmitOutcome::Submitted
            }
            Err(message) => SubmitOutcome::Failed(message),
        }
    }

    /// Drops every form opened by `session_id`.
    pub async fn discard_session(&self, session_id: Uuid) {
        let mut forms = self.forms.lock().await;
        forms.retain(|key, _| key.session_id != session_id);
    }

    #[cfg(test)]
    pub async fn open_count(&self) -> usize {
        self.forms.lock().await.len()
    }
}
