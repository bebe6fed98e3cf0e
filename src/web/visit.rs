use std::borrow::Cow;

use axum::{
    extract::{Form, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    forms::{FieldRegistry, FieldView, FormKey, FormSchema, FormSession, Notice, SubmitOutcome},
    web::{
        AppState,
        guard::{self, SignedIn},
        links,
        templates::{FlashKind, PageLayout, escape_html, render_flash, render_page},
    },
};

const SUBSECTION_PARAM: &str = "subsection";
const GOTO_PARAM: &str = "goto";

const VISIT_STYLES: &str = r#"
        .visit { display: grid; grid-template-columns: 280px 1fr; gap: 1.5rem; align-items: start; }
        .visit nav { order: -1; background: #ffffff; border: 1px solid #e2e8f0; border-radius: 12px; padding: 1rem; }
        .visit nav h4 { margin: 1rem 0 0.5rem; color: #475569; font-size: 0.85rem; text-transform: uppercase; }
        .visit nav h4:first-child { margin-top: 0; }
        .visit nav button { display: flex; gap: 0.5rem; width: 100%; padding: 0.45rem 0.6rem; border-radius: 8px; background: none; color: #0f172a; font-weight: 400; text-align: left; }
        .visit nav button:hover { background: #f1f5f9; }
        .visit nav button.active { background: #dbeafe; font-weight: 600; }
        .visit nav .done { color: #16a34a; }
        .visit nav .todo { color: #94a3b8; }
        .field-card { background: #ffffff; border: 1px solid #e2e8f0; border-radius: 10px; padding: 1rem 1.25rem; margin-bottom: 1rem; }
        .field-label { margin: 0; font-weight: 600; }
        .placeholder { color: #64748b; padding: 2rem; text-align: center; }
        .submit-bar { display: flex; justify-content: flex-end; gap: 0.75rem; margin-top: 1.5rem; }
        .submit-bar .secondary { background: #e2e8f0; color: #0f172a; }
        @media (max-width: 760px) { .visit { grid-template-columns: 1fr; } }
"#;

#[derive(Default, Deserialize)]
pub struct VisitQuery {
    pub subsection: Option<String>,
}

/// A post from the visit page: the answers shown, plus where to go next.
#[derive(Debug, Default, PartialEq)]
struct VisitPost {
    subsection: Option<String>,
    goto: Option<String>,
    answers: Vec<(String, String)>,
}

impl VisitPost {
    fn from_entries(entries: Vec<(String, String)>) -> Self {
        let mut post = VisitPost::default();
        for (name, value) in entries {
            match name.as_str() {
                SUBSECTION_PARAM => post.subsection = Some(value).filter(|v| !v.is_empty()),
                GOTO_PARAM => post.goto = Some(value).filter(|v| !v.is_empty()),
                _ => post.answers.push((name, value)),
            }
        }
        post
    }

    /// Subsection to show after the post: the sidebar target, else the current one.
    fn next_subsection(&self) -> Option<&str> {
        self.goto.as_deref().or(self.subsection.as_deref())
    }
}

pub async fn visit_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(subject_id): Path<String>,
    Query(params): Query<VisitQuery>,
) -> Response {
    let signed_in = match guard::require_session(&state, &jar).await {
        Ok(signed_in) => signed_in,
        Err(rejection) => return rejection.into_response(),
    };

    let key = FormKey::new(signed_in.id, subject_id.as_str());
    let subsection = params.subsection.as_deref().filter(|s| !s.is_empty());
    let form = state.forms().open(&key, subsection).await;

    Html(render_visit_page(
        &signed_in,
        &subject_id,
        state.forms().schema(),
        state.forms().registry(),
        &form,
    ))
    .into_response()
}

/// Saves the answers on screen, then shows the requested subsection. Sidebar navigation
/// posts here too, so switching subsections keeps every choice.
pub async fn save_answers(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(subject_id): Path<String>,
    Form(entries): Form<Vec<(String, String)>>,
) -> Response {
    let signed_in = match guard::require_session(&state, &jar).await {
        Ok(signed_in) => signed_in,
        Err(rejection) => return rejection.into_response(),
    };

    let key = FormKey::new(signed_in.id, subject_id.as_str());
    let post = VisitPost::from_entries(entries);
    record(&state, &key, &post).await;

    Redirect::to(&visit_href(&subject_id, post.next_subsection())).into_response()
}

/// Saves the answers on screen and submits the whole answer set.
pub async fn submit_visit(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(subject_id): Path<String>,
    Form(entries): Form<Vec<(String, String)>>,
) -> Response {
    let signed_in = match guard::require_session(&state, &jar).await {
        Ok(signed_in) => signed_in,
        Err(rejection) => return rejection.into_response(),
    };

    let key = FormKey::new(signed_in.id, subject_id.as_str());
    let post = VisitPost::from_entries(entries);
    record(&state, &key, &post).await;

    let api = state.api();
    let token = signed_in.token();
    let outcome = state
        .forms()
        .submit(&key, |payload| async move {
            api.submit_screening(token, &payload).await
        })
        .await;

    match &outcome {
        SubmitOutcome::Submitted => info!(subject = %subject_id, "visit submitted"),
        SubmitOutcome::Failed(message) => warn!(subject = %subject_id, %message, "visit not submitted"),
        SubmitOutcome::AlreadyPending => info!(subject = %subject_id, "ignored duplicate submit"),
    }

    Redirect::to(&visit_href(&subject_id, post.subsection.as_deref())).into_response()
}

async fn record(state: &AppState, key: &FormKey, post: &VisitPost) {
    if post.answers.is_empty() {
        return;
    }
    let rejected = state
        .forms()
        .record_answers(key, post.answers.iter().cloned())
        .await;
    if rejected > 0 {
        warn!(subject = %key.subject_id, rejected, "some answers were not accepted");
    }
}

/// Link to a subject's form page, optionally with a subsection selected.
pub fn visit_href(subject_id: &str, subsection: Option<&str>) -> String {
    match subsection {
        Some(subsection) => links::with_query(&["forms", subject_id], &[(SUBSECTION_PARAM, subsection)]),
        None => links::path(&["forms", subject_id]),
    }
}

fn render_visit_page(
    signed_in: &SignedIn,
    subject_id: &str,
    schema: &FormSchema,
    registry: &FieldRegistry,
    form: &FormSession,
) -> String {
    let active = form.selection().active();

    let sidebar = schema
        .sections()
        .iter()
        .map(|section| {
            let entries = section
                .subsections
                .iter()
                .map(|subsection| {
                    let (icon, class) = if form.is_complete(schema, subsection) {
                        ("✔", "done")
                    } else {
                        ("○", "todo")
                    };
                    format!(
                        r#"<button type="submit" name="{GOTO_PARAM}" value="{label}"{active}><span class="{class}">{icon}</span>{label}</button>"#,
                        active = if active == Some(subsection.as_str()) { r#" class="active""# } else { "" },
                        label = escape_html(subsection),
                    )
                })
                .collect::<String>();
            format!("<h4>{}</h4>{entries}", escape_html(&section.label))
        })
        .collect::<String>();

    let content = match active {
        None => r#"<p class="placeholder">Select a form from the left</p>"#.to_string(),
        Some(subsection) => {
            let fields = schema
                .fields(subsection)
                .iter()
                .enumerate()
                .map(|(index, field)| {
                    registry.render(&FieldView {
                        field,
                        position: index + 1,
                        value: form.answer(&field.name),
                        error: form.field_error(&field.name),
                    })
                })
                .collect::<String>();
            let fields = if fields.is_empty() {
                r#"<p class="placeholder">This form has no questions.</p>"#.to_string()
            } else {
                fields
            };
            format!(
                r#"<h2>{heading}</h2>
                {fields}"#,
                heading = escape_html(subsection),
            )
        }
    };

    let (submit_label, disabled) = if form.is_submitting() {
        ("Submitting...", " disabled")
    } else {
        ("Submit", "")
    };

    let flash = match form.notice() {
        Some(Notice::Success(message)) => render_flash(FlashKind::Success, message),
        Some(Notice::Error(message)) => render_flash(FlashKind::Error, message),
        None => String::new(),
    };

    let form_path = links::path(&["forms", subject_id]);
    let body = format!(
        r#"        <form class="visit" method="post" action="{save_action}">
            <input type="hidden" name="{SUBSECTION_PARAM}" value="{current}">
            <section>
                {content}
                <div class="submit-bar">
                    <button type="submit" class="secondary">Save answers</button>
                    <button type="submit" formaction="{submit_action}"{disabled}>{submit_label}</button>
                </div>
            </section>
            <nav>{sidebar}</nav>
        </form>"#,
        save_action = escape_html(&format!("{form_path}/answers")),
        submit_action = escape_html(&format!("{form_path}/submit")),
        current = escape_html(active.unwrap_or_default()),
    );

    render_page(PageLayout {
        meta_title: "Screening",
        heading: "Screening visit",
        username: &signed_in.session.display_name,
        flash_html: Cow::Owned(flash),
        body_html: Cow::Owned(body),
        extra_styles: Some(VISIT_STYLES),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use serde_json::json;
    use uuid::Uuid;

    fn signed_in() -> SignedIn {
        SignedIn {
            id: Uuid::new_v4(),
            session: Session {
                user_id: "u1".into(),
                display_name: "dana".into(),
                token: "t".into(),
                expires_at: None,
                user: json!({}),
            },
        }
    }

    fn render(form: &FormSession) -> String {
        let schema = FormSchema::builtin().unwrap();
        render_visit_page(&signed_in(), "subj-1", &schema, &FieldRegistry::standard(), form)
    }

    #[test]
    fn hrefs_encode_subsection_names() {
        assert_eq!(visit_href("subj-1", None), "/forms/subj-1");
        assert_eq!(
            visit_href("subj-1", Some("1. Date of Visit")),
            "/forms/subj-1?subsection=1.+Date+of+Visit"
        );
        assert_eq!(visit_href("a/b", None), "/forms/a%2Fb");
    }

    #[test]
    fn nothing_selected_shows_placeholder_and_open_icons() {
        let html = render(&FormSession::default());
        assert!(html.contains("Select a form from the left"));
        assert!(html.contains("○</span>1. Date of Visit"));
        assert!(!html.contains("✔"));
    }

    #[test]
    fn selected_subsection_renders_fields_and_completion() {
        let mut form = FormSession::default();
        form.select("1. Date of Visit");
        form.set_answer("visitPerformed", "Yes");
        let html = render(&form);

        assert!(html.contains("<h2>1. Date of Visit</h2>"));
        assert!(html.contains("1. Was the Visit Performed?"));
        assert!(html.contains(r#"value="Yes" checked"#));
        assert!(html.contains("✔</span>1. Date of Visit"));
        assert!(html.contains("○</span>2. Eligibility Criteria"));
        assert!(html.contains(r#"action="/forms/subj-1/answers""#));
    }

    #[test]
    fn submit_and_navigation_post_the_answers_form() {
        let mut form = FormSession::default();
        form.select("1. Date of Visit");
        let html = render(&form);

        let form_start = html.find(r#"<form class="visit""#).unwrap();
        let form_end = html[form_start..].find("</form>").unwrap() + form_start;
        let inside = &html[form_start..form_end];
        assert_eq!(html.matches("<form").count(), 2, "logout form plus the visit form");
        assert!(inside.contains(r#"name="visitPerformed""#));
        assert!(inside.contains(r#"formaction="/forms/subj-1/submit""#));
        assert!(inside.contains(
            r#"<button type="submit" name="goto" value="2. Eligibility Criteria">"#
        ));
        assert!(inside.contains(r#"name="subsection" value="1. Date of Visit""#));
        // Enter in a text field triggers the first submit button, which must be the save.
        assert!(inside.find("Save answers").unwrap() < inside.find(r#"name="goto""#).unwrap());
    }

    #[test]
    fn posted_entries_split_into_answers_and_target() {
        let post = VisitPost::from_entries(vec![
            ("subsection".into(), "1. Date of Visit".into()),
            ("visitPerformed".into(), "Yes".into()),
            ("goto".into(), "2. Eligibility Criteria".into()),
        ]);
        assert_eq!(post.answers, vec![("visitPerformed".to_string(), "Yes".to_string())]);
        assert_eq!(post.next_subsection(), Some("2. Eligibility Criteria"));

        let post = VisitPost::from_entries(vec![
            ("subsection".into(), "1. Date of Visit".into()),
            ("goto".into(), String::new()),
        ]);
        assert_eq!(post.next_subsection(), Some("1. Date of Visit"));
        assert!(post.answers.is_empty());
    }

    #[test]
    fn pending_submission_disables_button() {
        let mut form = FormSession::default();
        form.begin_submit("subj-1");
        let html = render(&form);
        assert!(html.contains(
            r#"<button type="submit" formaction="/forms/subj-1/submit" disabled>Submitting...</button>"#
        ));
    }

    #[test]
    fn notice_is_rendered_as_flash() {
        let mut form = FormSession::default();
        form.begin_submit("subj-1");
        form.finish_submit(Err("Failed to submit the form".into()));
        let html = render(&form);
        assert!(html.contains(r#"<div class="flash error">Failed to submit the form</div>"#));
    }
}
