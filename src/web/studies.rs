use std::borrow::Cow;

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info};

use crate::{
    api::{NewStudy, Study},
    web::{
        AppState,
        collections::{self, ListQuery, ModalState},
        guard::{self, SignedIn},
        links,
        templates::{
            PageLayout, escape_html, render_choices, render_input, render_modal, render_page,
        },
        validation::{self, FieldErrors},
    },
};

pub const STUDY_TEMPLATES: &[&str] = &[
    "Randomized trial",
    "Observational study",
    "Registry / Biobank",
    "Survey study",
    "All forms",
    "No template",
];
pub const STUDY_TYPES: &[&str] = &["Production", "Test", "Example"];
const DEFAULT_COUNTRY: &str = "Netherlands";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StudyOrder {
    NewestFirst,
    OldestFirst,
}

impl StudyOrder {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("oldest") => StudyOrder::OldestFirst,
            _ => StudyOrder::NewestFirst,
        }
    }
}

pub async fn studies_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<ListQuery>,
) -> Response {
    let signed_in = match guard::require_session(&state, &jar).await {
        Ok(signed_in) => signed_in,
        Err(rejection) => return rejection.into_response(),
    };

    let studies = match collections::load_collection(&state, &signed_in, "studies", || {
        state.api().list_studies(signed_in.token())
    })
    .await
    {
        Ok(studies) => studies,
        Err(response) => return response,
    };

    let modal = params.modal_open().then(|| {
        ModalState::with_values(NewStudy {
            country: DEFAULT_COUNTRY.to_string(),
            ..NewStudy::default()
        })
    });

    Html(render_studies_page(&signed_in, studies, &params, modal.as_ref())).into_response()
}

pub async fn create_study(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<NewStudy>,
) -> Response {
    let signed_in = match guard::require_session(&state, &jar).await {
        Ok(signed_in) => signed_in,
        Err(rejection) => return rejection.into_response(),
    };

    let study = normalize_study(form);
    let errors = validate_study(&study);
    if !errors.is_empty() {
        let modal = ModalState {
            values: study,
            errors,
            message: None,
        };
        return rerender(&state, &signed_in, StatusCode::UNPROCESSABLE_ENTITY, modal).await;
    }

    match state.api().create_study(signed_in.token(), &study).await {
        Ok(()) => {
            info!(study = %study.study_name, "study created");
            Redirect::to("/studies?status=created").into_response()
        }
        Err(err) if err.is_unauthorized() => collections::session_expired(&state, &signed_in).await,
        Err(err) => {
            error!(?err, "failed to create study");
            let (status, message) = collections::create_failure(&err, "Error creating study.");
            let modal = ModalState {
                values: study,
                errors: FieldErrors::new(),
                message: Some(message),
            };
            rerender(&state, &signed_in, status, modal).await
        }
    }
}

async fn rerender(
    state: &AppState,
    signed_in: &SignedIn,
    status: StatusCode,
    modal: ModalState<NewStudy>,
) -> Response {
    let studies = match collections::load_collection(state, signed_in, "studies", || {
        state.api().list_studies(signed_in.token())
    })
    .await
    {
        Ok(studies) => studies,
        Err(response) => return response,
    };
    let page = render_studies_page(signed_in, studies, &ListQuery::default(), Some(&modal));
    (status, Html(page)).into_response()
}

fn normalize_study(form: NewStudy) -> NewStudy {
    let country = form.country.trim();
    NewStudy {
        study_name: form.study_name.trim().to_string(),
        trial_registry_id: form.trial_registry_id.trim().to_string(),
        site_name: form.site_name.trim().to_string(),
        abbreviation: form.abbreviation.trim().to_string(),
        country: if country.is_empty() {
            DEFAULT_COUNTRY.to_string()
        } else {
            country.to_string()
        },
        template: form.template,
        study_type: form.study_type,
    }
}

fn validate_study(study: &NewStudy) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::require(&mut errors, "studyName", &study.study_name, "Study name is required");
    if !STUDY_TEMPLATES.contains(&study.template.as_str()) {
        errors.push(("template", "Choose a template".to_string()));
    }
    if !STUDY_TYPES.contains(&study.study_type.as_str()) {
        errors.push(("studyType", "Choose a study type".to_string()));
    }
    errors
}

/// Applies the search box and ordering to the fetched list.
fn arrange_studies(mut studies: Vec<Study>, query: Option<&str>, order: StudyOrder) -> Vec<Study> {
    if let Some(needle) = query.map(str::trim).filter(|q| !q.is_empty()) {
        let needle = needle.to_lowercase();
        studies.retain(|study| {
            study
                .study_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        });
    }

    // Studies without a creation date go last either way.
    studies.sort_by(|a, b| match (a.created_at, b.created_at) {
        (Some(a), Some(b)) => match order {
            StudyOrder::NewestFirst => b.cmp(&a),
            StudyOrder::OldestFirst => a.cmp(&b),
        },
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    studies
}

fn render_studies_page(
    signed_in: &SignedIn,
    studies: Vec<Study>,
    params: &ListQuery,
    modal: Option<&ModalState<NewStudy>>,
) -> String {
    let order = StudyOrder::parse(params.order.as_deref());
    let studies = arrange_studies(studies, params.q.as_deref(), order);

    let rows = if studies.is_empty() {
        r#"<p class="empty">No studies found.</p>"#.to_string()
    } else {
        studies
            .iter()
            .map(|study| {
                let name = study
                    .study_name
                    .as_deref()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or("Untitled study");
                let detail = [
                    study.study_type.as_deref(),
                    study.template.as_deref(),
                    study.country.as_deref(),
                ]
                .into_iter()
                .flatten()
                .filter(|part| !part.is_empty())
                .map(escape_html)
                .collect::<Vec<_>>()
                .join(" • ");
                format!(
                    r#"<a class="entity-row" href="{href}"><strong>{name}</strong><span>○ Not Live{sep}{detail}</span></a>"#,
                    href = escape_html(&links::path(&["sites", &study.id])),
                    name = escape_html(name),
                    sep = if detail.is_empty() { "" } else { " • " },
                )
            })
            .collect::<String>()
    };

    let (newest_selected, oldest_selected) = match order {
        StudyOrder::NewestFirst => (" selected", ""),
        StudyOrder::OldestFirst => ("", " selected"),
    };

    let modal_html = modal.map(render_study_modal).unwrap_or_default();

    let body = format!(
        r#"        <div class="toolbar">
            <h2>My studies</h2>
            <a class="button-link" href="/studies?create=1">+ New Study</a>
        </div>
        <form class="toolbar" method="get" action="/studies">
            <input type="search" name="q" placeholder="Search" value="{q}" style="max-width:260px;">
            <select name="order" style="max-width:280px;">
                <option value="newest"{newest_selected}>Creation date: Newest first</option>
                <option value="oldest"{oldest_selected}>Creation date: Oldest first</option>
            </select>
            <button type="submit">Apply</button>
        </form>
        <div class="entity-list">{rows}</div>
        {modal_html}"#,
        q = escape_html(params.q.as_deref().unwrap_or_default()),
    );

    render_page(PageLayout {
        meta_title: "My studies",
        heading: "Studies",
        username: &signed_in.session.display_name,
        flash_html: Cow::Owned(collections::status_flash(
            params.status.as_deref(),
            "Study created successfully!",
        )),
        body_html: Cow::Owned(body),
        extra_styles: None,
    })
}

fn render_study_modal(modal: &ModalState<NewStudy>) -> String {
    let values = &modal.values;
    let fields = [
        render_input("Name of your study", "studyName", "text", &values.study_name, modal.error("studyName")),
        render_input("Trial registry ID", "trialRegistryID", "text", &values.trial_registry_id, None),
        render_input("Name of your site", "siteName", "text", &values.site_name, None),
        render_input("Abbreviation", "abbreviation", "text", &values.abbreviation, None),
        render_input("Country", "country", "text", &values.country, None),
        render_choices("Templates", "template", STUDY_TEMPLATES, &values.template, modal.error("template")),
        render_choices("Study type", "studyType", STUDY_TYPES, &values.study_type, modal.error("studyType")),
    ]
    .concat();

    render_modal(
        "Create new study",
        "/studies",
        &fields,
        modal.message.as_deref(),
        "/studies",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn study(id: &str, name: &str, day: Option<u32>) -> Study {
        Study {
            id: id.into(),
            study_name: Some(name.into()),
            created_at: day.map(|d| Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap()),
            ..Study::default()
        }
    }

    #[test]
    fn orders_newest_first_by_default_with_undated_last() {
        let arranged = arrange_studies(
            vec![study("a", "A", Some(1)), study("b", "B", None), study("c", "C", Some(3))],
            None,
            StudyOrder::parse(None),
        );
        let ids: Vec<_> = arranged.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn oldest_first_and_search() {
        let arranged = arrange_studies(
            vec![
                study("a", "PACE trial", Some(5)),
                study("b", "Other", Some(1)),
                study("c", "pace follow-up", Some(2)),
            ],
            Some(" Pace "),
            StudyOrder::parse(Some("oldest")),
        );
        let ids: Vec<_> = arranged.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["c", "a"]);
    }

    #[test]
    fn validation_requires_name_template_and_type() {
        let errors = validate_study(&normalize_study(NewStudy::default()));
        let fields: Vec<_> = errors.iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, ["studyName", "template", "studyType"]);

        let valid = normalize_study(NewStudy {
            study_name: " PACE ".into(),
            template: "Survey study".into(),
            study_type: "Test".into(),
            ..NewStudy::default()
        });
        assert!(validate_study(&valid).is_empty());
        assert_eq!(valid.study_name, "PACE");
        assert_eq!(valid.country, DEFAULT_COUNTRY);
    }
}
