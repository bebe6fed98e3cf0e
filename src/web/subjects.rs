use std::borrow::Cow;

use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info};

use crate::{
    api::{NewSubject, Subject},
    web::{
        AppState,
        collections::{self, ListQuery, ModalState},
        guard::{self, SignedIn},
        links,
        templates::{PageLayout, escape_html, render_input, render_modal, render_page},
        validation::{self, FieldErrors},
    },
};

const CREATE_FALLBACK: &str = "Create subject failed";

pub async fn subjects_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(site_id): Path<String>,
    Query(params): Query<ListQuery>,
) -> Response {
    let signed_in = match guard::require_session(&state, &jar).await {
        Ok(signed_in) => signed_in,
        Err(rejection) => return rejection.into_response(),
    };

    let subjects = match load_subjects(&state, &signed_in, &site_id).await {
        Ok(subjects) => subjects,
        Err(response) => return response,
    };

    let modal = params.modal_open().then(ModalState::<NewSubject>::blank);
    Html(render_subjects_page(
        &signed_in,
        &site_id,
        &subjects,
        params.status.as_deref(),
        modal.as_ref(),
    ))
    .into_response()
}

pub async fn create_subject(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(site_id): Path<String>,
    Form(form): Form<NewSubject>,
) -> Response {
    let signed_in = match guard::require_session(&state, &jar).await {
        Ok(signed_in) => signed_in,
        Err(rejection) => return rejection.into_response(),
    };

    let subject = NewSubject {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        site: site_id.clone(),
    };

    let mut errors = FieldErrors::new();
    validation::require(&mut errors, "name", &subject.name, "Name is required");
    validation::check_email(&mut errors, "email", &subject.email);
    if !errors.is_empty() {
        let modal = ModalState {
            values: subject,
            errors,
            message: None,
        };
        return rerender(&state, &signed_in, &site_id, StatusCode::UNPROCESSABLE_ENTITY, modal)
            .await;
    }

    match state.api().create_subject(signed_in.token(), &subject).await {
        Ok(created) => {
            info!(
                site = %site_id,
                subject = created.as_ref().map(|s| s.id.as_str()).unwrap_or("unknown"),
                "subject created"
            );
            Redirect::to(&links::with_query(&["subjects", &site_id], &[("status", "created")]))
                .into_response()
        }
        Err(err) if err.is_unauthorized() => collections::session_expired(&state, &signed_in).await,
        Err(err) => {
            error!(?err, site = %site_id, "failed to create subject");
            let (status, message) = collections::create_failure(&err, CREATE_FALLBACK);
            let modal = ModalState {
                values: subject,
                errors: FieldErrors::new(),
                message: Some(message),
            };
            rerender(&state, &signed_in, &site_id, status, modal).await
        }
    }
}

async fn load_subjects(
    state: &AppState,
    signed_in: &SignedIn,
    site_id: &str,
) -> Result<Vec<Subject>, Response> {
    collections::load_collection(state, signed_in, "subjects", || {
        state.api().list_subjects(signed_in.token(), site_id)
    })
    .await
}

async fn rerender(
    state: &AppState,
    signed_in: &SignedIn,
    site_id: &str,
    status: StatusCode,
    modal: ModalState<NewSubject>,
) -> Response {
    let subjects = match load_subjects(state, signed_in, site_id).await {
        Ok(subjects) => subjects,
        Err(response) => return response,
    };
    let page = render_subjects_page(signed_in, site_id, &subjects, None, Some(&modal));
    (status, Html(page)).into_response()
}

fn render_subjects_page(
    signed_in: &SignedIn,
    site_id: &str,
    subjects: &[Subject],
    status: Option<&str>,
    modal: Option<&ModalState<NewSubject>>,
) -> String {
    let rows = if subjects.is_empty() {
        r#"<p class="empty">No subjects found.</p>"#.to_string()
    } else {
        subjects
            .iter()
            .map(|subject| {
                format!(
                    r#"<a class="entity-row" href="{href}"><strong>{name}</strong><span>{email}</span></a>"#,
                    href = escape_html(&links::path(&["forms", &subject.id])),
                    name = escape_html(subject.name.as_deref().unwrap_or("Unnamed subject")),
                    email = escape_html(subject.email.as_deref().unwrap_or_default()),
                )
            })
            .collect::<String>()
    };

    let site_path = links::path(&["subjects", site_id]);
    let modal_html = modal
        .map(|modal| {
            let fields = [
                render_input("Name", "name", "text", &modal.values.name, modal.error("name")),
                render_input("Email", "email", "email", &modal.values.email, modal.error("email")),
            ]
            .concat();
            render_modal("Add Subject", &site_path, &fields, modal.message.as_deref(), &site_path)
        })
        .unwrap_or_default();

    let body = format!(
        r#"        <div class="toolbar">
            <h2>Subjects</h2>
            <a class="button-link" href="{create_href}">+ Add Subject</a>
        </div>
        <div class="entity-list">{rows}</div>
        {modal_html}"#,
        create_href = escape_html(&links::with_query(&["subjects", site_id], &[("create", "1")])),
    );

    render_page(PageLayout {
        meta_title: "Subjects",
        heading: "Subjects",
        username: &signed_in.session.display_name,
        flash_html: Cow::Owned(collections::status_flash(status, "Subject added successfully!")),
        body_html: Cow::Owned(body),
        extra_styles: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::ApiClient,
        config::AppConfig,
        forms::{FieldRegistry, FormEngine, FormSchema},
        session::{Session, SessionStore, SessionUpdate},
        test_support::spawn_backend,
        web::guard::SESSION_COOKIE,
    };
    use axum::{
        Json, Router,
        routing::{get, post},
    };
    use axum_extra::extract::cookie::Cookie;
    use serde_json::{Value, json};
    use uuid::Uuid;

    fn session() -> Session {
        Session {
            user_id: "u1".into(),
            display_name: "dana".into(),
            token: "tok".into(),
            expires_at: None,
            user: json!({}),
        }
    }

    async fn signed_in_state(api_url: String) -> (AppState, CookieJar) {
        let config = AppConfig {
            api_url,
            ..AppConfig::default()
        };
        let api = ApiClient::new(&config).unwrap();
        let forms = FormEngine::new(FormSchema::builtin().unwrap(), FieldRegistry::standard());
        let sessions = SessionStore::new(None);
        sessions.restore().await;
        let id = Uuid::new_v4();
        sessions
            .apply(SessionUpdate::Establish { id, session: session() })
            .await
            .unwrap();
        let state = AppState::from_parts(config, api, sessions, forms);
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, id.to_string()));
        (state, jar)
    }

    #[test]
    fn empty_list_shows_placeholder() {
        let signed_in = SignedIn {
            id: Uuid::new_v4(),
            session: session(),
        };
        let html = render_subjects_page(&signed_in, "site-1", &[], None, None);
        assert!(html.contains("No subjects found."));
        assert!(html.contains(r#"href="/subjects/site-1?create=1""#));
    }

    #[tokio::test]
    async fn rejected_create_keeps_modal_open_with_values_and_message() {
        let backend = Router::new()
            .route(
                "/subjects/:site",
                get(|| async { Json(json!([{ "_id": "p1", "name": "Existing", "email": "e@x.org" }])) }),
            )
            .route(
            "/subjects",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["site"], "site-1");
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "message": "email taken" })),
                    )
                }),
            );
        let (state, jar) = signed_in_state(spawn_backend(backend).await).await;

        let response = create_subject(
            State(state),
            jar,
            Path("site-1".to_string()),
            Form(NewSubject {
                name: "Ada".into(),
                email: "ada@example.org".into(),
                site: String::new(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(r#"class="modal-backdrop""#));
        assert!(html.contains("email taken"));
        assert!(html.contains(r#"value="Ada""#));
        assert!(html.contains(r#"value="ada@example.org""#));
        assert!(html.contains("Existing"));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_backend() {
        let backend = Router::new().route(
            "/subjects/:site",
            get(|| async { Json(json!([])) }),
        );
        let (state, jar) = signed_in_state(spawn_backend(backend).await).await;

        let response = create_subject(
            State(state),
            jar,
            Path("site-1".to_string()),
            Form(NewSubject::default()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
