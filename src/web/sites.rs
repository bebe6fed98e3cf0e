use std::borrow::Cow;

use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, info};

use crate::{
    api::{NewSite, Site},
    web::{
        AppState,
        collections::{self, ListQuery, ModalState},
        guard::{self, SignedIn},
        links,
        templates::{PageLayout, escape_html, render_input, render_modal, render_page},
        validation::{self, FieldErrors},
    },
};

pub async fn sites_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(study_id): Path<String>,
    Query(params): Query<ListQuery>,
) -> Response {
    let signed_in = match guard::require_session(&state, &jar).await {
        Ok(signed_in) => signed_in,
        Err(rejection) => return rejection.into_response(),
    };

    let sites = match load_sites(&state, &signed_in, &study_id).await {
        Ok(sites) => sites,
        Err(response) => return response,
    };

    let modal = params.modal_open().then(ModalState::<NewSite>::blank);
    let page = render_sites_page(&signed_in, &study_id, &sites, params.status.as_deref(), modal.as_ref());
    Html(page).into_response()
}

pub async fn create_site(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(study_id): Path<String>,
    Form(form): Form<NewSite>,
) -> Response {
    let signed_in = match guard::require_session(&state, &jar).await {
        Ok(signed_in) => signed_in,
        Err(rejection) => return rejection.into_response(),
    };

    // The parent study always comes from the page, never from the posted form.
    let site = NewSite {
        site_name: form.site_name.trim().to_string(),
        location: form.location.trim().to_string(),
        contact_email: form.contact_email.trim().to_string(),
        study_id: study_id.clone(),
    };

    let errors = validate_site(&site);
    if !errors.is_empty() {
        let modal = ModalState {
            values: site,
            errors,
            message: None,
        };
        return rerender(&state, &signed_in, &study_id, StatusCode::UNPROCESSABLE_ENTITY, modal)
            .await;
    }

    match state.api().create_site(signed_in.token(), &site).await {
        Ok(()) => {
            info!(study = %study_id, site = %site.site_name, "site created");
            Redirect::to(&links::with_query(&["sites", &study_id], &[("status", "created")]))
                .into_response()
        }
        Err(err) if err.is_unauthorized() => collections::session_expired(&state, &signed_in).await,
        Err(err) => {
            error!(?err, study = %study_id, "failed to create site");
            let (status, message) = collections::create_failure(&err, "Failed to create site.");
            let modal = ModalState {
                values: site,
                errors: FieldErrors::new(),
                message: Some(message),
            };
            rerender(&state, &signed_in, &study_id, status, modal).await
        }
    }
}

async fn load_sites(
    state: &AppState,
    signed_in: &SignedIn,
    study_id: &str,
) -> Result<Vec<Site>, Response> {
    collections::load_collection(state, signed_in, "sites", || {
        state.api().list_sites(signed_in.token(), study_id)
    })
    .await
}

async fn rerender(
    state: &AppState,
    signed_in: &SignedIn,
    study_id: &str,
    status: StatusCode,
    modal: ModalState<NewSite>,
) -> Response {
    let sites = match load_sites(state, signed_in, study_id).await {
        Ok(sites) => sites,
        Err(response) => return response,
    };
    let page = render_sites_page(signed_in, study_id, &sites, None, Some(&modal));
    (status, Html(page)).into_response()
}

fn validate_site(site: &NewSite) -> FieldErrors {
    let mut errors = FieldErrors::new();
    validation::require(&mut errors, "siteName", &site.site_name, "Site name is required");
    if !site.contact_email.is_empty() {
        validation::check_email(&mut errors, "contactEmail", &site.contact_email);
    }
    errors
}

fn render_sites_page(
    signed_in: &SignedIn,
    study_id: &str,
    sites: &[Site],
    status: Option<&str>,
    modal: Option<&ModalState<NewSite>>,
) -> String {
    let rows = if sites.is_empty() {
        r#"<p class="empty">No sites found.</p>"#.to_string()
    } else {
        sites
            .iter()
            .map(|site| {
                format!(
                    r#"<a class="entity-row" href="{href}"><strong>{name}</strong><span>{location} • {email}</span></a>"#,
                    href = escape_html(&links::path(&["subjects", &site.id])),
                    name = escape_html(site.site_name.as_deref().unwrap_or("Unnamed site")),
                    location = escape_html(non_empty(site.location.as_deref()).unwrap_or("No location")),
                    email = escape_html(non_empty(site.contact_email.as_deref()).unwrap_or("No email")),
                )
            })
            .collect::<String>()
    };

    let study_path = links::path(&["sites", study_id]);
    let modal_html = modal
        .map(|modal| {
            let values = &modal.values;
            let fields = [
                render_input("Site Name", "siteName", "text", &values.site_name, modal.error("siteName")),
                render_input("Location", "location", "text", &values.location, None),
                render_input("Contact Email", "contactEmail", "email", &values.contact_email, modal.error("contactEmail")),
            ]
            .concat();
            render_modal("Create New Site", &study_path, &fields, modal.message.as_deref(), &study_path)
        })
        .unwrap_or_default();

    let body = format!(
        r#"        <div class="toolbar">
            <h2>Sites</h2>
            <a class="button-link" href="{create_href}">+ New Site</a>
        </div>
        <div class="entity-list">{rows}</div>
        {modal_html}"#,
        create_href = escape_html(&links::with_query(&["sites", study_id], &[("create", "1")])),
    );

    render_page(PageLayout {
        meta_title: "Sites",
        heading: "Sites",
        username: &signed_in.session.display_name,
        flash_html: Cow::Owned(collections::status_flash(status, "Site created successfully!")),
        body_html: Cow::Owned(body),
        extra_styles: None,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
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
    use axum::{Json, Router, http::header, routing::post};
    use axum_extra::extract::cookie::Cookie;
    use serde_json::{Value, json};
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

    async fn signed_in_state(api_url: String) -> (AppState, CookieJar) {
        let config = AppConfig {
            api_url,
            ..AppConfig::default()
        };
        let api = ApiClient::new(&config).unwrap();
        let forms = FormEngine::new(FormSchema::builtin().unwrap(), FieldRegistry::standard());
        let sessions = SessionStore::new(None);
        sessions.restore().await;
        let signed_in = signed_in();
        sessions
            .apply(SessionUpdate::Establish {
                id: signed_in.id,
                session: signed_in.session,
            })
            .await
            .unwrap();
        let state = AppState::from_parts(config, api, sessions, forms);
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, signed_in.id.to_string()));
        (state, jar)
    }

    #[tokio::test]
    async fn created_redirect_encodes_the_study_id() {
        let backend = Router::new().route(
            "/sites",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["siteName"], "Leiden");
                (StatusCode::CREATED, Json(json!({ "_id": "s9" })))
            }),
        );
        let (state, jar) = signed_in_state(spawn_backend(backend).await).await;

        let response = create_site(
            State(state),
            jar,
            Path("abc\ndef".to_string()),
            Form(NewSite {
                site_name: "Leiden".into(),
                ..NewSite::default()
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/sites/abc%0Adef?status=created"
        );
    }

    #[test]
    fn rows_fall_back_for_missing_contact_details() {
        let sites = vec![Site {
            id: "s1".into(),
            site_name: Some("Leiden".into()),
            ..Site::default()
        }];
        let html = render_sites_page(&signed_in(), "study-1", &sites, None, None);
        assert!(html.contains(r#"href="/subjects/s1""#));
        assert!(html.contains("No location • No email"));
        assert!(!html.contains(r#"class="modal-backdrop""#));
    }

    #[test]
    fn modal_posts_back_to_study_page() {
        let html = render_sites_page(
            &signed_in(),
            "study-1",
            &[],
            None,
            Some(&ModalState::blank()),
        );
        assert!(html.contains(r#"action="/sites/study-1""#));
        assert!(html.contains(r#"href="/sites/study-1?create=1""#));
        assert!(html.contains("No sites found."));
    }

    #[test]
    fn site_name_required_and_email_checked_when_present() {
        let errors = validate_site(&NewSite {
            contact_email: "nope".into(),
            ..NewSite::default()
        });
        let fields: Vec<_> = errors.iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, ["siteName", "contactEmail"]);

        let errors = validate_site(&NewSite {
            site_name: "Leiden".into(),
            ..NewSite::default()
        });
        assert!(errors.is_empty());
    }
}
