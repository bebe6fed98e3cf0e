//! Gates pages on session presence and on the session store having been restored.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::error;
use uuid::Uuid;

use crate::{
    session::{Session, SessionLookup, SessionUpdate},
    web::AppState,
};

pub const SESSION_COOKIE: &str = "capture_session";
pub const PUBLIC_ENTRY: &str = "/login";
pub const LANDING: &str = "/studies";

pub struct SignedIn {
    pub id: Uuid,
    pub session: Session,
}

impl SignedIn {
    pub fn token(&self) -> &str {
        &self.session.token
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum GuardRejection {
    /// The store is still restoring; render nothing.
    Suspended,
    Redirect(&'static str),
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            GuardRejection::Suspended => StatusCode::NO_CONTENT.into_response(),
            GuardRejection::Redirect(to) => Redirect::to(to).into_response(),
        }
    }
}

pub fn session_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Protected pages: a live session or a redirect to the public entry point.
pub async fn require_session(
    state: &AppState,
    jar: &CookieJar,
) -> Result<SignedIn, GuardRejection> {
    let id = session_id(jar);
    match state.sessions().lookup(id).await {
        SessionLookup::Pending => Err(GuardRejection::Suspended),
        SessionLookup::Missing => Err(GuardRejection::Redirect(PUBLIC_ENTRY)),
        SessionLookup::Active(session) => match id {
            Some(id) => Ok(SignedIn { id, session }),
            None => Err(GuardRejection::Redirect(PUBLIC_ENTRY)),
        },
    }
}

/// Public pages (login, register): only without a session.
pub async fn require_anonymous(state: &AppState, jar: &CookieJar) -> Result<(), GuardRejection> {
    match state.sessions().lookup(session_id(jar)).await {
        SessionLookup::Pending => Err(GuardRejection::Suspended),
        SessionLookup::Active(_) => Err(GuardRejection::Redirect(LANDING)),
        SessionLookup::Missing => Ok(()),
    }
}

/// Forgets a session whose token the backend no longer accepts, or on logout.
pub async fn end_session(state: &AppState, id: Uuid) {
    if let Err(err) = state.apply_session(SessionUpdate::Destroy { id }).await {
        error!(?err, "failed to remove session");
        state.forms().discard_session(id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::ApiClient,
        config::AppConfig,
        forms::{FieldRegistry, FormEngine, FormSchema},
        session::SessionStore,
    };
    use axum_extra::extract::cookie::Cookie;
    use serde_json::json;

    fn state() -> AppState {
        let config = AppConfig::default();
        let api = ApiClient::new(&config).unwrap();
        let forms = FormEngine::new(FormSchema::builtin().unwrap(), FieldRegistry::standard());
        AppState::from_parts(config, api, SessionStore::new(None), forms)
    }

    fn jar_with(id: Uuid) -> CookieJar {
        CookieJar::new().add(Cookie::new(SESSION_COOKIE, id.to_string()))
    }

    #[tokio::test]
    async fn suspends_until_store_is_restored_then_redirects() {
        let state = state();
        let jar = CookieJar::new();

        assert_eq!(
            require_session(&state, &jar).await.err(),
            Some(GuardRejection::Suspended)
        );
        assert_eq!(
            require_anonymous(&state, &jar).await.err(),
            Some(GuardRejection::Suspended)
        );

        state.sessions().restore().await;
        assert_eq!(
            require_session(&state, &jar).await.err(),
            Some(GuardRejection::Redirect(PUBLIC_ENTRY))
        );
        assert!(require_anonymous(&state, &jar).await.is_ok());
    }

    #[tokio::test]
    async fn signed_in_user_is_kept_off_public_pages() {
        let state = state();
        state.sessions().restore().await;
        let id = Uuid::new_v4();
        state
            .sessions()
            .apply(SessionUpdate::Establish {
                id,
                session: Session {
                    user_id: "u1".into(),
                    display_name: "dana".into(),
                    token: "t".into(),
                    expires_at: None,
                    user: json!({}),
                },
            })
            .await
            .unwrap();

        let jar = jar_with(id);
        let signed_in = require_session(&state, &jar).await.ok().expect("session");
        assert_eq!(signed_in.token(), "t");
        assert_eq!(
            require_anonymous(&state, &jar).await.err(),
            Some(GuardRejection::Redirect(LANDING))
        );

        end_session(&state, id).await;
        assert_eq!(
            require_session(&state, &jar).await.err(),
            Some(GuardRejection::Redirect(PUBLIC_ENTRY))
        );
    }

    #[test]
    fn garbage_cookie_has_no_session_id() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "not-a-uuid"));
        assert!(session_id(&jar).is_none());
    }

    #[test]
    fn suspended_renders_no_content() {
        let response = GuardRejection::Suspended.into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = GuardRejection::Redirect(PUBLIC_ENTRY).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}
