//! Pieces shared by the study, site and subject list pages.

use std::future::Future;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    api::ApiError,
    web::{
        AppState,
        guard::{self, PUBLIC_ENTRY, SignedIn},
        templates::{FlashKind, render_flash},
        validation::{self, FieldErrors},
    },
};

#[derive(Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub create: Option<String>,
    pub q: Option<String>,
    pub order: Option<String>,
}

impl ListQuery {
    pub fn modal_open(&self) -> bool {
        matches!(self.create.as_deref(), Some("1" | "true"))
    }
}

/// An open create dialog: the entered values plus anything to show next to them.
pub struct ModalState<T> {
    pub values: T,
    pub errors: FieldErrors,
    pub message: Option<String>,
}

impl<T: Default> ModalState<T> {
    pub fn blank() -> Self {
        Self::with_values(T::default())
    }
}

impl<T> ModalState<T> {
    pub fn with_values(values: T) -> Self {
        Self {
            values,
            errors: FieldErrors::new(),
            message: None,
        }
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        validation::error_for(&self.errors, field)
    }
}

/// Fetches a collection for a list page. Failures degrade to an empty list, except a
/// rejected token, which ends the session and sends the browser to sign in again.
pub async fn load_collection<T, F, Fut>(
    state: &AppState,
    signed_in: &SignedIn,
    what: &'static str,
    fetch: F,
) -> Result<Vec<T>, Response>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    match fetch().await {
        Ok(items) => Ok(items),
        Err(err) if err.is_unauthorized() => Err(session_expired(state, signed_in).await),
        Err(err) => {
            warn!(?err, what, "failed to load collection");
            Ok(Vec::new())
        }
    }
}

pub async fn session_expired(state: &AppState, signed_in: &SignedIn) -> Response {
    info!(user = %signed_in.session.user_id, "backend rejected token; ending session");
    guard::end_session(state, signed_in.id).await;
    Redirect::to(&format!("{PUBLIC_ENTRY}?status=expired")).into_response()
}

pub fn status_flash(status: Option<&str>, created_message: &str) -> String {
    match status {
        Some("created") => render_flash(FlashKind::Success, created_message),
        Some("signed_in") => render_flash(FlashKind::Success, "Login successful!"),
        _ => String::new(),
    }
}

/// Status and message to show when a create call fails.
pub fn create_failure(err: &ApiError, fallback: &str) -> (StatusCode, String) {
    match err {
        ApiError::Rejected { status, .. } => {
            let status = StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_client_error)
                .unwrap_or(StatusCode::BAD_GATEWAY);
            (status, err.user_message(fallback))
        }
        _ => (StatusCode::BAD_GATEWAY, "Server error.".to_string()),
    }
}
