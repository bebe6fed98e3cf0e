use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{AppState, auth, sites, studies, subjects, visit};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(auth::root))
        .route("/login", get(auth::login_page).post(auth::process_login))
        .route("/register", get(auth::register_page).post(auth::process_register))
        .route("/logout", post(auth::logout))
        .route("/healthz", get(healthz))
        .route("/studies", get(studies::studies_page).post(studies::create_study))
        .route("/sites/:study_id", get(sites::sites_page).post(sites::create_site))
        .route(
            "/subjects/:site_id",
            get(subjects::subjects_page).post(subjects::create_subject),
        )
        .route("/forms/:subject_id", get(visit::visit_page))
        .route("/forms/:subject_id/answers", post(visit::save_answers))
        .route("/forms/:subject_id/submit", post(visit::submit_visit))
        .with_state(state)
}

/// Ready once persisted sessions are restored.
async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    if state.sessions().is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
