use std::borrow::Cow;

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration as CookieDuration;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    api::{LoginRequest, RegisterRequest},
    session::{Session, SessionUpdate},
    web::{
        AppState,
        guard::{self, LANDING, PUBLIC_ENTRY, SESSION_COOKIE},
        templates::{AuthFormView, FlashKind, render_flash, render_login_page, render_register_page},
        validation::{self, FieldErrors},
    },
};

const LOGIN_FALLBACK: &str = "Invalid credentials";
const LOGIN_UNAVAILABLE: &str = "Something went wrong. Please try again.";
const REGISTER_FALLBACK: &str = "Registration failed. Please try again.";
const REGISTER_UNAVAILABLE: &str = "Network error. Please check your connection and try again.";

#[derive(Default, Deserialize)]
pub struct AuthQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

pub async fn root() -> Redirect {
    Redirect::to(LANDING)
}

pub async fn login_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<AuthQuery>,
) -> Response {
    if let Err(rejection) = guard::require_anonymous(&state, &jar).await {
        return rejection.into_response();
    }

    let flash = match params.status.as_deref() {
        Some("registered") => render_flash(FlashKind::Success, "Account created! You can log in now."),
        Some("logged_out") => render_flash(FlashKind::Success, "You have been signed out."),
        Some("expired") => render_flash(
            FlashKind::Error,
            "Your session has expired. Please sign in again.",
        ),
        _ => String::new(),
    };

    Html(render_login_page(&AuthFormView {
        flash_html: Cow::Owned(flash),
        ..AuthFormView::default()
    }))
    .into_response()
}

pub async fn process_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    if let Err(rejection) = guard::require_anonymous(&state, &jar).await {
        return rejection.into_response();
    }

    let email = form.email.trim();
    let mut errors = FieldErrors::new();
    validation::check_email(&mut errors, "email", email);
    validation::require(&mut errors, "password", &form.password, "Password is required");
    if !errors.is_empty() {
        return login_failure(StatusCode::UNPROCESSABLE_ENTITY, email, None, errors);
    }

    let request = LoginRequest {
        email: email.to_string(),
        password: form.password.clone(),
    };

    let record = match state.api().login(&request).await {
        Ok(record) => record,
        Err(err) if err.is_rejection() => {
            let message = err.user_message(LOGIN_FALLBACK);
            return login_failure(StatusCode::UNAUTHORIZED, email, Some(message.as_str()), Vec::new());
        }
        Err(err) => {
            error!(?err, "login request failed");
            return login_failure(StatusCode::BAD_GATEWAY, email, Some(LOGIN_UNAVAILABLE), Vec::new());
        }
    };

    let Some(session) = Session::from_login(record, state.config().session_ttl_days) else {
        warn!("login response carried no usable user or token");
        return login_failure(StatusCode::BAD_GATEWAY, email, Some(LOGIN_UNAVAILABLE), Vec::new());
    };

    let id = Uuid::new_v4();
    let user_id = session.user_id.clone();
    if let Err(err) = state
        .apply_session(SessionUpdate::Establish { id, session })
        .await
    {
        error!(?err, "failed to store session");
        return login_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            email,
            Some(LOGIN_UNAVAILABLE),
            Vec::new(),
        );
    }
    info!(user = %user_id, "signed in");

    let mut cookie = Cookie::new(SESSION_COOKIE, id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(CookieDuration::days(state.config().session_ttl_days));

    let jar = jar.add(cookie);
    (jar, Redirect::to(&format!("{LANDING}?status=signed_in"))).into_response()
}

fn login_failure(
    status: StatusCode,
    email: &str,
    message: Option<&str>,
    errors: FieldErrors,
) -> Response {
    let flash = message
        .map(|message| render_flash(FlashKind::Error, message))
        .unwrap_or_default();
    let page = render_login_page(&AuthFormView {
        flash_html: Cow::Owned(flash),
        email,
        errors,
        ..AuthFormView::default()
    });
    (status, Html(page)).into_response()
}

pub async fn register_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Err(rejection) = guard::require_anonymous(&state, &jar).await {
        return rejection.into_response();
    }
    Html(render_register_page(&AuthFormView::default())).into_response()
}

pub async fn process_register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Response {
    if let Err(rejection) = guard::require_anonymous(&state, &jar).await {
        return rejection.into_response();
    }

    let username = form.username.trim();
    let email = form.email.trim();
    let mut errors = FieldErrors::new();
    validation::require(&mut errors, "username", username, "Username is required");
    validation::check_email(&mut errors, "email", email);
    validation::check_new_password(&mut errors, &form.password, &form.confirm_password);
    if !errors.is_empty() {
        return register_failure(StatusCode::UNPROCESSABLE_ENTITY, username, email, None, errors);
    }

    let request = RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: form.password.clone(),
    };

    match state.api().register(&request).await {
        Ok(()) => {
            info!(%username, "account registered");
            Redirect::to(&format!("{PUBLIC_ENTRY}?status=registered")).into_response()
        }
        Err(err) if err.is_rejection() => {
            let field_errors = err
                .field_errors()
                .map(|fields| {
                    fields
                        .iter()
                        .filter_map(|(field, message)| {
                            known_register_field(field).map(|name| (name, message.clone()))
                        })
                        .collect()
                })
                .unwrap_or_default();
            let message = err.user_message(REGISTER_FALLBACK);
            register_failure(
                StatusCode::BAD_REQUEST,
                username,
                email,
                Some(message.as_str()),
                field_errors,
            )
        }
        Err(err) => {
            error!(?err, "register request failed");
            register_failure(
                StatusCode::BAD_GATEWAY,
                username,
                email,
                Some(REGISTER_UNAVAILABLE),
                Vec::new(),
            )
        }
    }
}

fn known_register_field(field: &str) -> Option<&'static str> {
    match field {
        "username" => Some("username"),
        "email" => Some("email"),
        "password" => Some("password"),
        _ => None,
    }
}

fn register_failure(
    status: StatusCode,
    username: &str,
    email: &str,
    message: Option<&str>,
    errors: FieldErrors,
) -> Response {
    let flash = message
        .map(|message| render_flash(FlashKind::Error, message))
        .unwrap_or_default();
    let page = render_register_page(&AuthFormView {
        flash_html: Cow::Owned(flash),
        username,
        email,
        errors,
    });
    (status, Html(page)).into_response()
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(id) = guard::session_id(&jar) {
        guard::end_session(&state, id).await;
    }

    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");
    removal.set_http_only(true);
    removal.set_same_site(SameSite::Lax);
    removal.set_max_age(CookieDuration::seconds(0));
    let jar = jar.remove(removal);

    (jar, Redirect::to(&format!("{PUBLIC_ENTRY}?status=logged_out")))
}
