use std::borrow::Cow;

use chrono::{Datelike, Utc};

const BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 1.25rem 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .header-bar h1 { margin: 0; font-size: 1.4rem; }
        .header-actions { display: flex; gap: 0.75rem; align-items: center; }
        .header-actions span { color: #475569; font-size: 0.95rem; }
        .logout-form button { padding: 0.5rem 1.1rem; border-radius: 999px; }
        main { padding: 2rem 1.5rem; max-width: 1100px; margin: 0 auto; box-sizing: border-box; }
        a { color: #1d4ed8; }
        .toolbar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; margin-bottom: 1.5rem; }
        .toolbar h2 { margin: 0; }
        .button-link { display: inline-flex; align-items: center; gap: 0.4rem; padding: 0.6rem 1.1rem; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; text-decoration: none; }
        .button-link:hover { background: #1d4ed8; }
        .button-link.secondary { background: #e2e8f0; color: #0f172a; }
        button { padding: 0.75rem 1.2rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; transition: background 0.15s ease; }
        button:hover { background: #1d4ed8; }
        button:disabled { opacity: 0.6; cursor: not-allowed; }
        label { display: block; margin-top: 1rem; font-weight: 600; }
        input[type="text"], input[type="email"], input[type="password"], input[type="search"], select { width: 100%; padding: 0.7rem; margin-top: 0.4rem; border-radius: 8px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; box-sizing: border-box; }
        .flash { padding: 0.9rem 1.2rem; border-radius: 10px; margin-bottom: 1.5rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .entity-list { display: grid; gap: 0.75rem; }
        .entity-row { display: block; background: #ffffff; border: 1px solid #e2e8f0; border-radius: 10px; padding: 1rem 1.25rem; text-decoration: none; color: inherit; }
        .entity-row:hover { background: #f1f5f9; }
        .entity-row strong { display: block; margin-bottom: 0.25rem; }
        .entity-row span { color: #475569; font-size: 0.92rem; }
        .empty { color: #64748b; }
        .modal-backdrop { position: fixed; inset: 0; background: rgba(15, 23, 42, 0.45); display: flex; align-items: center; justify-content: center; padding: 1rem; }
        .modal { background: #ffffff; border-radius: 14px; padding: 1.75rem; width: 100%; max-width: 560px; box-shadow: 0 24px 60px rgba(15, 23, 42, 0.25); max-height: 90vh; overflow: auto; }
        .modal h3 { margin-top: 0; }
        .modal-actions { display: flex; justify-content: flex-end; gap: 0.75rem; margin-top: 1.5rem; align-items: center; }
        .field-error { color: #b91c1c; font-size: 0.88rem; margin: 0.35rem 0 0; }
        .required { color: #dc2626; }
        .radio-row { display: flex; flex-wrap: wrap; gap: 1.25rem; margin-top: 0.5rem; }
        .radio-option { display: inline-flex; align-items: center; gap: 0.35rem; margin: 0; font-weight: 400; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
"#;

const AUTH_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; display: flex; flex-direction: column; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f1f5f9; color: #0f172a; padding: 1.5rem; box-sizing: border-box; }
        main { width: 100%; max-width: 440px; display: flex; flex-direction: column; gap: 1.5rem; }
        .panel { background: #ffffff; padding: 2.25rem; border-radius: 18px; box-shadow: 0 20px 60px rgba(15, 23, 42, 0.08); border: 1px solid #e2e8f0; }
        h1 { margin: 0 0 1.25rem; font-size: 1.6rem; text-align: center; }
        label { display: block; margin-top: 1.1rem; font-weight: 600; }
        input { width: 100%; padding: 0.8rem; margin-top: 0.5rem; border-radius: 10px; border: 1px solid #cbd5f5; background: #f8fafc; font-size: 1rem; box-sizing: border-box; }
        button { margin-top: 1.75rem; width: 100%; padding: 0.9rem; border: none; border-radius: 10px; background: #2563eb; color: #ffffff; font-weight: 600; font-size: 1.05rem; cursor: pointer; }
        button:hover { background: #1d4ed8; }
        .field-error { color: #b91c1c; font-size: 0.88rem; margin: 0.35rem 0 0; }
        .flash { padding: 0.8rem 1rem; border-radius: 10px; margin-bottom: 1rem; font-weight: 600; }
        .flash.success { background: #ecfdf3; color: #166534; }
        .flash.error { background: #fef2f2; color: #b91c1c; }
        .links { display: flex; justify-content: space-between; margin-top: 1.25rem; font-size: 0.92rem; }
        .app-footer { text-align: center; font-size: 0.85rem; color: #64748b; }
"#;

pub struct PageLayout<'a> {
    pub meta_title: &'a str,
    pub heading: &'a str,
    pub username: &'a str,
    pub flash_html: Cow<'a, str>,
    pub body_html: Cow<'a, str>,
    pub extra_styles: Option<&'a str>,
}

/// Shell for every signed-in page: header with the user and a logout button.
pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        meta_title,
        heading,
        username,
        flash_html,
        body_html,
        extra_styles,
    } = layout;

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{meta_title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
{extra_styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1>{heading}</h1>
            <div class="header-actions">
                <a href="/studies">My studies</a>
                <span>Signed in as {username}</span>
                <form class="logout-form" method="post" action="/logout"><button type="submit">Log out</button></form>
            </div>
        </div>
    </header>
    <main>
        {flash_html}
{body_html}
        {footer}
    </main>
</body>
</html>"#,
        meta_title = escape_html(meta_title),
        heading = escape_html(heading),
        username = escape_html(username),
        styles = BASE_STYLES,
        extra_styles = extra_styles.unwrap_or_default(),
        footer = render_footer(),
    )
}

/// Values and errors echoed back into the login or register form.
#[derive(Default)]
pub struct AuthFormView<'a> {
    pub flash_html: Cow<'a, str>,
    pub username: &'a str,
    pub email: &'a str,
    pub errors: Vec<(&'a str, String)>,
}

impl AuthFormView<'_> {
    fn error_for(&self, field: &str) -> String {
        self.errors
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, message)| format!(r#"<p class="field-error">{}</p>"#, escape_html(message)))
            .unwrap_or_default()
    }
}

pub fn render_login_page(view: &AuthFormView<'_>) -> String {
    let body = format!(
        r#"<h1>Sign in</h1>
            {flash}
            <form method="post" action="/login" novalidate>
                <label for="email">Email Address</label>
                <input id="email" name="email" type="email" value="{email}" required>
                {email_error}
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                {password_error}
                <button type="submit">SIGN IN</button>
            </form>
            <div class="links">
                <span></span>
                <a href="/register">Don't have an account? Sign Up</a>
            </div>"#,
        flash = view.flash_html,
        email = escape_html(view.email),
        email_error = view.error_for("email"),
        password_error = view.error_for("password"),
    );
    render_auth_shell("Sign in", &body)
}

pub fn render_register_page(view: &AuthFormView<'_>) -> String {
    let body = format!(
        r#"<h1>Create your account</h1>
            {flash}
            <form method="post" action="/register" novalidate>
                <label for="username">Username</label>
                <input id="username" name="username" value="{username}" required>
                {username_error}
                <label for="email">Email Address</label>
                <input id="email" name="email" type="email" value="{email}" required>
                {email_error}
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                {password_error}
                <label for="confirm_password">Confirm Password</label>
                <input id="confirm_password" type="password" name="confirm_password" required>
                {confirm_error}
                <button type="submit">SIGN UP</button>
            </form>
            <div class="links">
                <a href="/login">Already have an account? Sign in</a>
            </div>"#,
        flash = view.flash_html,
        username = escape_html(view.username),
        email = escape_html(view.email),
        username_error = view.error_for("username"),
        email_error = view.error_for("email"),
        password_error = view.error_for("password"),
        confirm_error = view.error_for("confirm_password"),
    );
    render_auth_shell("Create your account", &body)
}

fn render_auth_shell(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
    <main>
        <section class="panel">
            {body}
        </section>
        {footer}
    </main>
</body>
</html>"#,
        title = escape_html(title),
        styles = AUTH_STYLES,
        footer = render_footer(),
    )
}

pub fn render_flash(kind: FlashKind, message: &str) -> String {
    format!(
        r#"<div class="flash {class}">{message}</div>"#,
        class = kind.as_class(),
        message = escape_html(message),
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    fn as_class(self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

/// Overlay dialog holding a create form. `fields_html` is placed inside the `<form>`.
pub fn render_modal(
    title: &str,
    action: &str,
    fields_html: &str,
    error: Option<&str>,
    cancel_href: &str,
) -> String {
    let error_html = error
        .map(|message| render_flash(FlashKind::Error, message))
        .unwrap_or_default();
    format!(
        r#"<div class="modal-backdrop" role="dialog" aria-modal="true">
    <div class="modal">
        <h3>{title}</h3>
        {error_html}
        <form method="post" action="{action}">
            {fields_html}
            <div class="modal-actions">
                <a class="button-link secondary" href="{cancel_href}">Cancel</a>
                <button type="submit">Create</button>
            </div>
        </form>
    </div>
</div>"#,
        title = escape_html(title),
        action = escape_html(action),
        cancel_href = escape_html(cancel_href),
    )
}

/// One labelled text input for a create form.
pub fn render_input(
    label: &str,
    name: &str,
    input_type: &str,
    value: &str,
    error: Option<&str>,
) -> String {
    let error_html = error
        .map(|message| format!(r#"<p class="field-error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();
    format!(
        r#"<label for="{name}">{label}</label><input id="{name}" name="{name}" type="{input_type}" value="{value}">{error_html}"#,
        name = escape_html(name),
        label = escape_html(label),
        value = escape_html(value),
    )
}

/// A required radio group for a create form.
pub fn render_choices(
    label: &str,
    name: &str,
    options: &[&str],
    selected: &str,
    error: Option<&str>,
) -> String {
    let choices = options
        .iter()
        .map(|option| {
            let checked = if *option == selected { " checked" } else { "" };
            format!(
                r#"<label class="radio-option"><input type="radio" name="{name}" value="{value}"{checked}> {value}</label>"#,
                name = escape_html(name),
                value = escape_html(option),
            )
        })
        .collect::<String>();
    let error_html = error
        .map(|message| format!(r#"<p class="field-error">{}</p>"#, escape_html(message)))
        .unwrap_or_default();
    format!(
        r#"<fieldset style="border:none;padding:0;margin:1rem 0 0;"><legend><strong>{label}</strong> <span class="required">*</span></legend><div class="radio-row">{choices}</div>{error_html}</fieldset>"#,
        label = escape_html(label),
    )
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© 2024-{year} Study data capture</footer>"#,
        year = current_year
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
