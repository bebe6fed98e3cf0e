use std::sync::LazyLock;

use regex::Regex;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\S+@\S+\.\S+$").expect("email pattern compiles")
});

pub const PASSWORD_MIN_LEN: usize = 6;

/// Collected `(field, message)` pairs for inline display.
pub type FieldErrors = Vec<(&'static str, String)>;

pub fn require(errors: &mut FieldErrors, field: &'static str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.push((field, message.to_string()));
    }
}

pub fn check_email(errors: &mut FieldErrors, field: &'static str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        errors.push((field, "Email is required".to_string()));
    } else if !EMAIL_PATTERN.is_match(value) {
        errors.push((field, "Enter a valid email".to_string()));
    }
}

pub fn check_new_password(errors: &mut FieldErrors, password: &str, confirm: &str) {
    if password.is_empty() {
        errors.push(("password", "Password is required".to_string()));
    } else if password.chars().count() < PASSWORD_MIN_LEN {
        errors.push(("password", format!("Min {PASSWORD_MIN_LEN} characters")));
    }

    if confirm.is_empty() {
        errors.push(("confirm_password", "Confirm your password".to_string()));
    } else if confirm != password {
        errors.push(("confirm_password", "Passwords do not match".to_string()));
    }
}

pub fn error_for<'a>(errors: &'a FieldErrors, field: &str) -> Option<&'a str> {
    errors
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, message)| message.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_must_look_like_an_address() {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, "email", "dana@example.org");
        assert!(errors.is_empty());

        check_email(&mut errors, "email", "dana@example");
        check_email(&mut errors, "email", "  ");
        assert_eq!(errors[0].1, "Enter a valid email");
        assert_eq!(errors[1].1, "Email is required");
    }

    #[test]
    fn password_rules() {
        let mut errors = FieldErrors::new();
        check_new_password(&mut errors, "abc", "abc");
        assert_eq!(error_for(&errors, "password"), Some("Min 6 characters"));

        let mut errors = FieldErrors::new();
        check_new_password(&mut errors, "secret1", "secret2");
        assert_eq!(
            error_for(&errors, "confirm_password"),
            Some("Passwords do not match")
        );

        let mut errors = FieldErrors::new();
        check_new_password(&mut errors, "secret1", "secret1");
        assert!(errors.is_empty());
    }

    #[test]
    fn require_flags_blank_values() {
        let mut errors = FieldErrors::new();
        require(&mut errors, "name", "   ", "Name is required");
        require(&mut errors, "site", "Leiden", "Site is required");
        assert_eq!(errors, vec![("name", "Name is required".to_string())]);
    }
}
