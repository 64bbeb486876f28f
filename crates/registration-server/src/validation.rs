//! Request shape validation, run before the registration core.

use crate::error::FieldError;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Check a registration request, collecting every failing field.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if name.is_empty() {
        errors.push(FieldError::for_param("name", "Name is required"));
    }
    if !is_valid_email(email) {
        errors.push(FieldError::for_param("email", "Please include a valid email"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(FieldError::for_param(
            "password",
            format!(
                "Please enter a password with {} or more characters",
                MIN_PASSWORD_LENGTH
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Loose email shape check: `local@domain.tld` with no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| !label.is_empty())
        && labels.last().is_some_and(|tld| tld.len() >= 2)
}
