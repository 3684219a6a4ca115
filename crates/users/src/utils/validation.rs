//! Input validation utilities.

use regex::Regex;

use crate::types::UserError;

fn pattern(source: &str) -> Result<Regex, UserError> {
    Regex::new(source).map_err(|err| UserError::Validation(format!("invalid pattern: {err}")))
}

/// Trimmed value of a required field, or `MissingField` when absent or blank.
pub fn require<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, UserError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(UserError::MissingField(field)),
    }
}

pub fn validate_email(email: &str) -> Result<(), UserError> {
    let email_regex = pattern(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}$")?;
    if email.len() > 255 || !email_regex.is_match(email) {
        return Err(UserError::Validation("Invalid email format".to_string()));
    }
    Ok(())
}

/// At least eight letters or digits, with a lowercase letter, an uppercase letter and a digit.
pub fn validate_password(password: &str) -> Result<(), UserError> {
    if password.len() < 8 {
        return Err(UserError::Validation("Password must be at least 8 characters long".to_string()));
    }

    if !pattern(r"^[A-Za-z0-9]{8,}$")?.is_match(password) {
        return Err(UserError::Validation("Password may contain only letters and digits".to_string()));
    }

    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !(has_lowercase && has_uppercase && has_digit) {
        return Err(UserError::Validation(
            "Password must contain a lowercase letter, an uppercase letter and a digit".to_string(),
        ));
    }

    Ok(())
}

/// Strip spaces and dashes, then require 9 to 15 digits with an optional leading `+`.
pub fn normalize_phone(phone: &str) -> Result<String, UserError> {
    let compact: String = phone.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !pattern(r"^\+?[0-9]{9,15}$")?.is_match(&compact) {
        return Err(UserError::Validation("Invalid phone number".to_string()));
    }
    Ok(compact)
}
