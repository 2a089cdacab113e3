//! Form field validation
//!
//! Small checks shared by the registration, login and post forms. Errors
//! are collected per field so a form can be re-rendered with each message
//! next to the input that caused it.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Validation messages keyed by form field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for one field
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Check a length in characters (not bytes) against inclusive bounds
pub fn check_length(errors: &mut FieldErrors, field: &str, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len < min || len > max {
        let message = if min == 0 {
            format!("Field cannot be longer than {} characters.", max)
        } else {
            format!("Field must be between {} and {} characters long.", min, max)
        };
        errors.add(field, message);
    }
}

/// Require a non-blank value
pub fn check_required(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
    }
}

/// Syntactic email check: one `@`, a non-empty local part and a dotted
/// domain without empty labels or whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 255 || email.chars().any(char::is_whitespace) {
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
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

pub fn check_email(errors: &mut FieldErrors, field: &str, value: &str) {
    if !is_valid_email(value) {
        errors.add(field, "Invalid email address.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(is_valid_email("имя@пример.рф"));
    }

    #[test]
    fn test_invalid_emails() {
        for email in [
            "",
            "plain",
            "@example.com",
            "user@",
            "user@localhost",
            "user@exa mple.com",
            "user@@example.com",
            "user@example..com",
            "user@-example.com",
        ] {
            assert!(!is_valid_email(email), "{} should be rejected", email);
        }
    }

    #[test]
    fn test_check_length_counts_characters() {
        let mut errors = FieldErrors::new();
        check_length(&mut errors, "name", "Женя", 4, 100);
        assert!(errors.is_empty());

        check_length(&mut errors, "name", "abc", 4, 100);
        assert_eq!(
            errors.get("name"),
            ["Field must be between 4 and 100 characters long.".to_string()]
        );
    }

    #[test]
    fn test_check_length_max_only_message() {
        let mut errors = FieldErrors::new();
        check_length(&mut errors, "city", &"x".repeat(101), 0, 100);
        assert_eq!(
            errors.get("city"),
            ["Field cannot be longer than 100 characters.".to_string()]
        );
    }

    #[test]
    fn test_into_result_and_display() {
        assert!(FieldErrors::new().into_result().is_ok());

        let mut errors = FieldErrors::new();
        errors.add("password2", "Passwords do not match.");
        check_required(&mut errors, "email", "  ");
        let err = errors.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "email: This field is required.; password2: Passwords do not match."
        );
        assert!(err.get("title").is_empty());
    }
}
