//! Feedback form
//!
//! The form has no backing store; submitting it only checks the name.

use serde::Deserialize;

/// Feedback form input
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

/// A submission is accepted when the name is longer than three characters.
pub fn validate_feedback(input: &FeedbackInput) -> bool {
    input.username.chars().count() > 3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(username: &str) -> FeedbackInput {
        FeedbackInput {
            username: username.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_name_length_threshold() {
        assert!(!validate_feedback(&named("")));
        assert!(!validate_feedback(&named("Bob")));
        assert!(validate_feedback(&named("Bobby")));
        assert!(validate_feedback(&named("Анна")));
    }
}
