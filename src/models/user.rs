//! User and profile models
//!
//! A `User` holds the login credentials; its `Profile` holds the personal
//! details entered at registration. The two are created together and a
//! profile never outlives its user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Profile entity, one per user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub age: Option<i32>,
    pub city: String,
    pub user_id: i64,
}

/// Profile fields supplied at registration
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub name: String,
    pub age: Option<i32>,
    pub city: String,
}

/// Registration form
///
/// `age` arrives as raw text so an empty field and a malformed number can
/// be told apart during validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

/// Login form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Checkbox; browsers send `on` when ticked and omit it otherwise
    #[serde(default)]
    pub remember: Option<String>,
}

impl LoginInput {
    pub fn remember(&self) -> bool {
        self.remember.as_deref().is_some_and(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: 1,
            email: "a@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_login_remember_checkbox() {
        let mut input = LoginInput::default();
        assert!(!input.remember());
        input.remember = Some("on".to_string());
        assert!(input.remember());
    }
}
