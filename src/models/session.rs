//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login session; the browser only ever holds `id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Random token stored in the `session` cookie
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Start a new session for `user_id` that lasts `lifetime`
    pub fn new(user_id: i64, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + lifetime,
            created_at: now,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_live() {
        let session = Session::new(3, Duration::days(7));
        assert_eq!(session.user_id, 3);
        assert!(!session.is_expired());
        assert!(Uuid::parse_str(&session.id).is_ok());
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = Session::new(1, Duration::days(1));
        let b = Session::new(1, Duration::days(1));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_negative_lifetime_is_expired() {
        let session = Session::new(1, Duration::seconds(-1));
        assert!(session.is_expired());
    }
}
