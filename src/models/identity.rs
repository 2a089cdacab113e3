//! Request identity
//!
//! Every request is resolved to exactly one `Identity` before it reaches a
//! handler. There is no ambient "current user": handlers and templates get
//! the identity passed in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of a `users` row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is making the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    Authenticated(UserId),
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(id) => Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_accessors() {
        assert!(!Identity::Anonymous.is_authenticated());
        assert_eq!(Identity::Anonymous.user_id(), None);

        let identity = Identity::Authenticated(UserId(42));
        assert!(identity.is_authenticated());
        assert_eq!(identity.user_id(), Some(UserId(42)));
        assert_eq!(UserId(42).to_string(), "42");
    }

    #[test]
    fn test_default_is_anonymous() {
        assert_eq!(Identity::default(), Identity::Anonymous);
    }
}
