//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories:
//! - validating form input
//! - enforcing the title/slug rule for posts
//! - turning storage failures into typed errors

pub mod feedback;
pub mod password;
pub mod post;
pub mod slug;
pub mod user;
pub mod validation;

pub use feedback::{validate_feedback, FeedbackInput};
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use slug::slugify;
pub use user::{UserService, UserServiceError};
pub use validation::FieldErrors;
