//! Data models
//!
//! Plain data carried between the repositories, services and handlers:
//! - Database entities (Post, User, Profile, Session)
//! - Form inputs
//! - The request-scoped `Identity`

mod identity;
mod post;
mod session;
mod user;

pub use identity::{Identity, UserId};
pub use post::{Post, PostInput};
pub use session::Session;
pub use user::{LoginInput, NewProfile, Profile, RegisterInput, User};
