//! Post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Post entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Unique title
    pub title: String,
    /// Body text
    pub text: String,
    /// URL-friendly slug, always derived from the title
    pub slug: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Path of the detail page for this post
    pub fn url(&self) -> String {
        format!("/post/{}/{}", self.id, self.slug)
    }
}

/// Form input for creating or editing a post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_url() {
        let post = Post {
            id: 7,
            title: "Hello World".to_string(),
            text: "body".to_string(),
            slug: "hello-world".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(post.url(), "/post/7/hello-world");
    }
}
