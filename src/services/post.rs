//! Post service
//!
//! Business rules for posts:
//! - title and text validation
//! - the slug is always recomputed from the title on create and update
//! - unique title/slug conflicts surface as `DuplicateTitle`

use crate::db::is_unique_violation;
use crate::db::repositories::PostRepository;
use crate::models::{Post, PostInput};
use crate::services::slug::slugify;
use crate::services::validation::{check_length, check_required, FieldErrors};
use anyhow::Context;
use std::sync::Arc;

/// Maximum title length in characters
pub const MAX_TITLE_LEN: usize = 100;
/// Maximum slug length in characters
pub const MAX_SLUG_LEN: usize = 150;

/// Error types for post service operations
#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    /// Post not found
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Another post already uses this title (or its slug)
    #[error("Post title already exists: {0}")]
    DuplicateTitle(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A post input that passed validation, with its derived slug
#[derive(Debug)]
struct ValidPost {
    title: String,
    text: String,
    slug: String,
}

/// Post service
pub struct PostService {
    repo: Arc<dyn PostRepository>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>) -> Self {
        Self { repo }
    }

    /// Create a post
    ///
    /// # Errors
    ///
    /// - `ValidationError` for an empty or overlong title, a title with no
    ///   usable slug, or empty text
    /// - `DuplicateTitle` if the title or its slug is taken; nothing is stored
    pub async fn create(&self, input: PostInput) -> Result<Post, PostServiceError> {
        let valid = validate(input)?;

        match self.repo.create(&valid.title, &valid.text, &valid.slug).await {
            Ok(post) => {
                tracing::info!("Created post {} ({})", post.id, post.slug);
                Ok(post)
            }
            Err(e) if is_unique_violation(&e) => Err(PostServiceError::DuplicateTitle(valid.title)),
            Err(e) => Err(PostServiceError::InternalError(e)),
        }
    }

    /// Get post by ID
    pub async fn get(&self, id: i64) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound(id))
    }

    /// Get post by its `(id, slug)` pair; a mismatched slug is `NotFound`
    pub async fn get_by_id_and_slug(&self, id: i64, slug: &str) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_id_and_slug(id, slug)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound(id))
    }

    /// All posts, newest first
    pub async fn list(&self) -> Result<Vec<Post>, PostServiceError> {
        Ok(self.repo.list().await.context("Failed to list posts")?)
    }

    /// Replace a post's title and text, regenerating its slug
    ///
    /// # Errors
    ///
    /// - `NotFound` if no post has this ID
    /// - `ValidationError` as for `create`
    /// - `DuplicateTitle` if another post holds the title or slug; the row
    ///   is left unchanged
    pub async fn update(&self, id: i64, input: PostInput) -> Result<Post, PostServiceError> {
        let valid = validate(input)?;

        match self.repo.update(id, &valid.title, &valid.text, &valid.slug).await {
            Ok(Some(post)) => {
                tracing::info!("Updated post {} ({})", post.id, post.slug);
                Ok(post)
            }
            Ok(None) => Err(PostServiceError::NotFound(id)),
            Err(e) if is_unique_violation(&e) => Err(PostServiceError::DuplicateTitle(valid.title)),
            Err(e) => Err(PostServiceError::InternalError(e)),
        }
    }

    /// Delete a post
    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        let deleted = self.repo.delete(id).await.context("Failed to delete post")?;
        if !deleted {
            return Err(PostServiceError::NotFound(id));
        }
        tracing::info!("Deleted post {}", id);
        Ok(())
    }

    /// Count total posts
    pub async fn count(&self) -> Result<i64, PostServiceError> {
        Ok(self.repo.count().await.context("Failed to count posts")?)
    }
}

fn validate(input: PostInput) -> Result<ValidPost, PostServiceError> {
    let title = input.title.trim().to_string();
    let slug = slugify(&title);
    let mut errors = FieldErrors::new();

    check_required(&mut errors, "title", &title);
    check_length(&mut errors, "title", &title, 0, MAX_TITLE_LEN);
    if !title.is_empty() && slug.is_empty() {
        errors.add("title", "Title must contain at least one letter or digit.");
    }
    if slug.chars().count() > MAX_SLUG_LEN {
        errors.add("title", "Title produces a slug that is too long.");
    }
    check_required(&mut errors, "text", &input.text);

    errors
        .into_result()
        .map_err(PostServiceError::ValidationError)?;

    Ok(ValidPost {
        title,
        text: input.text,
        slug,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxPostRepository;
    use crate::db::{create_test_pool, migrations};
    use proptest::prelude::*;

    async fn setup_test_service() -> PostService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        PostService::new(SqlxPostRepository::boxed(pool))
    }

    fn input(title: &str, text: &str) -> PostInput {
        PostInput {
            title: title.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_sets_slug_from_title() {
        let service = setup_test_service().await;
        let post = service.create(input("Hello, World!", "body")).await.unwrap();
        assert_eq!(post.slug, "hello-world");

        let fetched = service.get_by_id_and_slug(post.id, "hello-world").await.unwrap();
        assert_eq!(fetched.title, "Hello, World!");
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = setup_test_service().await;

        for (title, text) in [("", "body"), ("   ", "body"), ("Title", ""), ("?!", "body")] {
            let result = service.create(input(title, text)).await;
            assert!(
                matches!(result, Err(PostServiceError::ValidationError(_))),
                "{:?} / {:?} should be rejected",
                title,
                text
            );
        }

        let long_title = "a".repeat(MAX_TITLE_LEN + 1);
        let result = service.create(input(&long_title, "body")).await;
        assert!(matches!(result, Err(PostServiceError::ValidationError(_))));

        assert_eq!(service.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_title_at_length_limit_accepted() {
        let service = setup_test_service().await;
        let title = "b".repeat(MAX_TITLE_LEN);
        assert!(service.create(input(&title, "body")).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_title() {
        let service = setup_test_service().await;
        let first = service.create(input("Same", "first")).await.unwrap();

        let result = service.create(input("Same", "second")).await;
        assert!(matches!(result, Err(PostServiceError::DuplicateTitle(_))));

        assert_eq!(service.count().await.unwrap(), 1);
        let unchanged = service.get(first.id).await.unwrap();
        assert_eq!(unchanged.text, "first");
    }

    #[tokio::test]
    async fn test_slug_collision_is_duplicate_title() {
        let service = setup_test_service().await;
        service.create(input("Hello World", "first")).await.unwrap();

        let result = service.create(input("hello world!", "second")).await;
        assert!(matches!(result, Err(PostServiceError::DuplicateTitle(_))));
    }

    #[tokio::test]
    async fn test_detail_slug_mismatch_not_found() {
        let service = setup_test_service().await;
        let post = service.create(input("Real", "body")).await.unwrap();

        let result = service.get_by_id_and_slug(post.id, "fake").await;
        assert!(matches!(result, Err(PostServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_regenerates_slug() {
        let service = setup_test_service().await;
        let post = service.create(input("Before", "body")).await.unwrap();

        let updated = service.update(post.id, input("After Edit", "new body")).await.unwrap();
        assert_eq!(updated.slug, "after-edit");
        assert_eq!(updated.text, "new body");
        assert!(service.get_by_id_and_slug(post.id, "before").await.is_err());
    }

    #[tokio::test]
    async fn test_update_duplicate_leaves_row() {
        let service = setup_test_service().await;
        service.create(input("Taken", "a")).await.unwrap();
        let post = service.create(input("Mine", "b")).await.unwrap();

        let result = service.update(post.id, input("Taken", "changed")).await;
        assert!(matches!(result, Err(PostServiceError::DuplicateTitle(_))));

        let unchanged = service.get(post.id).await.unwrap();
        assert_eq!(unchanged.title, "Mine");
        assert_eq!(unchanged.slug, "mine");
    }

    #[tokio::test]
    async fn test_update_missing() {
        let service = setup_test_service().await;
        let result = service.update(404, input("Title", "text")).await;
        assert!(matches!(result, Err(PostServiceError::NotFound(404))));
    }

    #[tokio::test]
    async fn test_delete() {
        let service = setup_test_service().await;
        let post = service.create(input("Doomed", "body")).await.unwrap();

        service.delete(post.id).await.unwrap();
        assert!(matches!(service.get(post.id).await, Err(PostServiceError::NotFound(_))));
        assert!(matches!(service.delete(post.id).await, Err(PostServiceError::NotFound(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_created_slug_matches_title(title in "[A-Za-z0-9][A-Za-z0-9 ,.!?'-]{0,60}") {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let service = setup_test_service().await;
                let post = service.create(input(&title, "body")).await.unwrap();
                let fetched = service.get(post.id).await.unwrap();
                assert_eq!(fetched.slug, slugify(title.trim()));
            });
        }
    }
}
