//! Post repository
//!
//! Database operations for posts. Every write runs inside its own
//! transaction; a failed statement drops the transaction and leaves the
//! table untouched.

use crate::db::{Backend, DynDatabasePool};
use crate::models::Post;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a new post
    async fn create(&self, title: &str, text: &str, slug: &str) -> Result<Post>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Get post by ID, only if its slug also matches
    async fn get_by_id_and_slug(&self, id: i64, slug: &str) -> Result<Option<Post>>;

    /// All posts, newest first
    async fn list(&self) -> Result<Vec<Post>>;

    /// Replace title, text and slug. `None` when no row has this ID.
    async fn update(&self, id: i64, title: &str, text: &str, slug: &str) -> Result<Option<Post>>;

    /// Delete a post. Returns false when no row has this ID.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count total posts
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, title: &str, text: &str, slug: &str) -> Result<Post> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_post_sqlite(pool, title, text, slug).await,
            Backend::Mysql(pool) => create_post_mysql(pool, title, text, slug).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_post_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_post_by_id_mysql(pool, id).await,
        }
    }

    async fn get_by_id_and_slug(&self, id: i64, slug: &str) -> Result<Option<Post>> {
        let post = self.get_by_id(id).await?;
        Ok(post.filter(|p| p.slug == slug))
    }

    async fn list(&self) -> Result<Vec<Post>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_posts_sqlite(pool).await,
            Backend::Mysql(pool) => list_posts_mysql(pool).await,
        }
    }

    async fn update(&self, id: i64, title: &str, text: &str, slug: &str) -> Result<Option<Post>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_post_sqlite(pool, id, title, text, slug).await,
            Backend::Mysql(pool) => update_post_mysql(pool, id, title, text, slug).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => delete_post_sqlite(pool, id).await,
            Backend::Mysql(pool) => delete_post_mysql(pool, id).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_posts_sqlite(pool).await,
            Backend::Mysql(pool) => count_posts_mysql(pool).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, title: &str, text: &str, slug: &str) -> Result<Post> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, text, slug, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(title)
    .bind(text)
    .bind(slug)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create post")?;

    tx.commit().await.context("Failed to commit post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        title: title.to_string(),
        text: text.to_string(),
        slug: slug.to_string(),
        created_at: now,
    })
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, text, slug, created_at
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get post by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_post_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_posts_sqlite(pool: &SqlitePool) -> Result<Vec<Post>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, text, slug, created_at
        FROM posts
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list posts")?;

    rows.iter().map(row_to_post_sqlite).collect()
}

async fn update_post_sqlite(
    pool: &SqlitePool,
    id: i64,
    title: &str,
    text: &str,
    slug: &str,
) -> Result<Option<Post>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, text = ?, slug = ?
        WHERE id = ?
        "#,
    )
    .bind(title)
    .bind(text)
    .bind(slug)
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update post")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let row = sqlx::query(
        r#"
        SELECT id, title, text, slug, created_at
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to reload post after update")?;
    let post = row_to_post_sqlite(&row)?;

    tx.commit().await.context("Failed to commit post update")?;
    Ok(Some(post))
}

async fn delete_post_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post")?;

    tx.commit().await.context("Failed to commit post delete")?;
    Ok(result.rows_affected() > 0)
}

async fn count_posts_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    Ok(row.get("count"))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, title: &str, text: &str, slug: &str) -> Result<Post> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, text, slug, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(title)
    .bind(text)
    .bind(slug)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create post")?;

    tx.commit().await.context("Failed to commit post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        title: title.to_string(),
        text: text.to_string(),
        slug: slug.to_string(),
        created_at: now,
    })
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, text, slug, created_at
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get post by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_post_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_posts_mysql(pool: &MySqlPool) -> Result<Vec<Post>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, text, slug, created_at
        FROM posts
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list posts")?;

    rows.iter().map(row_to_post_mysql).collect()
}

async fn update_post_mysql(
    pool: &MySqlPool,
    id: i64,
    title: &str,
    text: &str,
    slug: &str,
) -> Result<Option<Post>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    // MySQL reports matched-but-unchanged rows as 0 affected, so check existence first.
    let exists = sqlx::query("SELECT id FROM posts WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock post")?;
    if exists.is_none() {
        return Ok(None);
    }

    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, text = ?, slug = ?
        WHERE id = ?
        "#,
    )
    .bind(title)
    .bind(text)
    .bind(slug)
    .bind(id)
    .execute(&mut *tx)
    .await
    .context("Failed to update post")?;

    let row = sqlx::query(
        r#"
        SELECT id, title, text, slug, created_at
        FROM posts
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to reload post after update")?;
    let post = row_to_post_mysql(&row)?;

    tx.commit().await.context("Failed to commit post update")?;
    Ok(Some(post))
}

async fn delete_post_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete post")?;

    tx.commit().await.context("Failed to commit post delete")?;
    Ok(result.rows_affected() > 0)
}

async fn count_posts_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    Ok(row.get("count"))
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        text: row.get("text"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    })
}
