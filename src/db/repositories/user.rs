//! User repository
//!
//! Database operations for users and their profiles.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL
//!
//! A user and its profile are always written in one transaction, so a
//! failed registration never leaves half an account behind.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{NewProfile, Profile, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a user together with its profile
    async fn create_with_profile(
        &self,
        email: &str,
        password_hash: &str,
        profile: &NewProfile,
    ) -> Result<(User, Profile)>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get the profile owned by a user
    async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>>;

    /// Count total users
    async fn count(&self) -> Result<i64>;

    /// Count total profiles
    async fn count_profiles(&self) -> Result<i64>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create_with_profile(
        &self,
        email: &str,
        password_hash: &str,
        profile: &NewProfile,
    ) -> Result<(User, Profile)> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, email, password_hash, profile).await,
            Backend::Mysql(pool) => create_user_mysql(pool, email, password_hash, profile).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_user_by_id_mysql(pool, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_email_sqlite(pool, email).await,
            Backend::Mysql(pool) => get_user_by_email_mysql(pool, email).await,
        }
    }

    async fn get_profile(&self, user_id: i64) -> Result<Option<Profile>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_profile_sqlite(pool, user_id).await,
            Backend::Mysql(pool) => get_profile_mysql(pool, user_id).await,
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_sqlite(pool, "SELECT COUNT(*) as count FROM users").await,
            Backend::Mysql(pool) => count_mysql(pool, "SELECT COUNT(*) as count FROM users").await,
        }
    }

    async fn count_profiles(&self) -> Result<i64> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_sqlite(pool, "SELECT COUNT(*) as count FROM profiles").await,
            Backend::Mysql(pool) => count_mysql(pool, "SELECT COUNT(*) as count FROM profiles").await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(
    pool: &SqlitePool,
    email: &str,
    password_hash: &str,
    profile: &NewProfile,
) -> Result<(User, Profile)> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let user_id = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create user")?
    .last_insert_rowid();

    let profile_id = sqlx::query(
        r#"
        INSERT INTO profiles (name, age, city, user_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&profile.name)
    .bind(profile.age)
    .bind(&profile.city)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .context("Failed to create profile")?
    .last_insert_rowid();

    tx.commit().await.context("Failed to commit registration")?;

    Ok(assemble(user_id, profile_id, email, password_hash, profile, now))
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, email, password_hash, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_user_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, email, password_hash, created_at
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by email")?;

    match row {
        Some(row) => Ok(Some(row_to_user_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn get_profile_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Option<Profile>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, age, city, user_id
        FROM profiles
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get profile")?;

    Ok(row.map(|row| Profile {
        id: row.get("id"),
        name: row.get("name"),
        age: row.get("age"),
        city: row.get("city"),
        user_id: row.get("user_id"),
    }))
}

async fn count_sqlite(pool: &SqlitePool, query: &str) -> Result<i64> {
    let row = sqlx::query(query)
        .fetch_one(pool)
        .await
        .with_context(|| format!("Failed to count: {}", query))?;

    Ok(row.get("count"))
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(
    pool: &MySqlPool,
    email: &str,
    password_hash: &str,
    profile: &NewProfile,
) -> Result<(User, Profile)> {
    let now = Utc::now();
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let user_id = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create user")?
    .last_insert_id() as i64;

    let profile_id = sqlx::query(
        r#"
        INSERT INTO profiles (name, age, city, user_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&profile.name)
    .bind(profile.age)
    .bind(&profile.city)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .context("Failed to create profile")?
    .last_insert_id() as i64;

    tx.commit().await.context("Failed to commit registration")?;

    Ok(assemble(user_id, profile_id, email, password_hash, profile, now))
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, email, password_hash, created_at
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_user_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT id, email, password_hash, created_at
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by email")?;

    match row {
        Some(row) => Ok(Some(row_to_user_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn get_profile_mysql(pool: &MySqlPool, user_id: i64) -> Result<Option<Profile>> {
    let row = sqlx::query(
        r#"
        SELECT id, name, age, city, user_id
        FROM profiles
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get profile")?;

    Ok(row.map(|row| Profile {
        id: row.get("id"),
        name: row.get("name"),
        age: row.get("age"),
        city: row.get("city"),
        user_id: row.get("user_id"),
    }))
}

async fn count_mysql(pool: &MySqlPool, query: &str) -> Result<i64> {
    let row = sqlx::query(query)
        .fetch_one(pool)
        .await
        .with_context(|| format!("Failed to count: {}", query))?;

    Ok(row.get("count"))
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    })
}

fn assemble(
    user_id: i64,
    profile_id: i64,
    email: &str,
    password_hash: &str,
    profile: &NewProfile,
    created_at: chrono::DateTime<Utc>,
) -> (User, Profile) {
    (
        User {
            id: user_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        },
        Profile {
            id: profile_id,
            name: profile.name.clone(),
            age: profile.age,
            city: profile.city.clone(),
            user_id,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, is_unique_violation, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn profile(name: &str) -> NewProfile {
        NewProfile {
            name: name.to_string(),
            age: Some(30),
            city: "Kyiv".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_with_profile() {
        let repo = setup_test_repo().await;

        let (user, prof) = repo
            .create_with_profile("alice@example.com", "hash", &profile("Alice"))
            .await
            .unwrap();
        assert!(user.id > 0);
        assert_eq!(prof.user_id, user.id);

        let fetched = repo.get_profile(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Alice");
        assert_eq!(fetched.age, Some(30));
        assert_eq!(fetched.city, "Kyiv");
    }

    #[tokio::test]
    async fn test_optional_age_round_trips_as_null() {
        let repo = setup_test_repo().await;
        let new_profile = NewProfile {
            name: "Bob".to_string(),
            age: None,
            city: String::new(),
        };

        let (user, _) = repo
            .create_with_profile("bob@example.com", "hash", &new_profile)
            .await
            .unwrap();
        let fetched = repo.get_profile(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.age, None);
    }

    #[tokio::test]
    async fn test_get_by_email_and_id() {
        let repo = setup_test_repo().await;
        let (user, _) = repo
            .create_with_profile("carol@example.com", "hash", &profile("Carol"))
            .await
            .unwrap();

        let by_email = repo.get_by_email("carol@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(by_email.password_hash, "hash");

        let by_id = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "carol@example.com");

        assert!(repo.get_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_persists_nothing() {
        let repo = setup_test_repo().await;
        repo.create_with_profile("dup@example.com", "hash", &profile("First"))
            .await
            .unwrap();

        let err = repo
            .create_with_profile("dup@example.com", "other", &profile("Second"))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.count_profiles().await.unwrap(), 1);
    }
}
