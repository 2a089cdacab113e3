//! Database layer
//!
//! Supports SQLite (default, single-file deployment) and MySQL. The driver
//! is picked from configuration and hidden behind the `DatabasePool` trait;
//! repositories run every write inside a scoped transaction.
//!
//! ```ignore
//! use inkwell::config::DatabaseConfig;
//! use inkwell::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};

/// Whether an error chain bottoms out in a unique-constraint violation.
///
/// Repositories wrap sqlx errors in `anyhow` context, so the chain is walked
/// rather than downcasting only the outermost error.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
        _ => false,
    })
}
