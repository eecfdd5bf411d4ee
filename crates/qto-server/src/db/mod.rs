//! Database access for the QTO server
//!
//! The job state store lives on SQLite so it runs embedded in production and
//! fully in-memory under test. Migrations are embedded at compile time from
//! the workspace-level `migrations/` directory.

pub mod jobs;

pub use jobs::JobStore;

use crate::config::DatabaseConfig;
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// Open a connection pool and bring the schema up to date.
///
/// In-memory URLs (`sqlite::memory:`) must use `max_connections = 1`, since
/// every connection would otherwise see its own empty database.
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .context("Invalid database URL")?
        .create_if_missing(true);

    let max_connections = if config.url.contains(":memory:") {
        1
    } else {
        config.max_connections
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_with(options)
        .await
        .context("Failed to open database")?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    Ok(pool)
}
