//! Database connection pool management

use anyhow::{Context, Result};
use sqlx::{
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Settings;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a SQLite connection pool and bring the schema up to date
pub async fn create_pool(settings: &Settings) -> Result<SqlitePool> {
    let connect_options = SqliteConnectOptions::from_str(&settings.database_url)
        .context("Invalid DATABASE_URL")?
        .create_if_missing(true)
        .foreign_keys(true);

    // Every connection to an in-memory database sees its own empty database,
    // so such pools are pinned to one connection that is never recycled.
    let in_memory = settings.database_url.contains(":memory:");
    let max_connections = if in_memory {
        1
    } else {
        settings.database_max_connections
    };

    let mut options = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5));
    options = if in_memory {
        options.idle_timeout(None).max_lifetime(None)
    } else {
        options
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800))
    };

    let pool = options
        .connect_with(connect_options)
        .await
        .context("Failed to open the database")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(
        max_connections,
        "Database connection pool established"
    );

    Ok(pool)
}

/// Lightweight health check for database connectivity
pub async fn health_check(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}
