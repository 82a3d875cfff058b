//! Database pool, migrations and health probe for HomeLift
//!
//! Postgres is the only shared mutable resource; every service holds a clone
//! of the same pool.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::{Duration, Instant};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),
}

/// Pool sized from `DB_MAX_CONNECTIONS`
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(
        max_connections = config.db_max_connections,
        "Connecting to database at {}",
        config.database_url_masked()
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    Ok(pool)
}

/// Apply the embedded `migrations/` directory
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    let migrator = sqlx::migrate!("./migrations");
    tracing::info!(count = migrator.iter().count(), "Applying database migrations");

    migrator
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    Ok(())
}

/// Round-trip a trivial query; returns how long it took
pub async fn check_health(pool: &PgPool) -> Result<Duration, DbError> {
    let started = Instant::now();
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| DbError::HealthCheckError(e.to_string()))?;

    Ok(started.elapsed())
}
