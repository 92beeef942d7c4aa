//! SQLite persistence for the margin annotation engine.
//!
//! Provides the connection pool, startup schema initialization, row models,
//! and repositories for sessions, annotations, and the durable event log.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub mod models;
pub mod repositories;

pub type DbPool = sqlx::SqlitePool;

/// Embedded schema DDL, applied idempotently at startup.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Create a connection pool from a database URL.
///
/// The database file is created if missing, and file-backed databases use
/// WAL journaling. In-memory databases (used by tests) are pinned to a
/// single connection so every query sees the same database.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

    let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 5 })
        .connect_with(options)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the schema. Every statement is `IF NOT EXISTS`, so this is safe
/// to run on every startup.
pub async fn init_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}
