//! Database module for persistent storage of the indexed aggregates.
//!
//! This module provides SQLite-based storage for:
//! - The five aggregate tables and jackpot seen-facts
//! - Verbatim event records, which double as the applied-event marker
//! - Indexer state (the per-chain block cursor)
//!
//! # Architecture
//!
//! - `models`: Data structures that map to database tables
//! - `repository`: Changeset writes and read-side queries
//! - Connection pooling with SQLite WAL mode for concurrency
//! - Migration system for schema versioning

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{IndexerError, IndexerResult};

pub mod models;
pub mod repository;

pub use repository::Repository;

/// Tables the migrations must have created.
const REQUIRED_TABLES: [&str; 8] = [
    "global_stats",
    "player_stats",
    "weekly_stats",
    "player_weekly_stats",
    "jackpot_stats",
    "jackpot_player_seen",
    "event_records",
    "indexer_state",
];

/// Whether `database_url` names an in-memory database.
fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Creates a SQLite connection pool, then migrates and verifies the schema.
///
/// # Configuration
///
/// - **WAL mode**: Enables concurrent readers during writes
/// - **Busy timeout**: 30 seconds to handle lock contention
/// - **Max connections**: 5 (suitable for single-machine indexer)
/// - **Min connections**: 1 (keep one connection warm)
///
/// An in-memory database lives inside a single connection, so its pool is
/// pinned to one connection that is never recycled.
///
/// # Example
///
/// ```no_run
/// use keyvault_indexer::db::create_pool;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool("sqlite:./indexer.db").await?;
///     // Use pool for queries
///     Ok(())
/// }
/// ```
///
/// # Errors
///
/// Returns an error if the URL is invalid, the database cannot be opened, or
/// migrations fail.
pub async fn create_pool(database_url: &str) -> IndexerResult<SqlitePool> {
    info!(database_url, "Connecting to database");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| {
            IndexerError::database(
                format!("Failed to parse database URL: {database_url}"),
                Some(Box::new(e)),
            )
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let pool_options = if is_in_memory(database_url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5).min_connections(1)
    };

    let pool = pool_options
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| {
            IndexerError::database(
                format!("Failed to connect to database at {database_url}"),
                Some(Box::new(e)),
            )
        })?;

    info!("Running database migrations");
    run_migrations(&pool).await?;
    verify_database(&pool).await?;
    info!("Database migrations complete");

    Ok(pool)
}

/// Runs database migrations to ensure schema is up-to-date.
///
/// Applies pending migrations from the `migrations/` directory in order.
/// Safe to run repeatedly.
///
/// # Errors
///
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &SqlitePool) -> IndexerResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            IndexerError::database("Failed to run database migrations", Some(Box::new(e)))
        })?;

    Ok(())
}

/// Verify that required tables exist after migrations.
///
/// # Errors
///
/// Returns an error listing the missing tables.
pub async fn verify_database(pool: &SqlitePool) -> IndexerResult<()> {
    let rows = sqlx::query_as::<_, (String,)>("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(pool)
        .await
        .map_err(|e| {
            IndexerError::database("Failed to verify database schema", Some(Box::new(e)))
        })?;

    let missing: Vec<&str> = REQUIRED_TABLES
        .into_iter()
        .filter(|table| !rows.iter().any(|(name,)| name == table))
        .collect();

    if !missing.is_empty() {
        return Err(IndexerError::database(
            format!("Database schema incomplete, missing: {}", missing.join(", ")),
            None,
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_pool_and_migrations() {
        let pool = create_pool("sqlite::memory:")
            .await
            .expect("Failed to create pool");

        // Running again is a no-op.
        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let result: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table'")
                .fetch_one(&pool)
                .await
                .expect("Failed to query tables");

        // Eight tables plus the migration history table
        assert!(result.0 >= 9, "Expected at least 9 tables, got {}", result.0);
    }

    #[tokio::test]
    async fn test_wal_mode_enabled_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("wal.db").display());
        let pool = create_pool(&url).await.expect("Failed to create pool");

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("Failed to query journal mode");

        assert_eq!(result.0, "wal");
    }

    #[tokio::test]
    async fn test_memory_mode_for_in_memory_database() {
        // SQLite falls back to 'memory' journal mode for :memory: databases
        let pool = create_pool("sqlite::memory:")
            .await
            .expect("Failed to create pool");

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .expect("Failed to query journal mode");

        assert_eq!(result.0, "memory");
    }

    #[tokio::test]
    async fn test_verify_reports_missing_tables() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let err = verify_database(&pool).await.unwrap_err();
        assert!(err.to_string().contains("player_stats"));
    }

    #[test]
    fn test_is_in_memory() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite:file:test?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite:./indexer.db"));
    }
}
