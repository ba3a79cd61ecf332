/// Database layer for the portfolio CMS
///
/// Manages the SQLite connection pool and embedded migrations, and holds the
/// small row-decoding helpers shared by every repository.

use crate::error::{CmsError, CmsResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, Sqlite, Transaction};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> CmsResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let connect_options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(if options.enable_wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        })
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await?;

    Ok(pool)
}

/// Run migrations for a database
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> CmsResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| CmsError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> CmsResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Open a write transaction.
///
/// `BEGIN IMMEDIATE` takes the write lock up front, so concurrent writers
/// queue on the busy timeout instead of failing when a deferred read
/// transaction tries to upgrade after another writer committed.
pub async fn begin_write(pool: &SqlitePool) -> CmsResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Parse an RFC 3339 timestamp column
pub fn parse_timestamp(value: &str) -> CmsResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CmsError::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Read a text UUID column
pub fn get_uuid(row: &sqlx::sqlite::SqliteRow, column: &str) -> CmsResult<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw)
        .map_err(|e| CmsError::Internal(format!("Invalid id in column {}: {}", column, e)))
}

/// Read a text RFC 3339 timestamp column
pub fn get_timestamp(row: &sqlx::sqlite::SqliteRow, column: &str) -> CmsResult<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    parse_timestamp(&raw)
}

/// Parse a client-supplied id
pub fn parse_id(value: &str) -> CmsResult<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| CmsError::Validation(format!("Invalid id format: {}", value)))
}

/// Single-connection in-memory pool with the schema applied
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true);

    // One connection that never recycles, so the in-memory database survives
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();

    run_migrations(&pool).await.unwrap();
    pool
}

/// File-backed WAL pool with several connections, for tests with overlapping transactions
#[cfg(test)]
pub async fn file_test_pool(dir: &Path) -> SqlitePool {
    let pool = create_pool(&dir.join("cms.sqlite"), DatabaseOptions::default())
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
