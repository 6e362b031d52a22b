//! State database connection pool
//!
//! Wraps SQLx's SqlitePool with:
//! - Automatic directory creation for the database file
//! - WAL journal mode
//! - Schema migration on open
//! - An in-memory mode for tests

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

/// Pool of SQLite connections for one synchronized tree's state database
///
/// - WAL journal mode
/// - 4 max connections for file-based databases
/// - 1 connection for in-memory databases (each connection would otherwise
///   see its own empty database)
/// - 5-second busy timeout
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database at `db_path` and runs migrations
    ///
    /// # Errors
    ///
    /// `ConnectionFailed` when the file cannot be created or opened,
    /// `MigrationFailed` when the schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("cannot open {}: {e}", db_path.display()))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(path = %db_path.display(), "State database opened");

        Ok(Self { pool })
    }

    /// Private, throwaway database with the full schema, used by tests
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory database: {e}")))?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory state database initialized");

        Ok(Self { pool })
    }

    /// Shared handle for [`crate::SqliteStateStore::new`]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection, flushing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), CacheError> {
        let migration_sql = include_str!("migrations/20260301_initial.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("state schema: {e}")))?;

        tracing::debug!("State database migrations completed");
        Ok(())
    }
}
