//! Synchrony Cache - Durable synchronization state
//!
//! SQLite-based storage for:
//! - Recorded (last agreed) signatures for the local and remote side
//! - Local and remote deletion tombstones
//! - The remote hash cache used to avoid re-fetching unchanged objects
//!
//! ## Architecture
//!
//! This crate implements the `IStateStore` port from `synchrony-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use synchrony_cache::{DatabasePool, SqliteStateStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/data/project/.synchrony/state.db")).await?;
//! let store = SqliteStateStore::new(pool.pool().clone());
//! // Use store as IStateStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteStateStore;

/// Errors that can occur during state store operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be converted back into a domain value
    #[error("Corrupt state: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
