//! SQLite implementation of IStateStore
//!
//! ## Type Mapping
//!
//! | Domain Type    | SQL Type | Strategy                                      |
//! |----------------|----------|-----------------------------------------------|
//! | Side           | TEXT     | `"local"` / `"remote"` via `Side::as_str()`   |
//! | SyncPath       | TEXT     | String via `.as_str()` / `SyncPath::new()`    |
//! | ContentHash    | TEXT     | Hex via `.as_str()` / `ContentHash::new()`    |
//! | u64 sizes      | INTEGER  | Cast through `i64`                            |
//! | DateTime<Utc>  | TEXT     | RFC 3339 with nanoseconds, `Z` suffix         |

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use synchrony_core::domain::{ContentHash, FileSignature, Side, SyncPath, Tombstone};
use synchrony_core::ports::{IStateStore, RemoteObject, SideState};

use crate::CacheError;

/// SQLite-based implementation of the state store port
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Creates a new store backed by the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Fixed-width timestamp text so equal instants always compare equal as strings
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::Corrupt(format!("Invalid timestamp '{s}': {e}")))
}

fn parse_path(s: &str) -> Result<SyncPath, CacheError> {
    SyncPath::new(s).map_err(|e| CacheError::Corrupt(e.to_string()))
}

fn parse_hash(s: &str) -> Result<ContentHash, CacheError> {
    ContentHash::new(s).map_err(|e| CacheError::Corrupt(e.to_string()))
}

fn size_to_sql(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn size_from_sql(size: i64) -> Result<u64, CacheError> {
    u64::try_from(size).map_err(|_| CacheError::Corrupt(format!("Negative size {size}")))
}

fn row_to_signature(row: &SqliteRow) -> Result<FileSignature, CacheError> {
    let path: String = row.try_get("path")?;
    let hash: String = row.try_get("content_hash")?;
    let size: i64 = row.try_get("size_bytes")?;
    let modified: String = row.try_get("last_modified")?;

    Ok(FileSignature::new(
        parse_path(&path)?,
        parse_hash(&hash)?,
        size_from_sql(size)?,
        parse_timestamp(&modified)?,
    ))
}

fn row_to_tombstone(row: &SqliteRow, side: Side) -> Result<Tombstone, CacheError> {
    let path: String = row.try_get("path")?;
    let deleted_at: String = row.try_get("deleted_at")?;

    Ok(Tombstone {
        path: parse_path(&path)?,
        side,
        deleted_at: parse_timestamp(&deleted_at)?,
    })
}

// ============================================================================
// Statements shared by the single-side and both-sides writes
// ============================================================================

const UPSERT_RECORD: &str = "INSERT INTO recorded_state (side, path, content_hash, size_bytes, last_modified)
     VALUES (?, ?, ?, ?, ?)
     ON CONFLICT(side, path) DO UPDATE SET
        content_hash = excluded.content_hash,
        size_bytes = excluded.size_bytes,
        last_modified = excluded.last_modified";

const DELETE_TOMBSTONE: &str = "DELETE FROM tombstones WHERE side = ? AND path = ?";

const DELETE_RECORD: &str = "DELETE FROM recorded_state WHERE side = ? AND path = ?";

const UPSERT_TOMBSTONE: &str = "INSERT INTO tombstones (side, path, deleted_at) VALUES (?, ?, ?)
     ON CONFLICT(side, path) DO UPDATE SET deleted_at = excluded.deleted_at";

impl SqliteStateStore {
    async fn write_saves(&self, records: &[(Side, &FileSignature)]) -> Result<(), CacheError> {
        let mut tx = self.pool.begin().await?;
        for (side, signature) in records {
            sqlx::query(UPSERT_RECORD)
                .bind(side.as_str())
                .bind(signature.path.as_str())
                .bind(signature.content_hash.as_str())
                .bind(size_to_sql(signature.size))
                .bind(format_timestamp(&signature.last_modified))
                .execute(&mut *tx)
                .await?;
            sqlx::query(DELETE_TOMBSTONE)
                .bind(side.as_str())
                .bind(signature.path.as_str())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn write_deletions(
        &self,
        sides: &[Side],
        path: &SyncPath,
        deleted_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let deleted_at = format_timestamp(&deleted_at);
        let mut tx = self.pool.begin().await?;
        for side in sides {
            sqlx::query(DELETE_RECORD)
                .bind(side.as_str())
                .bind(path.as_str())
                .execute(&mut *tx)
                .await?;
            sqlx::query(UPSERT_TOMBSTONE)
                .bind(side.as_str())
                .bind(path.as_str())
                .bind(&deleted_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// IStateStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IStateStore for SqliteStateStore {
    #[instrument(skip(self))]
    async fn load(&self, side: Side) -> anyhow::Result<SideState> {
        let mut state = SideState::default();

        let rows = sqlx::query(
            "SELECT path, content_hash, size_bytes, last_modified
             FROM recorded_state WHERE side = ? ORDER BY path",
        )
        .bind(side.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(CacheError::from)?;
        for row in &rows {
            let sig = row_to_signature(row)?;
            state.recorded.insert(sig.path.clone(), sig);
        }

        let rows = sqlx::query("SELECT path, deleted_at FROM tombstones WHERE side = ? ORDER BY path")
            .bind(side.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(CacheError::from)?;
        for row in &rows {
            let tombstone = row_to_tombstone(row, side)?;
            state.tombstones.insert(tombstone.path.clone(), tombstone);
        }

        debug!(
            recorded = state.recorded.len(),
            tombstones = state.tombstones.len(),
            "Loaded side state"
        );
        Ok(state)
    }

    async fn save(&self, side: Side, signature: &FileSignature) -> anyhow::Result<()> {
        self.write_saves(&[(side, signature)]).await?;
        Ok(())
    }

    async fn mark_deleted(
        &self,
        side: Side,
        path: &SyncPath,
        deleted_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.write_deletions(&[side], path, deleted_at).await?;
        Ok(())
    }

    async fn save_synced(
        &self,
        local: &FileSignature,
        remote: &FileSignature,
    ) -> anyhow::Result<()> {
        self.write_saves(&[(Side::Local, local), (Side::Remote, remote)])
            .await?;
        Ok(())
    }

    async fn mark_deleted_synced(
        &self,
        path: &SyncPath,
        deleted_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.write_deletions(&Side::BOTH, path, deleted_at).await?;
        Ok(())
    }

    async fn cached_remote_hash(
        &self,
        object: &RemoteObject,
    ) -> anyhow::Result<Option<ContentHash>> {
        let row = sqlx::query(
            "SELECT content_hash FROM remote_hash_cache
             WHERE path = ? AND size_bytes = ? AND last_modified = ? AND version IS ?",
        )
        .bind(object.path.as_str())
        .bind(size_to_sql(object.size))
        .bind(format_timestamp(&object.last_modified))
        .bind(object.version.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::from)?;

        match row {
            Some(row) => {
                let hash: String = row.try_get("content_hash").map_err(CacheError::from)?;
                Ok(Some(parse_hash(&hash)?))
            }
            None => Ok(None),
        }
    }

    async fn remember_remote_hash(
        &self,
        object: &RemoteObject,
        hash: &ContentHash,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO remote_hash_cache (path, size_bytes, last_modified, version, content_hash)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET
                size_bytes = excluded.size_bytes,
                last_modified = excluded.last_modified,
                version = excluded.version,
                content_hash = excluded.content_hash",
        )
        .bind(object.path.as_str())
        .bind(size_to_sql(object.size))
        .bind(format_timestamp(&object.last_modified))
        .bind(object.version.as_deref())
        .bind(hash.as_str())
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn reset(&self) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.map_err(CacheError::from)?;
        for table in ["recorded_state", "tombstones", "remote_hash_cache"] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .map_err(CacheError::from)?;
        }
        tx.commit().await.map_err(CacheError::from)?;
        debug!("State store reset");
        Ok(())
    }
}
