//! State store port (driven/secondary port)
//!
//! Durable per-side history: the last agreed signature of every path,
//! deletion tombstones, and the cache of content hashes computed for remote
//! objects.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//!   Any error from this port is fatal for the run.
//! - Every write is scoped to a single path so partial progress through a
//!   batch survives later failures.
//! - [`IStateStore::save_synced`] and [`IStateStore::mark_deleted_synced`]
//!   have default implementations that write each side separately;
//!   adapters with transactions should override them to write both sides
//!   atomically.

use chrono::{DateTime, Utc};

use crate::domain::{
    newtypes::{ContentHash, SyncPath},
    signature::{FileSignature, RecordedState, Side, Tombstones},
};
use crate::ports::storage_backend::RemoteObject;

/// Recorded state and tombstones for one side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideState {
    pub recorded: RecordedState,
    pub tombstones: Tombstones,
}

#[async_trait::async_trait]
pub trait IStateStore: Send + Sync {
    /// Load everything recorded for `side`
    async fn load(&self, side: Side) -> anyhow::Result<SideState>;

    /// Upsert the recorded signature for a path and clear its tombstone
    async fn save(&self, side: Side, signature: &FileSignature) -> anyhow::Result<()>;

    /// Remove the recorded signature for a path and write a tombstone
    async fn mark_deleted(
        &self,
        side: Side,
        path: &SyncPath,
        deleted_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Record that both sides now hold the same content. The signatures
    /// share a hash but keep each side's own size and timestamp.
    async fn save_synced(
        &self,
        local: &FileSignature,
        remote: &FileSignature,
    ) -> anyhow::Result<()> {
        self.save(Side::Local, local).await?;
        self.save(Side::Remote, remote).await
    }

    /// Record that `path` is now gone from both sides
    async fn mark_deleted_synced(
        &self,
        path: &SyncPath,
        deleted_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        for side in Side::BOTH {
            self.mark_deleted(side, path, deleted_at).await?;
        }
        Ok(())
    }

    /// Hash previously computed for this exact remote object version
    async fn cached_remote_hash(&self, object: &RemoteObject)
        -> anyhow::Result<Option<ContentHash>>;

    /// Remember the hash of a fetched remote object
    async fn remember_remote_hash(
        &self,
        object: &RemoteObject,
        hash: &ContentHash,
    ) -> anyhow::Result<()>;

    /// Erase all recorded state, tombstones and cached hashes
    async fn reset(&self) -> anyhow::Result<()>;
}
