//! Shared remote history
//!
//! The private state database holds what *this* user last agreed on. What
//! collaborators learn from each other lives on the remote, in
//! `<prefix>/.synchrony/index.json`:
//!
//! - the signature last written to each remote path, and who wrote it
//! - a tombstone for every path deleted from the remote, and who deleted it
//!
//! A user who never saw a path learns from the shared tombstone that a
//! surviving local copy is stale, instead of uploading it again.
//!
//! The index is fetched once per run. Each applied operation then publishes
//! its own path: the writer re-reads the latest index, changes that one
//! entry and stores it again, so entries published meanwhile by others
//! survive. Two collaborators publishing at the same instant can still race;
//! the entry that loses stays missing until its path is written or deleted
//! again.

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use synchrony_core::domain::{ContentHash, FileSignature, Side, SyncPath, Tombstone, Tombstones};
use synchrony_core::ports::IStorageBackend;

use crate::control::shared_index_path;

/// Last content written to one remote path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedRecord {
    pub content_hash: ContentHash,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub edited_by: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedTombstone {
    pub deleted_at: DateTime<Utc>,
    pub deleted_by: String,
}

/// Content of `index.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedIndex {
    pub format: u32,
    #[serde(default)]
    pub records: BTreeMap<SyncPath, SharedRecord>,
    #[serde(default)]
    pub tombstones: BTreeMap<SyncPath, SharedTombstone>,
}

impl Default for SharedIndex {
    fn default() -> Self {
        Self {
            format: Self::FORMAT,
            records: BTreeMap::new(),
            tombstones: BTreeMap::new(),
        }
    }
}

/// One path's remote change, published once its operation is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedUpdate {
    /// The remote now holds this content
    Written(FileSignature),
    /// The remote no longer holds this path
    Deleted { path: SyncPath, at: DateTime<Utc> },
}

impl SharedUpdate {
    pub fn path(&self) -> &SyncPath {
        match self {
            SharedUpdate::Written(sig) => &sig.path,
            SharedUpdate::Deleted { path, .. } => path,
        }
    }
}

impl SharedIndex {
    pub const FORMAT: u32 = 1;

    /// Remote tombstones in domain form
    pub fn tombstones(&self) -> Tombstones {
        self.tombstones
            .iter()
            .map(|(path, t)| {
                (
                    path.clone(),
                    Tombstone {
                        path: path.clone(),
                        side: Side::Remote,
                        deleted_at: t.deleted_at,
                    },
                )
            })
            .collect()
    }

    /// Who made the latest remote change of `path`
    pub fn last_editor(&self, path: &SyncPath) -> Option<&str> {
        self.records
            .get(path)
            .map(|r| r.edited_by.as_str())
            .or_else(|| self.tombstones.get(path).map(|t| t.deleted_by.as_str()))
    }

    /// Apply one update made by `user`; returns true if anything changed
    ///
    /// Recording content the index already holds keeps its author, and
    /// deleting a path that is already tombstoned keeps the first deletion.
    pub fn apply(&mut self, update: &SharedUpdate, user: &str, now: DateTime<Utc>) -> bool {
        match update {
            SharedUpdate::Written(sig) => {
                let cleared = self.tombstones.remove(&sig.path).is_some();
                if self
                    .records
                    .get(&sig.path)
                    .is_some_and(|r| r.content_hash == sig.content_hash)
                {
                    return cleared;
                }
                self.records.insert(
                    sig.path.clone(),
                    SharedRecord {
                        content_hash: sig.content_hash.clone(),
                        size: sig.size,
                        last_modified: sig.last_modified,
                        edited_by: user.to_string(),
                        edited_at: now,
                    },
                );
                true
            }
            SharedUpdate::Deleted { path, at } => {
                let had_record = self.records.remove(path).is_some();
                if had_record || !self.tombstones.contains_key(path) {
                    self.tombstones.insert(
                        path.clone(),
                        SharedTombstone {
                            deleted_at: *at,
                            deleted_by: user.to_string(),
                        },
                    );
                    return true;
                }
                false
            }
        }
    }
}

/// Combine this user's tombstones with the shared ones, keeping the later
/// deletion of each path
pub fn merge_tombstones(private: &Tombstones, shared: &Tombstones) -> Tombstones {
    let mut merged = private.clone();
    for (path, tombstone) in shared {
        match merged.get(path) {
            Some(existing) if existing.deleted_at >= tombstone.deleted_at => {}
            _ => {
                merged.insert(path.clone(), tombstone.clone());
            }
        }
    }
    merged
}

/// Read the shared index; a prefix without one has an empty history
#[instrument(skip_all, fields(location = %backend.location()))]
pub async fn fetch(backend: &dyn IStorageBackend) -> anyhow::Result<SharedIndex> {
    let path = shared_index_path()?;
    if !backend.exists(&path).await? {
        debug!("No shared index yet");
        return Ok(SharedIndex::default());
    }
    let body = backend.get(&path).await?;
    let index: SharedIndex = serde_json::from_slice(&body)
        .with_context(|| format!("Shared index {path} is corrupt"))?;
    anyhow::ensure!(
        index.format <= SharedIndex::FORMAT,
        "Shared index format {} is newer than this version understands ({})",
        index.format,
        SharedIndex::FORMAT
    );
    debug!(
        records = index.records.len(),
        tombstones = index.tombstones.len(),
        "Shared index loaded"
    );
    Ok(index)
}

async fn store(backend: &dyn IStorageBackend, index: &SharedIndex) -> anyhow::Result<()> {
    let body = serde_json::to_vec_pretty(index)?;
    backend.put(&shared_index_path()?, &body).await?;
    Ok(())
}

/// Publishes the updates of one run, one path at a time
pub struct SharedIndexWriter<'a> {
    backend: &'a dyn IStorageBackend,
    user_name: &'a str,
    lock: Mutex<()>,
}

impl<'a> SharedIndexWriter<'a> {
    pub fn new(backend: &'a dyn IStorageBackend, user_name: &'a str) -> Self {
        Self {
            backend,
            user_name,
            lock: Mutex::new(()),
        }
    }

    #[instrument(skip_all, fields(path = %update.path()))]
    pub async fn publish(&self, update: &SharedUpdate) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut index = fetch(self.backend).await?;
        if index.apply(update, self.user_name, Utc::now()) {
            store(self.backend, &index).await?;
            debug!("Shared index updated");
        }
        Ok(())
    }
}
