//! File signatures and per-side state
//!
//! A [`FileSignature`] identifies one file's content at a point in time.
//! Snapshots (current scan results) and recorded state (last agreed values)
//! are both path-keyed maps of signatures; ordered maps keep every stage
//! iterating in the same path order.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ContentHash, SyncPath};

/// One side of a synchronized pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The local directory tree
    Local,
    /// The remote object-storage prefix
    Remote,
}

impl Side {
    /// Both sides, local first
    pub const BOTH: [Side; 2] = [Side::Local, Side::Remote];

    /// The opposite side
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Side::Local => Side::Remote,
            Side::Remote => Side::Local,
        }
    }

    /// Stable lowercase name used in storage and logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Local => "local",
            Side::Remote => "remote",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content hash plus metadata identifying a file's state
///
/// Immutable for a given content: two signatures with the same hash describe
/// the same bytes regardless of size or timestamp differences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSignature {
    pub path: SyncPath,
    pub content_hash: ContentHash,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl FileSignature {
    pub fn new(
        path: SyncPath,
        content_hash: ContentHash,
        size: u64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            path,
            content_hash,
            size,
            last_modified,
        }
    }

    /// Returns true if both signatures describe identical content
    #[must_use]
    pub fn same_content(&self, other: &FileSignature) -> bool {
        self.content_hash == other.content_hash
    }
}

/// Current signatures of one side, recomputed every run
pub type Snapshot = BTreeMap<SyncPath, FileSignature>;

/// Last agreed signatures of one side, owned by the state store
pub type RecordedState = BTreeMap<SyncPath, FileSignature>;

/// Durable marker recording that a path was deleted on one side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub path: SyncPath,
    pub side: Side,
    pub deleted_at: DateTime<Utc>,
}

impl Tombstone {
    /// Returns true if the deletion is at least as recent as `modified`,
    /// meaning a surviving copy modified at that time is stale.
    #[must_use]
    pub fn supersedes(&self, modified: DateTime<Utc>) -> bool {
        self.deleted_at >= modified
    }
}

/// Tombstones of one side keyed by path
pub type Tombstones = BTreeMap<SyncPath, Tombstone>;
