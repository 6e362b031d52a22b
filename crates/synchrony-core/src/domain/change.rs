//! Classified change records
//!
//! The diff engine emits exactly one [`ChangeRecord`] per path found in any
//! snapshot, recorded state or tombstone set.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::newtypes::SyncPath;
use super::signature::{FileSignature, Side};

/// Classification of a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Unchanged,
    CreatedLocal,
    CreatedRemote,
    ModifiedLocal,
    ModifiedRemote,
    DeletedLocal,
    DeletedRemote,
    Conflict,
}

impl ChangeKind {
    /// The side on which the change originated, if it is one-sided
    #[must_use]
    pub fn origin(self) -> Option<Side> {
        match self {
            ChangeKind::CreatedLocal | ChangeKind::ModifiedLocal | ChangeKind::DeletedLocal => {
                Some(Side::Local)
            }
            ChangeKind::CreatedRemote | ChangeKind::ModifiedRemote | ChangeKind::DeletedRemote => {
                Some(Side::Remote)
            }
            ChangeKind::Unchanged | ChangeKind::Conflict => None,
        }
    }

    #[must_use]
    pub fn is_deletion(self) -> bool {
        matches!(self, ChangeKind::DeletedLocal | ChangeKind::DeletedRemote)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Unchanged => "unchanged",
            ChangeKind::CreatedLocal => "created_local",
            ChangeKind::CreatedRemote => "created_remote",
            ChangeKind::ModifiedLocal => "modified_local",
            ChangeKind::ModifiedRemote => "modified_remote",
            ChangeKind::DeletedLocal => "deleted_local",
            ChangeKind::DeletedRemote => "deleted_remote",
            ChangeKind::Conflict => "conflict",
        };
        f.write_str(s)
    }
}

/// A path together with its classification and every signature that
/// contributed to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: SyncPath,
    pub kind: ChangeKind,
    pub local: Option<FileSignature>,
    pub remote: Option<FileSignature>,
    pub recorded_local: Option<FileSignature>,
    pub recorded_remote: Option<FileSignature>,
    /// Collaborator behind the latest remote change of this path: the last
    /// writer, or whoever soft-deleted it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_editor: Option<String>,
}

impl ChangeRecord {
    /// Current signature on `side`
    #[must_use]
    pub fn current(&self, side: Side) -> Option<&FileSignature> {
        match side {
            Side::Local => self.local.as_ref(),
            Side::Remote => self.remote.as_ref(),
        }
    }

    /// Recorded signature on `side`
    #[must_use]
    pub fn recorded(&self, side: Side) -> Option<&FileSignature> {
        match side {
            Side::Local => self.recorded_local.as_ref(),
            Side::Remote => self.recorded_remote.as_ref(),
        }
    }

    /// Returns true if both current signatures exist and carry the same hash
    #[must_use]
    pub fn sides_agree(&self) -> bool {
        match (&self.local, &self.remote) {
            (Some(l), Some(r)) => l.same_content(r),
            _ => false,
        }
    }
}
