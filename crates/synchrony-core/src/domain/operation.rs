//! Planned operations and conflict decisions

use std::fmt;

use serde::{Deserialize, Serialize};

use super::newtypes::SyncPath;
use super::signature::FileSignature;

/// What the executor does for one path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Copy local content to the remote side
    Upload,
    /// Copy remote content to the local side
    Download,
    /// Move the remote object into the recoverable holding area
    SoftDeleteRemote,
    /// Remove the local file
    DeleteLocal,
    /// No transfer; only bring the recorded state up to date
    RecordOnly,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Upload => "upload",
            OperationKind::Download => "download",
            OperationKind::SoftDeleteRemote => "soft_delete_remote",
            OperationKind::DeleteLocal => "delete_local",
            OperationKind::RecordOnly => "record_only",
        };
        f.write_str(s)
    }
}

/// A single planned action
///
/// `signature` is the content both sides will hold once the operation is
/// applied. It is `None` for deletions (including record-only deletions).
///
/// `local_expected` is the local file the plan was made against, for
/// operations that overwrite or remove it. `None` there means the path was
/// absent locally when scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub path: SyncPath,
    pub signature: Option<FileSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_expected: Option<FileSignature>,
}

impl Operation {
    pub fn upload(signature: FileSignature) -> Self {
        Self {
            kind: OperationKind::Upload,
            path: signature.path.clone(),
            signature: Some(signature),
            local_expected: None,
        }
    }

    pub fn download(signature: FileSignature) -> Self {
        Self {
            kind: OperationKind::Download,
            path: signature.path.clone(),
            signature: Some(signature),
            local_expected: None,
        }
    }

    pub fn soft_delete_remote(path: SyncPath) -> Self {
        Self {
            kind: OperationKind::SoftDeleteRemote,
            path,
            signature: None,
            local_expected: None,
        }
    }

    pub fn delete_local(path: SyncPath) -> Self {
        Self {
            kind: OperationKind::DeleteLocal,
            path,
            signature: None,
            local_expected: None,
        }
    }

    /// Record agreed content without transferring anything
    pub fn record(signature: FileSignature) -> Self {
        Self {
            kind: OperationKind::RecordOnly,
            path: signature.path.clone(),
            signature: Some(signature),
            local_expected: None,
        }
    }

    /// Record a deletion that already happened on both sides
    pub fn record_deletion(path: SyncPath) -> Self {
        Self {
            kind: OperationKind::RecordOnly,
            path,
            signature: None,
            local_expected: None,
        }
    }

    /// Attach the local file state this operation was planned against
    #[must_use]
    pub fn expecting_local(mut self, local: Option<FileSignature>) -> Self {
        self.local_expected = local;
        self
    }

    /// Returns true if the operation replaces or removes the local file
    #[must_use]
    pub fn touches_local(&self) -> bool {
        matches!(self.kind, OperationKind::Download | OperationKind::DeleteLocal)
    }

    /// Returns true if applying this operation removes a path from either
    /// side or from the recorded state. Deletions run after every
    /// creation and modification.
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        match self.kind {
            OperationKind::SoftDeleteRemote | OperationKind::DeleteLocal => true,
            OperationKind::RecordOnly => self.signature.is_none(),
            OperationKind::Upload | OperationKind::Download => false,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}

/// Outcome of the external conflict decision callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    /// Local content (or local deletion) overwrites remote
    LocalWins,
    /// Remote content (or remote deletion) overwrites local
    RemoteWins,
    /// Leave both sides untouched; the path reappears next run
    Skip,
}

impl fmt::Display for ConflictDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictDecision::LocalWins => "local_wins",
            ConflictDecision::RemoteWins => "remote_wins",
            ConflictDecision::Skip => "skip",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::newtypes::ContentHash;

    fn sig(path: &str) -> FileSignature {
        FileSignature::new(
            SyncPath::new(path).unwrap(),
            ContentHash::compute(path.as_bytes()),
            1,
            Utc::now(),
        )
    }

    #[test]
    fn test_is_deletion() {
        assert!(!Operation::upload(sig("a")).is_deletion());
        assert!(!Operation::download(sig("a")).is_deletion());
        assert!(!Operation::record(sig("a")).is_deletion());
        assert!(Operation::record_deletion(SyncPath::new("a").unwrap()).is_deletion());
        assert!(Operation::soft_delete_remote(SyncPath::new("a").unwrap()).is_deletion());
        assert!(Operation::delete_local(SyncPath::new("a").unwrap()).is_deletion());
    }

    #[test]
    fn test_expecting_local() {
        let local = sig("a");
        let op = Operation::download(sig("a")).expecting_local(Some(local.clone()));
        assert!(op.touches_local());
        assert_eq!(op.local_expected, Some(local));
        assert!(!Operation::upload(sig("a")).touches_local());
        assert!(Operation::delete_local(SyncPath::new("a").unwrap()).touches_local());
        assert_eq!(Operation::upload(sig("a")).local_expected, None);
    }

    #[test]
    fn test_operation_display() {
        let op = Operation::soft_delete_remote(SyncPath::new("dir/x.bin").unwrap());
        assert_eq!(op.to_string(), "soft_delete_remote dir/x.bin");
    }
}
