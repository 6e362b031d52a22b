//! Three-way change classification
//!
//! Compares the current snapshot of each side against the state recorded at
//! the end of the last successful synchronization. The function is pure: the
//! same inputs always yield the same records, in path order.
//!
//! ## Baselines
//!
//! A side's baseline is its own recorded signature, or the other side's
//! recorded signature when its own is missing. Records are written in pairs,
//! so the fallback only matters for a pair left half-written; it keeps such a
//! path from looking like a brand new file on one side.
//!
//! ## Side status
//!
//! | current | baseline | status   |
//! |---------|----------|----------|
//! | hash == | present  | Same     |
//! | hash != | present  | Modified |
//! | present | absent   | Created  |
//! | absent  | present  | Deleted  |
//! | absent  | absent   | Absent   |
//!
//! Only content hashes are compared; a touched file with unchanged content
//! is `Same`.

use std::collections::{BTreeMap, BTreeSet};

use synchrony_core::domain::{
    ChangeKind, ChangeRecord, FileSignature, RecordedState, Snapshot, SyncPath, Tombstones,
};

/// Everything the classifier looks at
#[derive(Debug, Clone, Copy)]
pub struct DiffInput<'a> {
    pub local: &'a Snapshot,
    pub remote: &'a Snapshot,
    pub recorded_local: &'a RecordedState,
    pub recorded_remote: &'a RecordedState,
    pub tombstones_local: &'a Tombstones,
    pub tombstones_remote: &'a Tombstones,
    /// Paths whose scan failed on either side. They and everything below
    /// them are left out of the result.
    pub unreadable: &'a BTreeSet<SyncPath>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Same,
    Modified,
    Created,
    Deleted,
    Absent,
}

fn status(current: Option<&FileSignature>, baseline: Option<&FileSignature>) -> Status {
    match (current, baseline) {
        (Some(c), Some(b)) if c.same_content(b) => Status::Same,
        (Some(_), Some(_)) => Status::Modified,
        (Some(_), None) => Status::Created,
        (None, Some(_)) => Status::Deleted,
        (None, None) => Status::Absent,
    }
}

fn same_content(a: Option<&FileSignature>, b: Option<&FileSignature>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a.same_content(b))
}

fn is_unreadable(path: &SyncPath, unreadable: &BTreeSet<SyncPath>) -> bool {
    unreadable.iter().any(|u| path.is_within(u))
}

/// Classify every path known to either side, its history or its tombstones
pub fn diff(input: &DiffInput<'_>) -> Vec<ChangeRecord> {
    let paths: BTreeSet<&SyncPath> = input
        .local
        .keys()
        .chain(input.remote.keys())
        .chain(input.recorded_local.keys())
        .chain(input.recorded_remote.keys())
        .chain(input.tombstones_local.keys())
        .chain(input.tombstones_remote.keys())
        .collect();

    paths
        .into_iter()
        .filter(|path| !is_unreadable(path, input.unreadable))
        .map(|path| classify_path(path, input))
        .collect()
}

fn classify_path(path: &SyncPath, input: &DiffInput<'_>) -> ChangeRecord {
    let local = input.local.get(path);
    let remote = input.remote.get(path);
    let recorded_local = input.recorded_local.get(path);
    let recorded_remote = input.recorded_remote.get(path);

    let local_status = status(local, recorded_local.or(recorded_remote));
    let remote_status = status(remote, recorded_remote.or(recorded_local));

    let kind = match (local_status, remote_status) {
        (Status::Absent, Status::Absent) => ChangeKind::Unchanged,
        // Both match their baselines yet disagree with each other: the
        // recorded pair itself is inconsistent, so never pick a side silently.
        (Status::Same, Status::Same) if !same_content(local, remote) => ChangeKind::Conflict,
        (Status::Same, Status::Same) => ChangeKind::Unchanged,

        (Status::Modified, Status::Same) => ChangeKind::ModifiedLocal,
        (Status::Same, Status::Modified) => ChangeKind::ModifiedRemote,
        (Status::Modified, Status::Modified) if same_content(local, remote) => {
            ChangeKind::ModifiedLocal
        }

        (Status::Deleted, Status::Same) => ChangeKind::DeletedLocal,
        (Status::Same, Status::Deleted) => ChangeKind::DeletedRemote,
        (Status::Deleted, Status::Deleted) => ChangeKind::DeletedLocal,

        (Status::Created, Status::Absent) => {
            match (local, input.tombstones_remote.get(path)) {
                (Some(l), Some(t)) if t.supersedes(l.last_modified) => ChangeKind::DeletedRemote,
                _ => ChangeKind::CreatedLocal,
            }
        }
        (Status::Absent, Status::Created) => {
            match (remote, input.tombstones_local.get(path)) {
                (Some(r), Some(t)) if t.supersedes(r.last_modified) => ChangeKind::DeletedLocal,
                _ => ChangeKind::CreatedRemote,
            }
        }
        (Status::Created, Status::Created) if same_content(local, remote) => {
            ChangeKind::CreatedLocal
        }

        // Divergent edits, edit against delete, divergent creations
        _ => ChangeKind::Conflict,
    };

    ChangeRecord {
        path: path.clone(),
        kind,
        local: local.cloned(),
        remote: remote.cloned(),
        recorded_local: recorded_local.cloned(),
        recorded_remote: recorded_remote.cloned(),
        remote_editor: None,
    }
}

/// Count records per kind, skipping `Unchanged`
pub fn summarize(changes: &[ChangeRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for change in changes.iter().filter(|c| c.kind != ChangeKind::Unchanged) {
        *counts.entry(change.kind.to_string()).or_insert(0) += 1;
    }
    counts
}
