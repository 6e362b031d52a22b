//! Sync planner
//!
//! Turns classified changes into the ordered list of operations to apply.
//! Planning is pure: conflict decisions and deletion approvals are gathered
//! beforehand and passed in.
//!
//! Deleting operations (remote soft deletes, local deletes and recorded
//! deletions) are always ordered after every non-deleting operation, so a
//! rename shows up as "upload the new path" before "retire the old path".

use std::collections::BTreeMap;

use synchrony_core::domain::{
    ChangeKind, ChangeRecord, ConflictDecision, Operation, Side, SyncPath,
};

use crate::result::{SkipReason, SkippedPath};

/// Batch-wide approval for each destructive direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionApprovals {
    /// Local files may be removed
    pub local: bool,
    /// Remote objects may be moved to the holding area
    pub remote: bool,
}

impl DeletionApprovals {
    pub fn all() -> Self {
        Self {
            local: true,
            remote: true,
        }
    }

    pub fn get(&self, side: Side) -> bool {
        match side {
            Side::Local => self.local,
            Side::Remote => self.remote,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub operations: Vec<Operation>,
    pub skipped: Vec<SkippedPath>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.skipped.is_empty()
    }
}

/// Changes whose surviving copy would be deleted on each side if approved,
/// as `(local deletions, remote deletions)`
pub fn pending_deletions(changes: &[ChangeRecord]) -> (Vec<ChangeRecord>, Vec<ChangeRecord>) {
    let mut local = Vec::new();
    let mut remote = Vec::new();
    for change in changes {
        match change.kind {
            ChangeKind::DeletedLocal if change.remote.is_some() => remote.push(change.clone()),
            ChangeKind::DeletedRemote if change.local.is_some() => local.push(change.clone()),
            _ => {}
        }
    }
    (local, remote)
}

/// Build the ordered plan
///
/// A conflict without an entry in `decisions` is treated as `Skip`.
pub fn plan(
    changes: &[ChangeRecord],
    decisions: &BTreeMap<SyncPath, ConflictDecision>,
    approvals: DeletionApprovals,
) -> Plan {
    let mut transfers = Vec::new();
    let mut deletions = Vec::new();
    let mut skipped = Vec::new();

    for change in changes {
        let planned = match change.kind {
            ChangeKind::Unchanged => None,
            ChangeKind::CreatedLocal | ChangeKind::ModifiedLocal => propagate(change, Side::Local),
            ChangeKind::CreatedRemote | ChangeKind::ModifiedRemote => {
                propagate(change, Side::Remote)
            }
            ChangeKind::DeletedLocal => match retire(change, Side::Remote, approvals.remote) {
                Ok(op) => Some(op),
                Err(skip) => {
                    skipped.push(skip);
                    None
                }
            },
            ChangeKind::DeletedRemote => match retire(change, Side::Local, approvals.local) {
                Ok(op) => Some(op),
                Err(skip) => {
                    skipped.push(skip);
                    None
                }
            },
            ChangeKind::Conflict => {
                let decision = decisions
                    .get(&change.path)
                    .copied()
                    .unwrap_or(ConflictDecision::Skip);
                match decision {
                    ConflictDecision::LocalWins => Some(resolve(change, Side::Local)),
                    ConflictDecision::RemoteWins => Some(resolve(change, Side::Remote)),
                    ConflictDecision::Skip => {
                        skipped.push(SkippedPath::new(
                            change.path.clone(),
                            SkipReason::ConflictUnresolved,
                        ));
                        None
                    }
                }
            }
        };

        if let Some(op) = planned {
            if op.is_deletion() {
                deletions.push(op);
            } else {
                transfers.push(op);
            }
        }
    }

    transfers.extend(deletions);
    Plan {
        operations: transfers,
        skipped,
    }
}

/// Copy the content of `from` to the other side, or only record it when the
/// other side already holds it
fn propagate(change: &ChangeRecord, from: Side) -> Option<Operation> {
    let source = change.current(from)?.clone();
    if change.sides_agree() {
        return Some(Operation::record(source));
    }
    Some(match from {
        Side::Local => Operation::upload(source),
        Side::Remote => Operation::download(source).expecting_local(change.local.clone()),
    })
}

/// Remove the surviving copy on `target` after the other side deleted it
fn retire(change: &ChangeRecord, target: Side, approved: bool) -> Result<Operation, SkippedPath> {
    if change.current(target).is_none() {
        return Ok(Operation::record_deletion(change.path.clone()));
    }
    if !approved {
        return Err(SkippedPath::new(
            change.path.clone(),
            SkipReason::AwaitingConfirmation,
        ));
    }
    Ok(delete_on(target, change))
}

/// Make `winner`'s state authoritative for a conflicting path
fn resolve(change: &ChangeRecord, winner: Side) -> Operation {
    let loser = winner.other();
    match change.current(winner) {
        Some(sig) if change.sides_agree() => Operation::record(sig.clone()),
        Some(sig) => match winner {
            Side::Local => Operation::upload(sig.clone()),
            Side::Remote => Operation::download(sig.clone()).expecting_local(change.local.clone()),
        },
        None if change.current(loser).is_some() => delete_on(loser, change),
        None => Operation::record_deletion(change.path.clone()),
    }
}

fn delete_on(side: Side, change: &ChangeRecord) -> Operation {
    match side {
        Side::Local => {
            Operation::delete_local(change.path.clone()).expecting_local(change.local.clone())
        }
        Side::Remote => Operation::soft_delete_remote(change.path.clone()),
    }
}
