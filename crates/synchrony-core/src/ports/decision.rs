//! Decision port (driving side callback)
//!
//! The engine performs no user-facing I/O. Whenever a conflict needs a
//! winner or a batch of deletions needs approval, it calls this interface
//! synchronously. Implementations may prompt a user, consult configured
//! policy, or answer from a fixed table in tests.

use crate::domain::{ChangeRecord, ConflictDecision, Side};

pub trait IDecisionProvider: Send + Sync {
    /// Pick a winner for a conflicting path
    fn resolve_conflict(&self, change: &ChangeRecord) -> ConflictDecision;

    /// Approve deleting the surviving copies of `changes` on `side` (soft
    /// delete for remote, removal for local). Called at most once per side
    /// per run.
    fn approve_deletions(&self, side: Side, changes: &[ChangeRecord]) -> bool;
}
