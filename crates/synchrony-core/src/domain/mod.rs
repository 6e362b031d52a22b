//! Domain entities
//!
//! - Newtypes for validated paths, hashes and run identifiers
//! - File signatures, snapshots, recorded state and tombstones
//! - Change classification records
//! - Planned operations and conflict decisions
//! - Domain-specific error types

pub mod change;
pub mod errors;
pub mod newtypes;
pub mod operation;
pub mod signature;

pub use change::{ChangeKind, ChangeRecord};
pub use errors::DomainError;
pub use newtypes::*;
pub use operation::{ConflictDecision, Operation, OperationKind};
pub use signature::{FileSignature, RecordedState, Side, Snapshot, Tombstone, Tombstones};
