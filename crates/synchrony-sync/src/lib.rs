//! Synchrony Sync - three-way synchronization engine
//!
//! Provides:
//! - Content signatures for the local tree and the remote store
//! - Three-way change classification against recorded state
//! - Planning and execution of transfers and soft deletions
//! - Storage backends (local directory, S3-compatible object store)
//!
//! ## Modules
//!
//! - [`engine`] - Orchestrates scan, diff, plan and execute for one run
//! - [`scanner`] - Builds snapshots of both sides
//! - [`diff`] - Pure three-way change classification
//! - [`planner`] - Turns change records into an ordered operation list
//! - [`executor`] - Applies operations and records progress
//! - [`filesystem`] - Local filesystem adapter (atomic writes)
//! - [`backends`] - Storage backend adapters
//! - [`control`] - Layout of the `.synchrony` control directory
//! - [`shared`] - History shared by collaborators on the remote prefix
//! - [`ignore`] - Ignore-pattern filtering

pub mod backends;
pub mod control;
pub mod diff;
pub mod engine;
pub mod executor;
pub mod filesystem;
pub mod ignore;
pub mod planner;
pub mod result;
pub mod scanner;
pub mod shared;

pub use control::ControlDir;
pub use engine::{SyncEngine, SyncPlan};
pub use ignore::IgnoreFilter;
pub use result::{FailedOperation, SkipReason, SkippedPath, SyncResult};

use thiserror::Error;

use synchrony_core::domain::{OperationKind, SyncPath};

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// A single path could not be read while building a snapshot
    #[error("Cannot scan {path}: {message}")]
    Scan { path: SyncPath, message: String },

    /// A transfer or deletion failed for one path
    #[error("{operation} failed for {path}: {source}")]
    Transfer {
        operation: OperationKind,
        path: SyncPath,
        #[source]
        source: anyhow::Error,
    },

    /// The state store could not be read or written
    #[error("State store error: {0}")]
    State(#[source] anyhow::Error),

    /// The remote store could not be reached or listed
    #[error("Storage backend unavailable: {0}")]
    BackendUnavailable(#[source] anyhow::Error),

    /// The local tree root could not be read
    #[error("Local tree unavailable: {0}")]
    LocalUnavailable(#[source] anyhow::Error),

    /// The configuration does not describe a usable backend
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reset was requested without confirmation
    #[error("Reset requires explicit confirmation")]
    ResetNotConfirmed,

    /// An I/O error on the control directory
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
