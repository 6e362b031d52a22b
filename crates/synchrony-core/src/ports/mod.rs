//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. The sync engine depends only on these traits;
//! their implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IStorageBackend`] - Remote object storage (S3, plain directory)
//! - [`ILocalFileSystem`] - The local synchronized tree
//! - [`IStateStore`] - Durable recorded state, tombstones and hash cache
//! - [`IDecisionProvider`] - Conflict resolution and deletion approval

pub mod decision;
pub mod local_filesystem;
pub mod state_store;
pub mod storage_backend;

pub use decision::IDecisionProvider;
pub use local_filesystem::{FileStat, ILocalFileSystem, LocalEntry};
pub use state_store::{IStateStore, SideState};
pub use storage_backend::{IStorageBackend, RemoteObject};
