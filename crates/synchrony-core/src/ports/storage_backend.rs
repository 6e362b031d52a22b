//! Storage backend port (driven/secondary port)
//!
//! Abstracts the remote object store. Paths are relative to the backend's
//! configured root (bucket prefix or directory); the backend never sees the
//! local tree.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because transport errors are backend-specific.
//! - Listings carry no content hash. Comparing content requires an explicit
//!   fetch through [`IStorageBackend::get`].
//! - [`IStorageBackend::move_to`] is the only way data leaves its path; data
//!   is never erased except for control records via
//!   [`IStorageBackend::remove`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::newtypes::SyncPath;

/// Metadata of a single object as reported by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    pub path: SyncPath,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    /// Opaque version marker (ETag or equivalent), if the backend has one
    pub version: Option<String>,
}

/// Remote object storage operations
#[async_trait::async_trait]
pub trait IStorageBackend: Send + Sync {
    /// Platform name, e.g. `"s3"`
    fn platform(&self) -> &'static str;

    /// Human-readable location, e.g. `s3://bucket/prefix`
    fn location(&self) -> String;

    /// List every object whose path starts with `prefix` (empty for all)
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<RemoteObject>>;

    /// Fetch an object's bytes
    async fn get(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>>;

    /// Store bytes under `path`, replacing any existing object
    async fn put(&self, path: &SyncPath, data: &[u8]) -> anyhow::Result<RemoteObject>;

    /// Move an object to `target_prefix/path`, returning the new path
    async fn move_to(&self, path: &SyncPath, target_prefix: &SyncPath)
        -> anyhow::Result<SyncPath>;

    /// Check whether an object exists
    async fn exists(&self, path: &SyncPath) -> anyhow::Result<bool>;

    /// Erase a control record. Never used for synchronized content.
    async fn remove(&self, path: &SyncPath) -> anyhow::Result<()>;
}
