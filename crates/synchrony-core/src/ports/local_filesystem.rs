//! Local filesystem port (driven/secondary port)
//!
//! Interface to the local synchronized tree. All paths are [`SyncPath`]s
//! relative to the adapter's root.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - Listing never fails on a single unreadable entry: it is reported as
//!   [`LocalEntry::Unreadable`] so the scanner can skip it instead of
//!   treating its absence as a deletion.
//! - Writes are atomic (temp file + rename).

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::newtypes::SyncPath;

/// Size and modification time of a regular file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub path: SyncPath,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// One result of walking the local tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEntry {
    /// A readable regular file
    File(FileStat),
    /// A file or directory that could not be inspected
    Unreadable { path: SyncPath, error: String },
}

/// Local filesystem operations
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Root directory of the synchronized tree
    fn root(&self) -> &Path;

    /// Walk the tree (excluding the control directory and symlinks)
    ///
    /// Fails only when the root itself cannot be read.
    async fn list_files(&self) -> anyhow::Result<Vec<LocalEntry>>;

    /// Read a file's full content
    async fn read_file(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>>;

    /// Atomically write a file, creating parent directories as needed
    async fn write_file(&self, path: &SyncPath, data: &[u8]) -> anyhow::Result<FileStat>;

    /// Remove a file and any parent directories left empty by it
    async fn delete_file(&self, path: &SyncPath) -> anyhow::Result<()>;

    /// Stat a file; `None` if it does not exist
    async fn stat(&self, path: &SyncPath) -> anyhow::Result<Option<FileStat>>;
}
