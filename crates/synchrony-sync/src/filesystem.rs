//! The synchronized tree on local disk
//!
//! [`LocalFileSystemAdapter`] is the [`ILocalFileSystem`] implementation.
//! The walking, staging and pruning helpers are shared with the directory
//! backend.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: content is written to a staging file under the
//!   control directory, then renamed over the target. The staging area is on
//!   the same filesystem as the tree and is never scanned.
//! - **Symlinks** are neither followed nor reported.
//! - **Unreadable entries** are reported as [`LocalEntry::Unreadable`] instead
//!   of failing the walk, so a permission problem on one directory never looks
//!   like every file below it was deleted.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use synchrony_core::domain::{SyncPath, CONTROL_DIR};
use synchrony_core::ports::{FileStat, ILocalFileSystem, LocalEntry};

/// Adapter that bridges the [`ILocalFileSystem`] port to a directory tree
#[derive(Debug, Clone)]
pub struct LocalFileSystemAdapter {
    root: PathBuf,
}

impl LocalFileSystemAdapter {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

// ============================================================================
// Tree helpers shared with the directory backend
// ============================================================================

/// Walk `root` recursively. The control directory at the top level is
/// skipped unless `include_control` is set.
///
/// # Errors
/// Fails only when `root` itself cannot be read.
pub(crate) async fn walk_tree(root: &Path, include_control: bool) -> anyhow::Result<Vec<LocalEntry>> {
    let mut entries = Vec::new();
    tokio::fs::read_dir(root)
        .await
        .with_context(|| format!("Failed to read directory: {}", root.display()))?;
    walk_directory(root, root, include_control, &mut entries).await;
    entries.sort_by(|a, b| entry_path(a).cmp(entry_path(b)));
    Ok(entries)
}

fn entry_path(entry: &LocalEntry) -> &SyncPath {
    match entry {
        LocalEntry::File(stat) => &stat.path,
        LocalEntry::Unreadable { path, .. } => path,
    }
}

fn walk_directory<'a>(
    root: &'a Path,
    dir: &'a Path,
    include_control: bool,
    out: &'a mut Vec<LocalEntry>,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        let mut reader = match tokio::fs::read_dir(dir).await {
            Ok(r) => r,
            Err(e) => {
                if let Some(path) = relative(root, dir) {
                    warn!(path = %path, error = %e, "Directory unreadable");
                    out.push(LocalEntry::Unreadable {
                        path,
                        error: e.to_string(),
                    });
                }
                return;
            }
        };

        loop {
            let entry = match reader.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    if let Some(path) = relative(root, dir) {
                        out.push(LocalEntry::Unreadable {
                            path,
                            error: e.to_string(),
                        });
                    }
                    break;
                }
            };

            let entry_path = entry.path();
            let Some(path) = relative(root, &entry_path) else {
                continue;
            };
            if !include_control && path.as_str() == CONTROL_DIR {
                continue;
            }

            let file_type = match entry.file_type().await {
                Ok(t) => t,
                Err(e) => {
                    out.push(LocalEntry::Unreadable {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if file_type.is_symlink() {
                debug!(path = %path, "Skipping symlink");
            } else if file_type.is_dir() {
                walk_directory(root, &entry_path, include_control, out).await;
            } else if file_type.is_file() {
                let metadata = entry.metadata().await;
                match metadata.as_ref().map(|m| (m.len(), modified_time(m))) {
                    Ok((size, Some(last_modified))) => out.push(LocalEntry::File(FileStat {
                        path,
                        size,
                        last_modified,
                    })),
                    Ok((_, None)) => out.push(LocalEntry::Unreadable {
                        path,
                        error: "modification time unavailable".to_string(),
                    }),
                    Err(e) => out.push(LocalEntry::Unreadable {
                        path,
                        error: e.to_string(),
                    }),
                }
            }
        }
    })
}

/// Relative [`SyncPath`] of `path` under `root`; `None` for the root itself
/// and for names that cannot be represented
fn relative(root: &Path, path: &Path) -> Option<SyncPath> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    match SyncPath::from_relative(rel) {
        Ok(p) => Some(p),
        Err(err) => {
            warn!(path = ?path, %err, "Skipping invalid path");
            None
        }
    }
}

fn modified_time(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

pub(crate) async fn stat_file(root: &Path, path: &SyncPath) -> anyhow::Result<Option<FileStat>> {
    let target = path.to_native(root);
    let metadata = match tokio::fs::symlink_metadata(&target).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Ok(None);
    }
    Ok(Some(FileStat {
        path: path.clone(),
        size: metadata.len(),
        last_modified: modified_time(&metadata)
            .with_context(|| format!("No modification time for {path}"))?,
    }))
}

/// Write `data` to `target` through a staging file in `staging_dir`
pub(crate) async fn write_atomic(staging_dir: &Path, target: &Path, data: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::create_dir_all(staging_dir).await?;

    let tmp_path = staging_dir.join(format!("{}.part", uuid::Uuid::new_v4().simple()));
    debug!(?tmp_path, "writing to staging file");

    let result = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, target).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result.with_context(|| format!("Failed to write {}", target.display()))
}

/// Remove `target` and then every ancestor directory, up to `root`, left
/// empty by the removal
pub(crate) async fn remove_and_prune(root: &Path, target: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_file(target).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(target = %target.display(), "already gone");
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to remove {}", target.display()))
        }
    }

    let mut dir = target.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        if tokio::fs::remove_dir(d).await.is_err() {
            break;
        }
        dir = d.parent();
    }
    Ok(())
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    fn root(&self) -> &Path {
        &self.root
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn list_files(&self) -> anyhow::Result<Vec<LocalEntry>> {
        let entries = walk_tree(&self.root, false).await?;
        debug!(entries = entries.len(), "local walk complete");
        Ok(entries)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn read_file(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>> {
        let data = tokio::fs::read(path.to_native(&self.root))
            .await
            .with_context(|| format!("Failed to read {path}"))?;
        debug!(bytes = data.len(), "file read complete");
        Ok(data)
    }

    #[instrument(skip(self, data), fields(path = %path, bytes = data.len()))]
    async fn write_file(&self, path: &SyncPath, data: &[u8]) -> anyhow::Result<FileStat> {
        let staging = self.root.join(CONTROL_DIR).join("tmp");
        write_atomic(&staging, &path.to_native(&self.root), data).await?;
        stat_file(&self.root, path)
            .await?
            .with_context(|| format!("{path} vanished after write"))
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn delete_file(&self, path: &SyncPath) -> anyhow::Result<()> {
        remove_and_prune(&self.root, &path.to_native(&self.root)).await?;
        debug!("delete complete");
        Ok(())
    }

    async fn stat(&self, path: &SyncPath) -> anyhow::Result<Option<FileStat>> {
        stat_file(&self.root, path).await
    }
}

// ============================================================================
// Unit tests
// ============================================================================
