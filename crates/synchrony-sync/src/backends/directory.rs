//! Directory storage backend
//!
//! Treats a plain directory (a mounted share, a second disk, a scratch
//! directory in tests) as the remote object store. Object paths map directly
//! onto files below the root. There is no version marker, so the hash cache
//! is keyed on size and modification time only.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, instrument};

use synchrony_core::domain::{SyncPath, CONTROL_DIR};
use synchrony_core::ports::{FileStat, IStorageBackend, LocalEntry, RemoteObject};

use crate::filesystem::{remove_and_prune, stat_file, walk_tree, write_atomic};

#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    root: PathBuf,
}

impl DirectoryBackend {
    /// Open a backend rooted at an existing directory
    pub async fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        let metadata = tokio::fs::metadata(&root)
            .await
            .with_context(|| format!("Remote directory {} is not reachable", root.display()))?;
        anyhow::ensure!(
            metadata.is_dir(),
            "Remote path {} is not a directory",
            root.display()
        );
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR).join("tmp")
    }
}

fn to_object(stat: FileStat) -> RemoteObject {
    RemoteObject {
        path: stat.path,
        size: stat.size,
        last_modified: stat.last_modified,
        version: None,
    }
}

#[async_trait::async_trait]
impl IStorageBackend for DirectoryBackend {
    fn platform(&self) -> &'static str {
        "directory"
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        for entry in walk_tree(&self.root, true).await? {
            match entry {
                LocalEntry::File(stat) => {
                    if stat.path.as_str().starts_with(prefix) {
                        objects.push(to_object(stat));
                    }
                }
                LocalEntry::Unreadable { path, error } => {
                    anyhow::bail!("Cannot list remote entry {path}: {error}");
                }
            }
        }
        debug!(objects = objects.len(), "listing complete");
        Ok(objects)
    }

    async fn get(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>> {
        tokio::fs::read(path.to_native(&self.root))
            .await
            .with_context(|| format!("Failed to read remote object {path}"))
    }

    #[instrument(skip(self, data), fields(path = %path, bytes = data.len()))]
    async fn put(&self, path: &SyncPath, data: &[u8]) -> anyhow::Result<RemoteObject> {
        write_atomic(&self.staging_dir(), &path.to_native(&self.root), data).await?;
        let stat = stat_file(&self.root, path)
            .await?
            .with_context(|| format!("Remote object {path} vanished after write"))?;
        Ok(to_object(stat))
    }

    #[instrument(skip(self), fields(path = %path, target = %target_prefix))]
    async fn move_to(&self, path: &SyncPath, target_prefix: &SyncPath) -> anyhow::Result<SyncPath> {
        let destination = target_prefix.join(path.as_str())?;
        let to = destination.to_native(&self.root);
        anyhow::ensure!(
            !tokio::fs::try_exists(&to).await?,
            "Refusing to move {path}: {destination} already exists"
        );
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let from = path.to_native(&self.root);
        tokio::fs::rename(&from, &to)
            .await
            .with_context(|| format!("Failed to move {path} to {destination}"))?;
        remove_and_prune(&self.root, &from).await?;
        Ok(destination)
    }

    async fn exists(&self, path: &SyncPath) -> anyhow::Result<bool> {
        Ok(stat_file(&self.root, path).await?.is_some())
    }

    async fn remove(&self, path: &SyncPath) -> anyhow::Result<()> {
        anyhow::ensure!(path.is_control(), "Refusing to erase {path}: not a control record");
        remove_and_prune(&self.root, &path.to_native(&self.root)).await
    }
}
