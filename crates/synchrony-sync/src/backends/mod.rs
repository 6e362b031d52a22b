//! Storage backend adapters
//!
//! [`Backend`] is the closed set of platforms Synchrony can talk to. It is
//! selected from `remote.platform` in the configuration and forwards every
//! port call to the concrete adapter.

pub mod directory;
pub mod s3;

pub use directory::DirectoryBackend;
pub use s3::S3Backend;

use tracing::info;

use synchrony_core::config::{Platform, RemoteConfig};
use synchrony_core::domain::SyncPath;
use synchrony_core::ports::{IStorageBackend, RemoteObject};

use crate::SyncError;

/// Names of every supported platform, in display order
pub fn list_supported_platforms() -> Vec<&'static str> {
    Platform::ALL.iter().map(|p| p.as_str()).collect()
}

#[derive(Debug, Clone)]
pub enum Backend {
    Directory(DirectoryBackend),
    S3(S3Backend),
}

impl Backend {
    /// Connect to the configured platform
    ///
    /// `credential_profile` comes from the control directory's credential
    /// record and overrides the profile named in the configuration.
    ///
    /// # Errors
    /// `InvalidConfig` when the selected platform lacks its settings,
    /// `BackendUnavailable` when the store cannot be reached.
    pub async fn connect(
        config: &RemoteConfig,
        credential_profile: Option<String>,
    ) -> Result<Self, SyncError> {
        let backend = match config.platform {
            Platform::Directory => {
                let root = config.directory.root.clone().ok_or_else(|| {
                    SyncError::InvalidConfig("remote.directory.root is required".into())
                })?;
                Backend::Directory(
                    DirectoryBackend::open(root)
                        .await
                        .map_err(SyncError::BackendUnavailable)?,
                )
            }
            Platform::S3 => {
                if config.s3.bucket.is_empty() {
                    return Err(SyncError::InvalidConfig(
                        "remote.s3.bucket is required".into(),
                    ));
                }
                Backend::S3(
                    S3Backend::connect(&config.s3, credential_profile)
                        .await
                        .map_err(SyncError::BackendUnavailable)?,
                )
            }
        };
        info!(
            platform = backend.platform(),
            location = %backend.location(),
            "Storage backend connected"
        );
        Ok(backend)
    }

    fn inner(&self) -> &dyn IStorageBackend {
        match self {
            Backend::Directory(b) => b,
            Backend::S3(b) => b,
        }
    }
}

#[async_trait::async_trait]
impl IStorageBackend for Backend {
    fn platform(&self) -> &'static str {
        self.inner().platform()
    }

    fn location(&self) -> String {
        self.inner().location()
    }

    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<RemoteObject>> {
        self.inner().list(prefix).await
    }

    async fn get(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>> {
        self.inner().get(path).await
    }

    async fn put(&self, path: &SyncPath, data: &[u8]) -> anyhow::Result<RemoteObject> {
        self.inner().put(path, data).await
    }

    async fn move_to(&self, path: &SyncPath, target_prefix: &SyncPath) -> anyhow::Result<SyncPath> {
        self.inner().move_to(path, target_prefix).await
    }

    async fn exists(&self, path: &SyncPath) -> anyhow::Result<bool> {
        self.inner().exists(path).await
    }

    async fn remove(&self, path: &SyncPath) -> anyhow::Result<()> {
        self.inner().remove(path).await
    }
}
