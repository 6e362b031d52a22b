//! S3 storage backend
//!
//! Objects live under `s3://<bucket>/<prefix>/`. The client is built from the
//! default AWS provider chain, optionally narrowed to a named profile, a
//! region and a custom endpoint (MinIO, LocalStack). A custom endpoint
//! switches to path-style addressing.
//!
//! Moves are copy-then-delete: the object is fetched and written to its new
//! key before the original is deleted, so an interrupted move leaves a
//! duplicate rather than a loss.

use anyhow::{anyhow, Context};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use synchrony_core::config::S3RemoteConfig;
use synchrony_core::domain::SyncPath;
use synchrony_core::ports::{IStorageBackend, RemoteObject};

#[derive(Debug, Clone)]
pub struct S3Backend {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Backend {
    /// Build a client for the configured bucket. `profile` overrides the
    /// profile named in `config`.
    pub async fn connect(config: &S3RemoteConfig, profile: Option<String>) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.bucket.is_empty(), "remote.s3.bucket is required");

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_sdk_s3::config::Region::new(region));
        }
        if let Some(endpoint) = config.endpoint_url.clone() {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(profile) = profile.or_else(|| config.profile.clone()) {
            debug!(%profile, "Using named credential profile");
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.endpoint_url.is_some())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            prefix: config.prefix.trim_matches('/').to_string(),
        })
    }

    fn key_for(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }

    /// Inverse of [`Self::key_for`]; `None` for keys outside the prefix
    fn path_for<'a>(&self, key: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            Some(key)
        } else {
            key.strip_prefix(&self.prefix)?.strip_prefix('/')
        }
    }

    fn remote_error<E>(&self, action: &str, key: &str, err: E) -> anyhow::Error
    where
        E: std::error::Error,
    {
        anyhow!(
            "S3 {action} s3://{}/{key} failed: {}",
            self.bucket,
            DisplayErrorContext(&err)
        )
    }

    async fn head(&self, path: &SyncPath) -> anyhow::Result<RemoteObject> {
        let key = self.key_for(path.as_str());
        let out = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| self.remote_error("head", &key, e))?;
        Ok(RemoteObject {
            path: path.clone(),
            size: out.content_length().and_then(|n| u64::try_from(n).ok()).unwrap_or(0),
            last_modified: out
                .last_modified()
                .and_then(to_chrono)
                .unwrap_or_else(Utc::now),
            version: out.e_tag().map(str::to_string),
        })
    }
}

fn to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[async_trait::async_trait]
impl IStorageBackend for S3Backend {
    fn platform(&self) -> &'static str {
        "s3"
    }

    fn location(&self) -> String {
        if self.prefix.is_empty() {
            format!("s3://{}", self.bucket)
        } else {
            format!("s3://{}/{}", self.bucket, self.prefix)
        }
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<RemoteObject>> {
        let key_prefix = self.key_for(prefix);
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&key_prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| self.remote_error("list", &key_prefix, e))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                if key.ends_with('/') {
                    continue;
                }
                let Some(relative) = self.path_for(key) else { continue };
                let path = match SyncPath::new(relative) {
                    Ok(p) => p,
                    Err(err) => {
                        warn!(key, %err, "Skipping object with unrepresentable key");
                        continue;
                    }
                };
                objects.push(RemoteObject {
                    path,
                    size: object.size().and_then(|n| u64::try_from(n).ok()).unwrap_or(0),
                    last_modified: object
                        .last_modified()
                        .and_then(to_chrono)
                        .with_context(|| format!("No modification time for s3 key {key}"))?,
                    version: object.e_tag().map(str::to_string),
                });
            }
        }

        objects.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(objects = objects.len(), "listing complete");
        Ok(objects)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn get(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>> {
        let key = self.key_for(path.as_str());
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| self.remote_error("get", &key, e))?;
        let bytes = out
            .body
            .collect()
            .await
            .map_err(|e| self.remote_error("read body of", &key, e))?;
        Ok(bytes.into_bytes().to_vec())
    }

    #[instrument(skip(self, data), fields(path = %path, bytes = data.len()))]
    async fn put(&self, path: &SyncPath, data: &[u8]) -> anyhow::Result<RemoteObject> {
        let key = self.key_for(path.as_str());
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| self.remote_error("put", &key, e))?;
        // The listing timestamp is only known after the write lands
        self.head(path).await
    }

    #[instrument(skip(self), fields(path = %path, target = %target_prefix))]
    async fn move_to(&self, path: &SyncPath, target_prefix: &SyncPath) -> anyhow::Result<SyncPath> {
        let destination = target_prefix.join(path.as_str())?;
        let data = self.get(path).await?;
        self.put(&destination, &data).await?;

        let key = self.key_for(path.as_str());
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| self.remote_error("delete", &key, e))?;
        Ok(destination)
    }

    async fn exists(&self, path: &SyncPath) -> anyhow::Result<bool> {
        let key = self.key_for(path.as_str());
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(self.remote_error("head", &key, e)),
        }
    }

    async fn remove(&self, path: &SyncPath) -> anyhow::Result<()> {
        anyhow::ensure!(path.is_control(), "Refusing to erase {path}: not a control record");
        let key = self.key_for(path.as_str());
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| self.remote_error("delete", &key, e))?;
        Ok(())
    }
}
