//! Signature scanner
//!
//! Builds the current [`Snapshot`] of each side.
//!
//! - **Local**: walks the tree; a file whose size and modification time
//!   match its recorded signature reuses the recorded hash, anything else is
//!   read and hashed.
//! - **Remote**: lists the prefix; an object whose size, modification time
//!   and version match a cached entry reuses the cached hash, anything else is
//!   fetched and hashed, and the hash is remembered for the next run.
//!
//! Per-path failures never abort a scan. They are collected in
//! [`ScanReport::unreadable`] so the diff can leave those paths alone.
//! Failing to list a side at all, or to use the state store, is fatal.

use std::collections::BTreeMap;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use synchrony_core::domain::{ContentHash, FileSignature, RecordedState, Snapshot, SyncPath};
use synchrony_core::ports::{
    FileStat, ILocalFileSystem, IStateStore, IStorageBackend, LocalEntry, RemoteObject,
};

use crate::ignore::IgnoreFilter;
use crate::SyncError;

#[derive(Debug, Default)]
pub struct ScanReport {
    pub snapshot: Snapshot,
    /// Paths that could not be read, with the `SyncError::Scan` describing why
    pub unreadable: BTreeMap<SyncPath, SyncError>,
    /// Files hashed from content this scan (as opposed to reused hashes)
    pub hashed: usize,
}

impl ScanReport {
    fn record(&mut self, outcome: Result<(FileSignature, bool), SyncError>) -> Result<(), SyncError> {
        match outcome {
            Ok((sig, hashed)) => {
                if hashed {
                    self.hashed += 1;
                }
                self.snapshot.insert(sig.path.clone(), sig);
                Ok(())
            }
            Err(SyncError::Scan { path, message }) => {
                warn!(path = %path, error = %message, "Skipping unreadable path");
                self.unreadable
                    .insert(path.clone(), SyncError::Scan { path, message });
                Ok(())
            }
            Err(fatal) => Err(fatal),
        }
    }
}

/// Scan the local tree
#[instrument(skip_all, fields(root = %fs.root().display()))]
pub async fn scan_local(
    fs: &dyn ILocalFileSystem,
    ignore: &IgnoreFilter,
    recorded: &RecordedState,
    concurrency: usize,
) -> Result<ScanReport, SyncError> {
    let entries = fs.list_files().await.map_err(SyncError::LocalUnavailable)?;

    let mut report = ScanReport::default();
    let mut files = Vec::new();
    for entry in entries {
        match entry {
            LocalEntry::File(stat) if !ignore.is_ignored(&stat.path) => files.push(stat),
            LocalEntry::Unreadable { path, error } if !ignore.is_ignored(&path) => {
                report.record(Err(SyncError::Scan {
                    path,
                    message: error,
                }))?;
            }
            _ => {}
        }
    }

    let outcomes: Vec<_> = stream::iter(files)
        .map(|stat| local_signature(fs, recorded, stat))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    for outcome in outcomes {
        report.record(outcome)?;
    }

    info!(
        files = report.snapshot.len(),
        hashed = report.hashed,
        unreadable = report.unreadable.len(),
        "Local scan complete"
    );
    Ok(report)
}

async fn local_signature(
    fs: &dyn ILocalFileSystem,
    recorded: &RecordedState,
    stat: FileStat,
) -> Result<(FileSignature, bool), SyncError> {
    if let Some(previous) = recorded.get(&stat.path) {
        if previous.size == stat.size && previous.last_modified == stat.last_modified {
            return Ok((previous.clone(), false));
        }
    }

    let data = fs.read_file(&stat.path).await.map_err(|e| SyncError::Scan {
        path: stat.path.clone(),
        message: format!("{e:#}"),
    })?;
    debug!(path = %stat.path, bytes = data.len(), "hashed local file");
    Ok((
        FileSignature::new(
            stat.path,
            ContentHash::compute(&data),
            stat.size,
            stat.last_modified,
        ),
        true,
    ))
}

/// Scan the remote prefix, excluding its control records
#[instrument(skip_all, fields(location = %backend.location()))]
pub async fn scan_remote(
    backend: &dyn IStorageBackend,
    state: &dyn IStateStore,
    ignore: &IgnoreFilter,
    concurrency: usize,
) -> Result<ScanReport, SyncError> {
    let objects: Vec<RemoteObject> = backend
        .list("")
        .await
        .map_err(SyncError::BackendUnavailable)?
        .into_iter()
        .filter(|o| !ignore.is_ignored(&o.path))
        .collect();

    let outcomes: Vec<_> = stream::iter(objects)
        .map(|object| remote_signature(backend, state, object))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = ScanReport::default();
    for outcome in outcomes {
        report.record(outcome)?;
    }

    info!(
        objects = report.snapshot.len(),
        fetched = report.hashed,
        unreadable = report.unreadable.len(),
        "Remote scan complete"
    );
    Ok(report)
}

async fn remote_signature(
    backend: &dyn IStorageBackend,
    state: &dyn IStateStore,
    object: RemoteObject,
) -> Result<(FileSignature, bool), SyncError> {
    let cached = state
        .cached_remote_hash(&object)
        .await
        .map_err(SyncError::State)?;
    let (hash, fetched) = match cached {
        Some(hash) => (hash, false),
        None => {
            let data = backend.get(&object.path).await.map_err(|e| SyncError::Scan {
                path: object.path.clone(),
                message: format!("{e:#}"),
            })?;
            let hash = ContentHash::compute(&data);
            if let Err(e) = state.remember_remote_hash(&object, &hash).await {
                warn!(path = %object.path, error = %e, "Remote hash not cached");
            }
            debug!(path = %object.path, bytes = data.len(), "fetched remote object to compare");
            (hash, true)
        }
    };
    Ok((
        FileSignature::new(object.path, hash, object.size, object.last_modified),
        fetched,
    ))
}
