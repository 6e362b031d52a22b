//! RunLog - per-run durable log of skipped and failed paths
//!
//! Each run appends JSON lines to `<logs_dir>/<YYYY_mm_dd_HH_MM_SS>_<run>.log`.
//! The file is created lazily on the first entry, so a clean run leaves no
//! file behind. All methods are non-fatal: errors writing the log are
//! reported via `tracing::warn!` and never propagated, so logging failures
//! cannot break a sync.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use synchrony_core::domain::{RunId, SyncPath};

use crate::reason::ReasonCode;

/// Whether the path was attempted and failed, or never attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Failed,
    Skipped,
}

/// One line of a run log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: RunId,
    pub path: SyncPath,
    pub outcome: Outcome,
    /// Operation kind for failures, absent for skips
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Failure code for failures, absent for skips
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
    pub message: String,
}

pub struct RunLog {
    run_id: RunId,
    path: PathBuf,
    entries: usize,
}

impl RunLog {
    /// Prepare a log for `run_id` under `logs_dir`. Nothing is written yet.
    pub fn new(logs_dir: &Path, run_id: RunId, started_at: DateTime<Utc>) -> Self {
        let name = format!(
            "{}_{}.log",
            started_at.format("%Y_%m_%d_%H_%M_%S"),
            run_id.short()
        );
        Self {
            run_id,
            path: logs_dir.join(name),
            entries: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Record an operation that was attempted and failed
    pub async fn log_failure(
        &mut self,
        path: &SyncPath,
        operation: &str,
        reason: ReasonCode,
        message: &str,
    ) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            run_id: self.run_id,
            path: path.clone(),
            outcome: Outcome::Failed,
            operation: Some(operation.to_string()),
            reason: Some(reason),
            message: message.to_string(),
        };
        self.append(&entry).await;
    }

    /// Record a path that was deliberately left untouched
    pub async fn log_skip(&mut self, path: &SyncPath, message: &str) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            run_id: self.run_id,
            path: path.clone(),
            outcome: Outcome::Skipped,
            operation: None,
            reason: None,
            message: message.to_string(),
        };
        self.append(&entry).await;
    }

    /// Close the log, returning its path if anything was written
    pub fn finish(self) -> Option<PathBuf> {
        (self.entries > 0).then_some(self.path)
    }

    async fn append(&mut self, entry: &LogEntry) {
        if let Err(e) = self.try_append(entry).await {
            tracing::warn!(
                error = %e,
                log = %self.path.display(),
                path = %entry.path,
                "Failed to write run log entry"
            );
        }
    }

    async fn try_append(&mut self, entry: &LogEntry) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        self.entries += 1;
        Ok(())
    }
}

/// Read every entry of a run log
pub async fn read_log(path: &Path) -> anyhow::Result<Vec<LogEntry>> {
    let content = tokio::fs::read_to_string(path).await?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(anyhow::Error::from))
        .collect()
}
