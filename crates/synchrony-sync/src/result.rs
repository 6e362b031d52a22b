//! Outcome of a synchronization run

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use synchrony_audit::ReasonCode;
use synchrony_core::domain::{Operation, RunId, SyncPath};

/// Why a path was left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The path could not be read while scanning
    Unreadable,
    /// A conflict with no decision
    ConflictUnresolved,
    /// A deletion that was not approved
    AwaitingConfirmation,
    /// The run was cancelled before the operation started
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Unreadable => "unreadable",
            SkipReason::ConflictUnresolved => "conflict unresolved",
            SkipReason::AwaitingConfirmation => "awaiting confirmation",
            SkipReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPath {
    pub path: SyncPath,
    pub reason: SkipReason,
    /// Extra detail, e.g. the scan error for unreadable paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SkippedPath {
    pub fn new(path: SyncPath, reason: SkipReason) -> Self {
        Self {
            path,
            reason,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Text written to the run log
    pub fn message(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}: {detail}", self.reason),
            None => self.reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedOperation {
    pub operation: Operation,
    pub error: String,
    pub reason: ReasonCode,
}

/// Summary of a completed synchronization run
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub run_id: RunId,
    /// Operations that completed and were recorded
    pub applied: Vec<Operation>,
    pub failed: Vec<FailedOperation>,
    pub skipped: Vec<SkippedPath>,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
    /// Run log, present when anything was skipped or failed
    pub log_path: Option<PathBuf>,
}

impl SyncResult {
    /// True when every planned operation was applied and nothing was skipped
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}
