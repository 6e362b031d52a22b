//! Reason codes for failed operations
//!
//! Every failure recorded in a run's log carries one of these codes so the
//! cause can be filtered without parsing free-form error text.

use std::fmt;
use std::io::ErrorKind;

use serde::{Deserialize, Serialize};

/// Structured reason codes for failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Connection, DNS or timeout failure talking to the backend
    Network,
    /// Credentials rejected or filesystem permissions insufficient
    PermissionDenied,
    /// The source vanished between scan and transfer
    NotFound,
    /// No space left on the local disk
    DiskFull,
    /// Content changed between scan and transfer
    HashMismatch,
    /// Any other error reported by the storage backend
    Backend,
    /// Persisting the outcome to the state store failed
    State,
    /// Unclassified local I/O or internal error
    Other,
}

impl ReasonCode {
    /// Classify an error by walking its cause chain
    ///
    /// I/O errors are classified by kind; backend errors by the same
    /// message markers the S3 SDK and HTTP layers emit.
    pub fn classify(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(io) = cause.downcast_ref::<std::io::Error>() {
                return match io.kind() {
                    ErrorKind::NotFound => ReasonCode::NotFound,
                    ErrorKind::PermissionDenied => ReasonCode::PermissionDenied,
                    ErrorKind::TimedOut
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted => ReasonCode::Network,
                    _ if io.raw_os_error() == Some(28) => ReasonCode::DiskFull,
                    _ => ReasonCode::Other,
                };
            }
        }

        let msg = format!("{err:#}").to_ascii_lowercase();
        if msg.contains("hash mismatch") {
            ReasonCode::HashMismatch
        } else if msg.contains("accessdenied")
            || msg.contains("forbidden")
            || msg.contains("credential")
            || msg.contains("403")
        {
            ReasonCode::PermissionDenied
        } else if msg.contains("nosuchkey") || msg.contains("not found") || msg.contains("404") {
            ReasonCode::NotFound
        } else if msg.contains("timeout")
            || msg.contains("timed out")
            || msg.contains("dispatch failure")
            || msg.contains("connection")
            || msg.contains("dns")
        {
            ReasonCode::Network
        } else if msg.contains("state store") {
            ReasonCode::State
        } else if msg.contains("service error") || msg.contains("s3") {
            ReasonCode::Backend
        } else {
            ReasonCode::Other
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReasonCode::Network => "network",
            ReasonCode::PermissionDenied => "permission_denied",
            ReasonCode::NotFound => "not_found",
            ReasonCode::DiskFull => "disk_full",
            ReasonCode::HashMismatch => "hash_mismatch",
            ReasonCode::Backend => "backend",
            ReasonCode::State => "state",
            ReasonCode::Other => "other",
        };
        write!(f, "{s}")
    }
}
