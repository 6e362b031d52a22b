//! Error types for the conflict policy

use thiserror::Error;

/// Errors raised while compiling conflict rules
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// Invalid glob pattern in a conflict rule
    #[error("invalid glob pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Unknown strategy name
    #[error("invalid strategy '{0}'; valid: manual, keep_local, keep_remote, skip")]
    InvalidStrategy(String),
}
