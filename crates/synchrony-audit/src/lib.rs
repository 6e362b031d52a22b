//! Synchrony Audit - Durable record of skipped and failed paths
//!
//! Provides:
//! - `RunLog`: one JSON-lines file per synchronization run
//! - `ReasonCode`: structured codes for why an operation failed

pub mod logger;
pub mod reason;

pub use logger::{LogEntry, Outcome, RunLog};
pub use reason::ReasonCode;
