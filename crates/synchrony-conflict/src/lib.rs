//! Synchrony Conflict - Conflict resolution policy
//!
//! Provides:
//! - [`PolicyEngine`]: glob rules mapping paths to a resolution strategy
//! - [`PolicyDecider`]: an `IDecisionProvider` that answers from policy and
//!   pre-granted deletion approvals, deferring to an interactive provider
//!   for anything marked `manual`

pub mod decider;
pub mod error;
pub mod policy;

pub use decider::PolicyDecider;
pub use error::ConflictError;
pub use policy::{PolicyEngine, Strategy};
