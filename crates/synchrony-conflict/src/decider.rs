//! Policy-backed decision provider
//!
//! Answers conflict and deletion questions from configuration. Anything the
//! configuration leaves open (a `manual` strategy, an unapproved deletion
//! batch) is forwarded to an optional interactive provider; with none
//! attached, conflicts are skipped and deletions are refused.

use std::sync::Arc;

use tracing::{debug, info};

use synchrony_core::config::Config;
use synchrony_core::domain::{ChangeRecord, ConflictDecision, Side};
use synchrony_core::ports::IDecisionProvider;

use crate::policy::PolicyEngine;

pub struct PolicyDecider {
    engine: PolicyEngine,
    approve_local: bool,
    approve_remote: bool,
    interactive: Option<Arc<dyn IDecisionProvider>>,
}

impl PolicyDecider {
    pub fn new(engine: PolicyEngine, approve_local: bool, approve_remote: bool) -> Self {
        Self {
            engine,
            approve_local,
            approve_remote,
            interactive: None,
        }
    }

    /// Build from the `conflicts` and `deletions` configuration sections
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            PolicyEngine::new(&config.conflicts.default_strategy, &config.conflicts.rules),
            config.deletions.auto_approve_local,
            config.deletions.auto_approve_remote,
        )
    }

    /// Pre-approve deletions on `side` for this run
    pub fn approve(mut self, side: Side) -> Self {
        match side {
            Side::Local => self.approve_local = true,
            Side::Remote => self.approve_remote = true,
        }
        self
    }

    /// Attach a provider for the questions policy cannot answer
    pub fn with_interactive(mut self, provider: Arc<dyn IDecisionProvider>) -> Self {
        self.interactive = Some(provider);
        self
    }
}

impl IDecisionProvider for PolicyDecider {
    fn resolve_conflict(&self, change: &ChangeRecord) -> ConflictDecision {
        let strategy = self.engine.evaluate(change.path.as_str());
        if let Some(decision) = strategy.decision() {
            debug!(path = %change.path, %strategy, %decision, "Conflict resolved by policy");
            return decision;
        }
        match &self.interactive {
            Some(provider) => provider.resolve_conflict(change),
            None => {
                info!(path = %change.path, "No interactive provider, skipping conflict");
                ConflictDecision::Skip
            }
        }
    }

    fn approve_deletions(&self, side: Side, changes: &[ChangeRecord]) -> bool {
        let pre_approved = match side {
            Side::Local => self.approve_local,
            Side::Remote => self.approve_remote,
        };
        if pre_approved {
            debug!(%side, count = changes.len(), "Deletions pre-approved");
            return true;
        }
        match &self.interactive {
            Some(provider) => provider.approve_deletions(side, changes),
            None => false,
        }
    }
}
