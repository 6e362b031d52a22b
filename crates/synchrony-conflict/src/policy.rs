//! Policy engine for conflict resolution
//!
//! Evaluates conflict rules from configuration to pick a strategy per path.
//! Rules are matched using glob patterns in first-match-wins order.

use std::fmt;
use std::str::FromStr;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use synchrony_core::config::ConflictRuleConfig;
use synchrony_core::domain::ConflictDecision;

use crate::error::ConflictError;

/// How a conflicting path should be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Ask the interactive decision provider
    Manual,
    KeepLocal,
    KeepRemote,
    /// Leave the conflict for a later run
    Skip,
}

impl Strategy {
    /// The decision this strategy produces without asking anyone.
    /// `None` for [`Strategy::Manual`].
    #[must_use]
    pub fn decision(self) -> Option<ConflictDecision> {
        match self {
            Strategy::Manual => None,
            Strategy::KeepLocal => Some(ConflictDecision::LocalWins),
            Strategy::KeepRemote => Some(ConflictDecision::RemoteWins),
            Strategy::Skip => Some(ConflictDecision::Skip),
        }
    }
}

impl FromStr for Strategy {
    type Err = ConflictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Strategy::Manual),
            "keep_local" => Ok(Strategy::KeepLocal),
            "keep_remote" => Ok(Strategy::KeepRemote),
            "skip" => Ok(Strategy::Skip),
            other => Err(ConflictError::InvalidStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Strategy::Manual => "manual",
            Strategy::KeepLocal => "keep_local",
            Strategy::KeepRemote => "keep_remote",
            Strategy::Skip => "skip",
        };
        f.write_str(s)
    }
}

/// `*` must not cross directory boundaries; `**` does.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Validates a single rule's pattern and strategy
pub fn validate_rule(rule: &ConflictRuleConfig) -> Result<(Pattern, Strategy), ConflictError> {
    let pattern = Pattern::new(&rule.pattern).map_err(|e| ConflictError::InvalidPattern {
        pattern: rule.pattern.clone(),
        reason: e.to_string(),
    })?;
    let strategy = rule.strategy.parse()?;
    Ok((pattern, strategy))
}

/// Engine that evaluates conflict resolution rules
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: Vec<(Pattern, Strategy)>,
    default_strategy: Strategy,
}

impl PolicyEngine {
    /// Creates a PolicyEngine from the default strategy string and a list of rules
    ///
    /// Invalid rules are logged and skipped; an invalid default falls back
    /// to [`Strategy::Manual`].
    pub fn new(default_strategy: &str, rules: &[ConflictRuleConfig]) -> Self {
        let default = default_strategy.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid default conflict strategy, using manual");
            Strategy::Manual
        });

        let compiled_rules: Vec<(Pattern, Strategy)> = rules
            .iter()
            .filter_map(|rule| match validate_rule(rule) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!(
                        pattern = %rule.pattern,
                        error = %e,
                        "Skipping invalid conflict rule"
                    );
                    None
                }
            })
            .collect();

        debug!(
            rules_count = compiled_rules.len(),
            default = %default,
            "PolicyEngine initialized"
        );

        Self {
            rules: compiled_rules,
            default_strategy: default,
        }
    }

    /// Evaluates the policy for a relative path; first matching rule wins
    pub fn evaluate(&self, relative_path: &str) -> Strategy {
        for (pattern, strategy) in &self.rules {
            if pattern.matches_with(relative_path, MATCH_OPTIONS) {
                trace!(
                    path = %relative_path,
                    pattern = %pattern,
                    strategy = %strategy,
                    "Conflict rule matched"
                );
                return *strategy;
            }
        }

        trace!(
            path = %relative_path,
            default = %self.default_strategy,
            "No conflict rule matched, using default"
        );
        self.default_strategy
    }

    pub fn default_strategy(&self) -> Strategy {
        self.default_strategy
    }

    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }
}
