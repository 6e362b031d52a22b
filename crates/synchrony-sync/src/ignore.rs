//! Ignore-pattern filtering
//!
//! The ignore file lists one glob per line; blank lines and lines starting
//! with `#` are skipped. A pattern without `/` is matched against every path
//! component, so `*.tmp` or `build` apply at any depth. A pattern containing
//! `/` is matched against each leading prefix of the path, so `docs/drafts`
//! excludes everything below that directory.
//!
//! The control directory is always ignored.

use glob::{MatchOptions, Pattern};
use tracing::warn;

use synchrony_core::domain::SyncPath;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct IgnoreRule {
    pattern: Pattern,
    anchored: bool,
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    rules: Vec<IgnoreRule>,
}

impl IgnoreFilter {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a filter from ignore-file content. Invalid globs are logged and
    /// dropped.
    pub fn parse(content: &str) -> Self {
        let rules = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let glob = line.trim_end_matches('/');
                match Pattern::new(glob) {
                    Ok(pattern) => Some(IgnoreRule {
                        pattern,
                        anchored: glob.contains('/'),
                    }),
                    Err(e) => {
                        warn!(pattern = line, error = %e, "Skipping invalid ignore pattern");
                        None
                    }
                }
            })
            .collect();
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_ignored(&self, path: &SyncPath) -> bool {
        if path.is_control() {
            return true;
        }
        self.rules.iter().any(|rule| {
            if rule.anchored {
                path.prefixes()
                    .any(|prefix| rule.pattern.matches_with(prefix, MATCH_OPTIONS))
            } else {
                path.as_str()
                    .split('/')
                    .any(|component| rule.pattern.matches_with(component, MATCH_OPTIONS))
            }
        })
    }
}
