//! Validated value types
//!
//! A [`SyncPath`] or [`ContentHash`] that exists is well formed; there is no
//! way to build one from unchecked input.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::DomainError;

/// Name of the hidden control directory kept at the top of every
/// synchronized tree (and under the remote prefix).
pub const CONTROL_DIR: &str = ".synchrony";

// ============================================================================
// Run identifier
// ============================================================================

/// Identifier for a single synchronization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, used in log file names
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid RunId: {e}")))
    }
}

// ============================================================================
// Path types
// ============================================================================

/// A validated path relative to the synchronized root
///
/// SyncPath is the join key shared by local snapshots, remote listings,
/// recorded state and tombstones. It is guaranteed to be:
/// - Relative (no leading `/`)
/// - `/`-separated, with no empty, `.` or `..` components
/// - Non-empty
///
/// Ordering is plain byte ordering of the string form, which gives every
/// stage of a run the same deterministic path order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SyncPath(String);

impl SyncPath {
    /// Create a new SyncPath from a `/`-separated relative string
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is empty, absolute,
    /// or contains empty, `.` or `..` components
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();
        if path.is_empty() {
            return Err(DomainError::InvalidPath("Path cannot be empty".to_string()));
        }
        if path.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "Path must be relative: {path}"
            )));
        }
        if path.contains('\\') {
            return Err(DomainError::InvalidPath(format!(
                "Path must use '/' separators: {path}"
            )));
        }
        for component in path.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(DomainError::InvalidPath(format!(
                    "Invalid path component '{component}' in {path}"
                )));
            }
        }
        Ok(Self(path))
    }

    /// Build a SyncPath from a native path relative to some root
    ///
    /// # Errors
    /// Returns error if the path has a root, a prefix, a `..` component,
    /// or a component that is not valid UTF-8
    pub fn from_relative(path: &Path) -> Result<Self, DomainError> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(c) => {
                    let c = c.to_str().ok_or_else(|| {
                        DomainError::InvalidPath(format!(
                            "Non UTF-8 component in {}",
                            path.display()
                        ))
                    })?;
                    parts.push(c);
                }
                Component::CurDir => {}
                _ => {
                    return Err(DomainError::InvalidPath(format!(
                        "Path must be relative and normalized: {}",
                        path.display()
                    )))
                }
            }
        }
        Self::new(parts.join("/"))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve this path under a native root directory
    #[must_use]
    pub fn to_native(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, c| acc.join(c))
    }

    /// Join a relative path below this one
    ///
    /// # Errors
    /// Returns error if the joined path is invalid
    pub fn join(&self, rest: &str) -> Result<Self, DomainError> {
        Self::new(format!("{}/{rest}", self.0))
    }

    /// Final path component
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns true if `self` equals `other` or lies beneath it
    #[must_use]
    pub fn is_within(&self, other: &SyncPath) -> bool {
        self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0.as_bytes().get(other.0.len()) == Some(&b'/'))
    }

    /// Every proper ancestor directory followed by the path itself,
    /// e.g. `a`, `a/b`, `a/b/c.txt`
    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.0
            .match_indices('/')
            .map(|(i, _)| &self.0[..i])
            .chain(std::iter::once(self.0.as_str()))
    }

    /// Returns true if this path lives inside the reserved control directory
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.0 == CONTROL_DIR || self.0.starts_with(&format!("{CONTROL_DIR}/"))
    }
}

impl Display for SyncPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for SyncPath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SyncPath> for String {
    fn from(path: SyncPath) -> Self {
        path.0
    }
}

// ============================================================================
// Content hash
// ============================================================================

/// SHA-256 content digest in lowercase hex
///
/// The one digest algorithm used for every run. Changing it would make every
/// recorded signature look modified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Length of the hex encoding of a SHA-256 digest
    pub const HEX_LEN: usize = 64;

    /// Create a ContentHash from an existing hex string
    ///
    /// # Errors
    /// Returns `DomainError::InvalidHash` if the string is not 64 lowercase hex digits
    pub fn new(hash: impl Into<String>) -> Result<Self, DomainError> {
        let hash = hash.into();
        if hash.len() != Self::HEX_LEN
            || !hash
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(DomainError::InvalidHash(format!(
                "expected {} lowercase hex digits, got '{hash}'",
                Self::HEX_LEN
            )));
        }
        Ok(Self(hash))
    }

    /// Hash a byte buffer
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(data)))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}
