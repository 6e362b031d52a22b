//! Control directory layout
//!
//! Each synchronized tree keeps its private state in `<root>/.synchrony/`:
//!
//! | Entry         | Content                                             |
//! |---------------|-----------------------------------------------------|
//! | `state.db`    | Recorded state, tombstones, remote hash cache       |
//! | `ignore`      | Ignore patterns, one glob per line                  |
//! | `user_name`   | Display name written into remote control records    |
//! | `credentials` | Name of the cloud credential profile to use         |
//! | `logs/`       | Per-run logs of skipped and failed paths            |
//!
//! The remote prefix mirrors the same directory name for its own control
//! records: `prefix.json` marks an initialized prefix, `index.json` is the
//! history shared by every collaborator (see [`crate::shared`]) and
//! `deleted/` holds soft-deleted objects, one folder per run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use synchrony_core::domain::{RunId, SyncPath, CONTROL_DIR};

use crate::ignore::IgnoreFilter;
use crate::SyncError;

/// Display name used when no record and no `$USER` are available
pub const FALLBACK_USER_NAME: &str = "NONAME";

const PREFIX_RECORD: &str = "prefix.json";
const SHARED_INDEX: &str = "index.json";
const DELETED_AREA: &str = "deleted";

/// Paths of the local control directory for one tree
#[derive(Debug, Clone)]
pub struct ControlDir {
    dir: PathBuf,
}

impl ControlDir {
    pub fn new(tree_root: &Path) -> Self {
        Self {
            dir: tree_root.join(CONTROL_DIR),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn state_db(&self) -> PathBuf {
        self.dir.join("state.db")
    }

    pub fn ignore_file(&self) -> PathBuf {
        self.dir.join("ignore")
    }

    pub fn user_name_file(&self) -> PathBuf {
        self.dir.join("user_name")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.dir.join("credentials")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir.join("logs")
    }

    /// Create the control directory and its log area
    pub async fn ensure(&self) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(self.logs_dir()).await?;
        debug!(dir = %self.dir.display(), "Control directory ready");
        Ok(())
    }

    /// Load the ignore list; a missing file means nothing is ignored
    pub async fn load_ignore(&self) -> Result<IgnoreFilter, SyncError> {
        match read_optional(&self.ignore_file()).await? {
            Some(content) => Ok(IgnoreFilter::parse(&content)),
            None => Ok(IgnoreFilter::empty()),
        }
    }

    pub async fn read_user_name(&self) -> Result<Option<String>, SyncError> {
        Ok(first_line(read_optional(&self.user_name_file()).await?))
    }

    pub async fn write_user_name(&self, name: &str) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.user_name_file(), format!("{}\n", name.trim())).await?;
        Ok(())
    }

    /// Credential profile name from the credential record, if any
    pub async fn read_credential_profile(&self) -> Result<Option<String>, SyncError> {
        Ok(first_line(read_optional(&self.credentials_file()).await?))
    }

    /// Name to stamp on remote control records: the user name record,
    /// then `$USER`, then [`FALLBACK_USER_NAME`]
    pub async fn display_name(&self) -> Result<String, SyncError> {
        if let Some(name) = self.read_user_name().await? {
            return Ok(name);
        }
        Ok(std::env::var("USER")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_USER_NAME.to_string()))
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, SyncError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// First non-blank, non-comment line
fn first_line(content: Option<String>) -> Option<String> {
    content?
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
}

// ============================================================================
// Remote control records
// ============================================================================

/// Marker stored at `<prefix>/.synchrony/prefix.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRecord {
    pub format: u32,
    pub initialized_at: DateTime<Utc>,
    pub initialized_by: String,
}

impl PrefixRecord {
    pub const FORMAT: u32 = 1;

    pub fn new(initialized_by: impl Into<String>) -> Self {
        Self {
            format: Self::FORMAT,
            initialized_at: Utc::now(),
            initialized_by: initialized_by.into(),
        }
    }
}

fn control_path(rest: &str) -> Result<SyncPath, SyncError> {
    SyncPath::new(format!("{CONTROL_DIR}/{rest}"))
        .map_err(|e| SyncError::InvalidConfig(e.to_string()))
}

/// Remote path of the prefix marker
pub fn prefix_record_path() -> Result<SyncPath, SyncError> {
    control_path(PREFIX_RECORD)
}

/// Remote path of the shared history index
pub fn shared_index_path() -> Result<SyncPath, SyncError> {
    control_path(SHARED_INDEX)
}

/// Holding area for objects soft-deleted by run `run_id`, started at `at`
///
/// The run id keeps two runs started in the same second, possibly by two
/// collaborators, from moving objects onto each other.
pub fn holding_prefix(at: DateTime<Utc>, run_id: RunId) -> Result<SyncPath, SyncError> {
    control_path(&format!(
        "{DELETED_AREA}/{}-{}",
        at.format("%Y%m%dT%H%M%SZ"),
        run_id.short()
    ))
}
