//! Configuration module for Synchrony.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Synchrony.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub conflicts: ConflictsConfig,
    pub deletions: DeletionsConfig,
    pub logging: LoggingConfig,
}

/// Local side settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root of the local directory tree to synchronize.
    pub root: PathBuf,
    /// Maximum uploads/downloads in flight at once.
    pub transfer_concurrency: usize,
}

/// Supported storage platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// A plain directory (local disk, network mount)
    Directory,
    /// An S3 bucket and prefix
    S3,
}

impl Platform {
    /// Every platform, in display order
    pub const ALL: [Platform; 2] = [Platform::Directory, Platform::S3];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Directory => "directory",
            Platform::S3 => "s3",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown platform '{s}'"))
    }
}

/// Remote side settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Which backend to use.
    pub platform: Platform,
    pub directory: DirectoryRemoteConfig,
    pub s3: S3RemoteConfig,
}

/// Settings for the directory backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryRemoteConfig {
    /// Directory acting as the remote prefix.
    pub root: Option<PathBuf>,
}

/// Settings for the S3 backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct S3RemoteConfig {
    pub bucket: String,
    /// Key prefix under which the tree is stored (no leading or trailing `/`).
    pub prefix: String,
    pub region: Option<String>,
    /// Custom endpoint (MinIO, LocalStack, ...).
    pub endpoint_url: Option<String>,
    /// Named credentials profile. Falls back to the control directory's
    /// credential record, then to the default provider chain.
    pub profile: Option<String>,
}

/// A glob rule mapping matching paths to a conflict strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRuleConfig {
    /// Glob pattern matched against the relative path, e.g. `"**/*.csv"`.
    pub pattern: String,
    /// One of `manual`, `keep_local`, `keep_remote`, `skip`.
    pub strategy: String,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Default conflict strategy: `manual`, `keep_local`, `keep_remote`, or `skip`.
    pub default_strategy: String,
    /// Per-path overrides, first match wins.
    pub rules: Vec<ConflictRuleConfig>,
}

/// Pre-granted deletion approvals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionsConfig {
    /// Remove local files deleted remotely without asking.
    pub auto_approve_local: bool,
    /// Soft-delete remote objects deleted locally without asking.
    pub auto_approve_remote: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/synchrony/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("synchrony")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            transfer_concurrency: 4,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            platform: Platform::S3,
            directory: DirectoryRemoteConfig::default(),
            s3: S3RemoteConfig::default(),
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_strategy: "manual".to_string(),
            rules: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"remote.s3.bucket"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `conflicts.default_strategy` and rule strategies.
pub const VALID_CONFLICT_STRATEGIES: &[&str] = &["manual", "keep_local", "keep_remote", "skip"];

/// Upper bound for `sync.transfer_concurrency`.
const MAX_TRANSFER_CONCURRENCY: usize = 64;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if !self.sync.root.is_dir() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("directory does not exist: {}", self.sync.root.display()),
            });
        }
        if self.sync.transfer_concurrency == 0
            || self.sync.transfer_concurrency > MAX_TRANSFER_CONCURRENCY
        {
            errors.push(ValidationError {
                field: "sync.transfer_concurrency".into(),
                message: format!("must be in range 1..={MAX_TRANSFER_CONCURRENCY}"),
            });
        }

        // --- remote ---
        match self.remote.platform {
            Platform::Directory => match &self.remote.directory.root {
                None => errors.push(ValidationError {
                    field: "remote.directory.root".into(),
                    message: "required when platform is 'directory'".into(),
                }),
                Some(root) if root == &self.sync.root => errors.push(ValidationError {
                    field: "remote.directory.root".into(),
                    message: "must differ from sync.root".into(),
                }),
                Some(_) => {}
            },
            Platform::S3 => {
                if self.remote.s3.bucket.trim().is_empty() {
                    errors.push(ValidationError {
                        field: "remote.s3.bucket".into(),
                        message: "required when platform is 's3'".into(),
                    });
                }
                if self.remote.s3.prefix.starts_with('/') || self.remote.s3.prefix.ends_with('/')
                {
                    errors.push(ValidationError {
                        field: "remote.s3.prefix".into(),
                        message: "must not start or end with '/'".into(),
                    });
                }
            }
        }

        // --- conflicts ---
        if !VALID_CONFLICT_STRATEGIES.contains(&self.conflicts.default_strategy.as_str()) {
            errors.push(ValidationError {
                field: "conflicts.default_strategy".into(),
                message: format!(
                    "invalid strategy '{}'; valid options: {}",
                    self.conflicts.default_strategy,
                    VALID_CONFLICT_STRATEGIES.join(", ")
                ),
            });
        }
        for (i, rule) in self.conflicts.rules.iter().enumerate() {
            if rule.pattern.is_empty() {
                errors.push(ValidationError {
                    field: format!("conflicts.rules[{i}].pattern"),
                    message: "must not be empty".into(),
                });
            }
            if !VALID_CONFLICT_STRATEGIES.contains(&rule.strategy.as_str()) {
                errors.push(ValidationError {
                    field: format!("conflicts.rules[{i}].strategy"),
                    message: format!("invalid strategy '{}'", rule.strategy),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use synchrony_core::config::{ConfigBuilder, Platform};
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/data/project"))
///     .platform(Platform::S3)
///     .s3_bucket("team-bucket")
///     .s3_prefix("projects/alpha")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn transfer_concurrency(mut self, n: usize) -> Self {
        self.config.sync.transfer_concurrency = n;
        self
    }

    // --- remote ---

    pub fn platform(mut self, platform: Platform) -> Self {
        self.config.remote.platform = platform;
        self
    }

    pub fn directory_root(mut self, root: PathBuf) -> Self {
        self.config.remote.directory.root = Some(root);
        self
    }

    pub fn s3_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.remote.s3.bucket = bucket.into();
        self
    }

    pub fn s3_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.remote.s3.prefix = prefix.into();
        self
    }

    pub fn s3_region(mut self, region: impl Into<String>) -> Self {
        self.config.remote.s3.region = Some(region.into());
        self
    }

    pub fn s3_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.s3.endpoint_url = Some(url.into());
        self
    }

    pub fn s3_profile(mut self, profile: impl Into<String>) -> Self {
        self.config.remote.s3.profile = Some(profile.into());
        self
    }

    // --- conflicts ---

    pub fn conflicts_default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.conflicts.default_strategy = strategy.into();
        self
    }

    pub fn conflict_rule(mut self, pattern: impl Into<String>, strategy: impl Into<String>) -> Self {
        self.config.conflicts.rules.push(ConflictRuleConfig {
            pattern: pattern.into(),
            strategy: strategy.into(),
        });
        self
    }

    // --- deletions ---

    pub fn auto_approve_local_deletes(mut self, approve: bool) -> Self {
        self.config.deletions.auto_approve_local = approve;
        self
    }

    pub fn auto_approve_remote_deletes(mut self, approve: bool) -> Self {
        self.config.deletions.auto_approve_remote = approve;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.sync.transfer_concurrency, 4);
        assert_eq!(cfg.remote.platform, Platform::S3);
        assert!(cfg.remote.s3.bucket.is_empty());
        assert_eq!(cfg.conflicts.default_strategy, "manual");
        assert!(cfg.conflicts.rules.is_empty());
        assert!(!cfg.deletions.auto_approve_local);
        assert!(!cfg.deletions.auto_approve_remote);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_only_misses_bucket() {
        let errors = Config::default().validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["remote.s3.bucket"]);
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
sync:
  root: /tmp/project
  transfer_concurrency: 8
remote:
  platform: s3
  s3:
    bucket: team-bucket
    prefix: projects/alpha
    region: eu-west-1
    endpoint_url: http://localhost:9000
    profile: analytics
conflicts:
  default_strategy: keep_remote
  rules:
    - pattern: "**/*.csv"
      strategy: keep_local
deletions:
  auto_approve_remote: true
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.sync.root, PathBuf::from("/tmp/project"));
        assert_eq!(cfg.sync.transfer_concurrency, 8);
        assert_eq!(cfg.remote.platform, Platform::S3);
        assert_eq!(cfg.remote.s3.bucket, "team-bucket");
        assert_eq!(cfg.remote.s3.prefix, "projects/alpha");
        assert_eq!(cfg.remote.s3.region.as_deref(), Some("eu-west-1"));
        assert_eq!(
            cfg.remote.s3.endpoint_url.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(cfg.remote.s3.profile.as_deref(), Some("analytics"));
        assert_eq!(cfg.conflicts.default_strategy, "keep_remote");
        assert_eq!(
            cfg.conflicts.rules,
            vec![ConflictRuleConfig {
                pattern: "**/*.csv".into(),
                strategy: "keep_local".into()
            }]
        );
        assert!(cfg.deletions.auto_approve_remote);
        assert!(!cfg.deletions.auto_approve_local);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let yaml = "remote:\n  platform: directory\n  directory:\n    root: /mnt/share\n";
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.remote.platform, Platform::Directory);
        assert_eq!(cfg.remote.directory.root, Some(PathBuf::from("/mnt/share")));
        assert_eq!(cfg.sync.transfer_concurrency, 4);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.sync.transfer_concurrency, 4);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_bad_concurrency() {
        let mut cfg = Config::default();
        cfg.sync.transfer_concurrency = 0;
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "sync.transfer_concurrency"));
    }

    #[test]
    fn validate_requires_directory_root() {
        let cfg = ConfigBuilder::new().platform(Platform::Directory).build();
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "remote.directory.root"));
    }

    #[test]
    fn validate_rejects_slashed_prefix() {
        let cfg = ConfigBuilder::new()
            .s3_bucket("b")
            .s3_prefix("/abs/")
            .build();
        assert!(cfg.validate().iter().any(|e| e.field == "remote.s3.prefix"));
    }

    #[test]
    fn validate_catches_invalid_strategies() {
        let cfg = ConfigBuilder::new()
            .s3_bucket("b")
            .conflicts_default_strategy("keep_both")
            .conflict_rule("*.tmp", "yolo")
            .build();
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"conflicts.default_strategy".to_string()));
        assert!(fields.contains(&"conflicts.rules[0].strategy".to_string()));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let mut cfg = Config::default();
        cfg.logging.level = "verbose".to_string();
        assert!(cfg.validate().iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validate_accepts_all_valid_conflict_strategies() {
        for strat in VALID_CONFLICT_STRATEGIES {
            let cfg = ConfigBuilder::new()
                .s3_bucket("b")
                .conflicts_default_strategy(*strat)
                .build();
            assert!(
                cfg.validate().is_empty(),
                "strategy '{strat}' should be valid"
            );
        }
    }

    // -- Platform --

    #[test]
    fn platform_round_trips_through_str() {
        for p in Platform::ALL {
            assert_eq!(p.as_str().parse::<Platform>().unwrap(), p);
        }
        assert!("ftp".parse::<Platform>().is_err());
    }

    // -- Builder --

    #[test]
    fn builder_overrides_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = tempfile::tempdir().unwrap();
        let cfg = ConfigBuilder::new()
            .sync_root(tmp.path().to_path_buf())
            .transfer_concurrency(2)
            .platform(Platform::Directory)
            .directory_root(remote.path().to_path_buf())
            .conflicts_default_strategy("keep_local")
            .auto_approve_local_deletes(true)
            .logging_level("debug")
            .build_validated()
            .expect("valid config");

        assert_eq!(cfg.sync.root, tmp.path());
        assert_eq!(cfg.sync.transfer_concurrency, 2);
        assert_eq!(cfg.remote.platform, Platform::Directory);
        assert_eq!(cfg.conflicts.default_strategy, "keep_local");
        assert!(cfg.deletions.auto_approve_local);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn builder_sets_s3_settings() {
        let cfg = ConfigBuilder::new()
            .s3_bucket("team-share")
            .s3_prefix("projects/alpha")
            .s3_region("eu-west-1")
            .s3_endpoint_url("http://localhost:9000")
            .s3_profile("alpha")
            .auto_approve_remote_deletes(true)
            .build();

        assert_eq!(cfg.remote.platform, Platform::S3);
        assert_eq!(cfg.remote.s3.bucket, "team-share");
        assert_eq!(cfg.remote.s3.prefix, "projects/alpha");
        assert_eq!(cfg.remote.s3.region.as_deref(), Some("eu-west-1"));
        assert_eq!(cfg.remote.s3.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(cfg.remote.s3.profile.as_deref(), Some("alpha"));
        assert!(cfg.deletions.auto_approve_remote);
        assert!(!cfg.deletions.auto_approve_local);
    }

    #[test]
    fn build_validated_returns_errors() {
        let result = ConfigBuilder::new().transfer_concurrency(0).build_validated();
        assert!(result.is_err());
    }
}
