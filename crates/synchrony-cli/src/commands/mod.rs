pub mod platforms;
pub mod reset;
pub mod sync;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use synchrony_cache::{DatabasePool, SqliteStateStore};
use synchrony_core::config::Config;
use synchrony_sync::backends::Backend;
use synchrony_sync::filesystem::LocalFileSystemAdapter;
use synchrony_sync::{ControlDir, SyncEngine};

use crate::output::Output;

/// Report every configuration problem, then refuse to continue
pub(crate) fn check_config(config: &Config, output: &Output) -> Result<()> {
    let errors = config.validate();
    if errors.is_empty() {
        return Ok(());
    }
    for err in &errors {
        output.error(&err.to_string());
    }
    bail!("Invalid configuration ({} problem(s))", errors.len())
}

/// Connect the configured tree, remote and state database
///
/// Failing to reach the remote is fatal: nothing is scanned or changed.
pub(crate) async fn open_engine(config: &Config) -> Result<SyncEngine> {
    let root = &config.sync.root;
    let control = ControlDir::new(root);
    control
        .ensure()
        .await
        .with_context(|| format!("Failed to prepare {}", control.path().display()))?;

    let profile = control.read_credential_profile().await?;
    let backend = Backend::connect(&config.remote, profile)
        .await
        .context("Failed to connect to remote storage")?;

    let pool = DatabasePool::new(&control.state_db())
        .await
        .context("Failed to open state database")?;
    let state = Arc::new(SqliteStateStore::new(pool.pool().clone()));

    let ignore = control.load_ignore().await?;
    let user_name = control.display_name().await?;
    info!(
        root = %root.display(),
        platform = %config.remote.platform,
        ignore_rules = ignore.len(),
        user = %user_name,
        "Engine ready"
    );

    Ok(SyncEngine::new(
        Arc::new(backend),
        Arc::new(LocalFileSystemAdapter::new(root)),
        state,
        control,
    )
    .with_ignore(ignore)
    .with_transfer_concurrency(config.sync.transfer_concurrency)
    .with_user_name(user_name))
}
