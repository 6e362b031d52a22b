//! Sync command - Synchronize the local tree with the remote prefix
//!
//! Provides the `synchrony sync` CLI command which:
//! 1. Validates configuration and connects the remote
//! 2. Builds a decision provider from policy, flags and (optionally) the console
//! 3. Runs the engine, or only previews the plan with `--dry-run`
//! 4. Prints applied, skipped and failed paths

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use tracing::warn;

use synchrony_conflict::PolicyDecider;
use synchrony_core::config::Config;
use synchrony_core::domain::{Operation, OperationKind, Side};
use synchrony_sync::{SyncPlan, SyncResult};

use crate::commands::{check_config, open_engine};
use crate::output::{count, duration, Output, OutputFormat};
use crate::prompt::ConsoleDecider;

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Approve removing local files that were deleted remotely
    #[arg(long)]
    pub yes_delete_local: bool,

    /// Approve moving remote objects that were deleted locally to the holding area
    #[arg(long)]
    pub yes_delete_remote: bool,

    /// Never prompt: conflicts without a policy are skipped, unapproved deletions wait
    #[arg(long)]
    pub non_interactive: bool,

    /// Local tree to synchronize (overrides `sync.root`)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

impl SyncCommand {
    fn decider(&self, config: &Config, format: OutputFormat) -> PolicyDecider {
        let mut decider = PolicyDecider::from_config(config);
        if self.yes_delete_local {
            decider = decider.approve(Side::Local);
        }
        if self.yes_delete_remote {
            decider = decider.approve(Side::Remote);
        }
        if !self.non_interactive && !format.is_json() {
            decider = decider.with_interactive(Arc::new(ConsoleDecider));
        }
        decider
    }

    pub async fn execute(&self, mut config: Config, format: OutputFormat) -> Result<()> {
        let output = Output::new(format);
        if let Some(root) = &self.root {
            config.sync.root = root.clone();
        }
        check_config(&config, &output)?;

        let engine = open_engine(&config).await?;
        let decider = self.decider(&config, format);

        if self.dry_run {
            let plan = engine.preview(&decider).await?;
            if output.is_json() {
                output.document(&plan)?;
            } else {
                print_plan(&plan, &output);
            }
            return Ok(());
        }

        let cancel = engine.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing operations already in flight");
                cancel.cancel();
            }
        });

        let result = engine.run(&decider).await?;
        if output.is_json() {
            output.document(&result)?;
        } else {
            print_result(&result, &output);
        }

        if !result.failed.is_empty() {
            bail!("{} failed", count(result.failed.len(), "operation"));
        }
        Ok(())
    }
}

fn label(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Upload => "Uploaded",
        OperationKind::Download => "Downloaded",
        OperationKind::SoftDeleteRemote => "Moved to holding area",
        OperationKind::DeleteLocal => "Deleted locally",
        OperationKind::RecordOnly => "Recorded",
    }
}

/// Count operations per kind, in a stable order
fn tally(operations: &[Operation]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for op in operations {
        *counts.entry(label(op.kind)).or_insert(0) += 1;
    }
    counts
}

fn print_plan(plan: &SyncPlan, output: &Output) {
    if plan.operations.is_empty() && plan.skipped.is_empty() {
        output.success("Already up to date");
        return;
    }
    output.success(&format!(
        "Dry run: {} planned, nothing changed",
        count(plan.operations.len(), "operation")
    ));
    for op in &plan.operations {
        output.detail(&format!("{:<20} {}", op.kind.to_string(), op.path));
    }
    for skip in &plan.skipped {
        output.warn(&format!("{}: {}", skip.path, skip.message()));
    }
}

fn print_result(result: &SyncResult, output: &Output) {
    if result.applied.is_empty() && result.is_clean() {
        output.success("Already up to date");
        return;
    }

    output.success(&format!("Sync completed in {}", duration(result.duration_ms)));
    for (what, n) in tally(&result.applied) {
        output.detail(&format!("{what}: {}", count(n, "file")));
    }
    for skip in &result.skipped {
        output.warn(&format!("{}: {}", skip.path, skip.message()));
    }
    if !result.failed.is_empty() {
        output.error(&format!(
            "{} failed:",
            count(result.failed.len(), "operation")
        ));
        for failed in &result.failed {
            output.detail(&format!(
                "- {} {} [{}]: {}",
                failed.operation.kind, failed.operation.path, failed.reason, failed.error
            ));
        }
    }
    if let Some(log) = &result.log_path {
        output.detail(&format!("Details: {}", log.display()));
    }
}
