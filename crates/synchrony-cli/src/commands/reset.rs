//! Reset command - Forget recorded history on both sides
//!
//! Clears the local state database and the remote prefix marker. Files on
//! either side and the remote holding area are left untouched.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use dialoguer::Confirm;
use tracing::warn;

use synchrony_core::config::Config;
use synchrony_sync::SyncError;

use crate::commands::{check_config, open_engine};
use crate::output::{Output, OutputFormat};

#[derive(Debug, Args)]
pub struct ResetCommand {
    /// Confirm without prompting
    #[arg(long)]
    pub yes: bool,

    /// Local tree whose history is reset (overrides `sync.root`)
    #[arg(long)]
    pub root: Option<PathBuf>,
}

impl ResetCommand {
    fn confirmed(&self, format: OutputFormat) -> bool {
        if self.yes {
            return true;
        }
        if format.is_json() {
            return false;
        }
        Confirm::new()
            .with_prompt(
                "Forget all synchronization history? The next sync will compare every file from scratch",
            )
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Prompt unavailable");
                false
            })
    }

    pub async fn execute(&self, mut config: Config, format: OutputFormat) -> Result<()> {
        let output = Output::new(format);
        if let Some(root) = &self.root {
            config.sync.root = root.clone();
        }
        check_config(&config, &output)?;

        let confirmed = self.confirmed(format);
        let engine = open_engine(&config).await?;
        match engine.reset(confirmed).await {
            Ok(()) => {
                output.success("Synchronization history reset");
                output.document(&serde_json::json!({"reset": true}))?;
                Ok(())
            }
            Err(SyncError::ResetNotConfirmed) => {
                output.warn("Reset not confirmed, nothing changed (use --yes to confirm)");
                output.document(&serde_json::json!({"reset": false}))?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yes_confirms_without_prompt() {
        let cmd = ResetCommand {
            yes: true,
            root: None,
        };
        assert!(cmd.confirmed(OutputFormat::Human));
    }

    #[test]
    fn test_json_never_prompts() {
        let cmd = ResetCommand {
            yes: false,
            root: None,
        };
        assert!(!cmd.confirmed(OutputFormat::Json));
    }
}
