//! Synchrony CLI - Command-line interface for Synchrony
//!
//! Provides commands for:
//! - Synchronizing a local tree with its remote prefix
//! - Resetting recorded synchronization history
//! - Listing the supported storage platforms

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use synchrony_core::config::Config;

mod commands;
mod output;
mod prompt;

use commands::{platforms::PlatformsCommand, reset::ResetCommand, sync::SyncCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "synchrony",
    version,
    about = "Two-way synchronization between a directory tree and object storage"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize the local tree with the remote prefix
    Sync(SyncCommand),
    /// Forget all recorded history on both sides
    Reset(ResetCommand),
    /// List supported storage platforms
    Platforms(PlatformsCommand),
}

/// An explicitly named file must load; the default location may be absent.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::load_or_default(&Config::default_path())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(config, format).await,
        Commands::Reset(cmd) => cmd.execute(config, format).await,
        Commands::Platforms(cmd) => cmd.execute(format),
    }
}
