//! Console decision provider
//!
//! Asks on the terminal for what policy leaves open. When no terminal is
//! available the prompt fails and the cautious answer is used: conflicts are
//! skipped and deletions wait.

use dialoguer::{Confirm, Select};
use tracing::warn;

use synchrony_core::domain::{ChangeKind, ChangeRecord, ConflictDecision, FileSignature, Side};
use synchrony_core::ports::IDecisionProvider;

use crate::output::count;

/// Paths listed before a deletion prompt collapses the rest
const MAX_LISTED: usize = 20;

const CONFLICT_CHOICES: [&str; 3] = ["Keep local", "Keep remote", "Skip for now"];

pub struct ConsoleDecider;

fn describe(signature: Option<&FileSignature>) -> String {
    match signature {
        Some(sig) => format!(
            "{} bytes, modified {}",
            sig.size,
            sig.last_modified.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => "deleted".to_string(),
    }
}

/// Remote side of a change, with the collaborator behind it when known
fn describe_remote(change: &ChangeRecord) -> String {
    let described = describe(change.remote.as_ref());
    match &change.remote_editor {
        Some(editor) => format!("{described} by {editor}"),
        None => described,
    }
}

fn listing(changes: &[ChangeRecord]) -> Vec<String> {
    let mut lines: Vec<String> = changes
        .iter()
        .take(MAX_LISTED)
        .map(|c| match (&c.remote_editor, c.kind) {
            (Some(editor), ChangeKind::DeletedRemote) => {
                format!("  {} (deleted by {editor})", c.path)
            }
            (Some(editor), _) => format!("  {} (last changed by {editor})", c.path),
            (None, _) => format!("  {}", c.path),
        })
        .collect();
    if changes.len() > MAX_LISTED {
        lines.push(format!("  ... and {} more", changes.len() - MAX_LISTED));
    }
    lines
}

fn decision_for(choice: usize) -> ConflictDecision {
    match choice {
        0 => ConflictDecision::LocalWins,
        1 => ConflictDecision::RemoteWins,
        _ => ConflictDecision::Skip,
    }
}

impl IDecisionProvider for ConsoleDecider {
    fn resolve_conflict(&self, change: &ChangeRecord) -> ConflictDecision {
        eprintln!();
        eprintln!("Conflict: {}", change.path);
        eprintln!("  local:  {}", describe(change.local.as_ref()));
        eprintln!("  remote: {}", describe_remote(change));

        match Select::new()
            .with_prompt("Which version should be kept?")
            .items(&CONFLICT_CHOICES)
            .default(2)
            .interact()
        {
            Ok(choice) => decision_for(choice),
            Err(e) => {
                warn!(path = %change.path, error = %e, "Prompt unavailable, skipping conflict");
                ConflictDecision::Skip
            }
        }
    }

    fn approve_deletions(&self, side: Side, changes: &[ChangeRecord]) -> bool {
        let (what, consequence) = match side {
            Side::Local => ("local", "removed from this machine"),
            Side::Remote => ("remote", "moved to the remote holding area"),
        };
        eprintln!();
        eprintln!(
            "{} deleted on the other side will be {consequence}:",
            count(changes.len(), "file")
        );
        for line in listing(changes) {
            eprintln!("{line}");
        }

        Confirm::new()
            .with_prompt(format!("Delete these {what} files?"))
            .default(false)
            .interact()
            .unwrap_or_else(|e| {
                warn!(%side, error = %e, "Prompt unavailable, deletions left pending");
                false
            })
    }
}
