//! Synchronization engine
//!
//! The [`SyncEngine`] runs one synchronization pass between the local tree
//! and the remote prefix.
//!
//! ## Sync Flow
//!
//! 1. **Prepare**: ensure the control directory and the remote prefix marker
//! 2. **Scan**: build both snapshots, reusing recorded and cached hashes,
//!    and fetch the history shared by every collaborator
//! 3. **Diff**: classify every path against the recorded state and the
//!    shared tombstones
//! 4. **Decide**: resolve conflicts and ask for deletion approval per side
//! 5. **Plan**: order the operations, deletions last
//! 6. **Execute**: apply, publishing and recording each success as it lands
//! 7. **Report**: log skipped and failed paths, return the summary
//!
//! [`SyncEngine::preview`] stops after step 5 and changes nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use synchrony_audit::RunLog;
use synchrony_core::domain::{ChangeKind, ChangeRecord, Operation, RunId, Side, SyncPath};
use synchrony_core::ports::{IDecisionProvider, ILocalFileSystem, IStateStore, IStorageBackend};

use crate::control::{
    holding_prefix, prefix_record_path, shared_index_path, ControlDir, PrefixRecord,
    FALLBACK_USER_NAME,
};
use crate::diff::{diff, summarize, DiffInput};
use crate::executor::Executor;
use crate::ignore::IgnoreFilter;
use crate::planner::{pending_deletions, plan, DeletionApprovals};
use crate::result::{SkipReason, SkippedPath, SyncResult};
use crate::scanner::{scan_local, scan_remote};
use crate::shared::{self, merge_tombstones, SharedIndexWriter};
use crate::SyncError;

/// Default number of transfers in flight
pub const DEFAULT_TRANSFER_CONCURRENCY: usize = 4;

/// What a run would do, without doing it
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPlan {
    /// Every path that differs from the recorded state
    pub changes: Vec<ChangeRecord>,
    /// Operations in execution order
    pub operations: Vec<Operation>,
    /// Paths that will be left untouched, and why
    pub skipped: Vec<SkippedPath>,
}

/// Three-way synchronization engine
///
/// ## Dependencies
///
/// - `backend`: remote object store (directory or S3)
/// - `local`: the local tree
/// - `state`: this user's recorded state, tombstones and the remote hash cache
/// - `control`: the tree's control directory (logs)
///
/// The history shared with other collaborators is read from and published
/// to the backend itself (see [`crate::shared`]).
pub struct SyncEngine {
    backend: Arc<dyn IStorageBackend>,
    local: Arc<dyn ILocalFileSystem>,
    state: Arc<dyn IStateStore>,
    control: ControlDir,
    ignore: IgnoreFilter,
    transfer_concurrency: usize,
    user_name: String,
    cancel: CancellationToken,
}

impl SyncEngine {
    pub fn new(
        backend: Arc<dyn IStorageBackend>,
        local: Arc<dyn ILocalFileSystem>,
        state: Arc<dyn IStateStore>,
        control: ControlDir,
    ) -> Self {
        Self {
            backend,
            local,
            state,
            control,
            ignore: IgnoreFilter::empty(),
            transfer_concurrency: DEFAULT_TRANSFER_CONCURRENCY,
            user_name: FALLBACK_USER_NAME.to_string(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_ignore(mut self, ignore: IgnoreFilter) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_transfer_concurrency(mut self, concurrency: usize) -> Self {
        self.transfer_concurrency = concurrency.max(1);
        self
    }

    /// Name stamped on remote control records and shared history entries
    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = name.into();
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Write the remote prefix marker if it is missing
    ///
    /// Returns `true` when the prefix was initialized by this call.
    #[instrument(skip(self), fields(location = %self.backend.location()))]
    pub async fn ensure_remote_initialized(&self) -> Result<bool, SyncError> {
        let marker = prefix_record_path()?;
        if self
            .backend
            .exists(&marker)
            .await
            .map_err(SyncError::BackendUnavailable)?
        {
            return Ok(false);
        }

        info!("Remote prefix has not been initialized, initializing");
        let record = PrefixRecord::new(self.user_name.clone());
        let body = serde_json::to_vec_pretty(&record)
            .map_err(|e| SyncError::BackendUnavailable(e.into()))?;
        self.backend
            .put(&marker, &body)
            .await
            .map_err(SyncError::BackendUnavailable)?;
        Ok(true)
    }

    /// Scan, diff, decide and plan without changing anything
    #[instrument(skip_all)]
    pub async fn preview(&self, decider: &dyn IDecisionProvider) -> Result<SyncPlan, SyncError> {
        self.prepare(decider).await
    }

    async fn prepare(&self, decider: &dyn IDecisionProvider) -> Result<SyncPlan, SyncError> {
        let local_state = self.state.load(Side::Local).await.map_err(SyncError::State)?;
        let remote_state = self.state.load(Side::Remote).await.map_err(SyncError::State)?;
        let history = shared::fetch(self.backend.as_ref())
            .await
            .map_err(SyncError::BackendUnavailable)?;
        let tombstones_remote = merge_tombstones(&remote_state.tombstones, &history.tombstones());

        let local_scan = scan_local(
            self.local.as_ref(),
            &self.ignore,
            &local_state.recorded,
            self.transfer_concurrency,
        )
        .await?;
        let remote_scan = scan_remote(
            self.backend.as_ref(),
            self.state.as_ref(),
            &self.ignore,
            self.transfer_concurrency,
        )
        .await?;

        let unreadable: BTreeSet<SyncPath> = local_scan
            .unreadable
            .keys()
            .chain(remote_scan.unreadable.keys())
            .cloned()
            .collect();
        let mut skipped: Vec<SkippedPath> = local_scan
            .unreadable
            .iter()
            .chain(remote_scan.unreadable.iter())
            .map(|(path, err)| {
                let detail = match err {
                    SyncError::Scan { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                SkippedPath::new(path.clone(), SkipReason::Unreadable).with_detail(detail)
            })
            .collect();

        let changes = diff(&DiffInput {
            local: &local_scan.snapshot,
            remote: &remote_scan.snapshot,
            recorded_local: &local_state.recorded,
            recorded_remote: &remote_state.recorded,
            tombstones_local: &local_state.tombstones,
            tombstones_remote: &tombstones_remote,
            unreadable: &unreadable,
        });
        let changes: Vec<ChangeRecord> = changes
            .into_iter()
            .filter(|c| c.kind != ChangeKind::Unchanged)
            .map(|mut c| {
                c.remote_editor = history.last_editor(&c.path).map(str::to_string);
                c
            })
            .collect();
        info!(changes = ?summarize(&changes), "Changes classified");

        let decisions: BTreeMap<_, _> = changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Conflict)
            .map(|c| (c.path.clone(), decider.resolve_conflict(c)))
            .collect();

        let (local_deletions, remote_deletions) = pending_deletions(&changes);
        let approvals = DeletionApprovals {
            local: !local_deletions.is_empty()
                && decider.approve_deletions(Side::Local, &local_deletions),
            remote: !remote_deletions.is_empty()
                && decider.approve_deletions(Side::Remote, &remote_deletions),
        };
        debug!(?approvals, conflicts = decisions.len(), "Decisions collected");

        let planned = plan(&changes, &decisions, approvals);
        skipped.extend(planned.skipped);
        skipped.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(SyncPlan {
            changes,
            operations: planned.operations,
            skipped,
        })
    }

    /// Run one full synchronization pass
    ///
    /// # Errors
    /// Only whole-run failures are returned: an unreachable backend or local
    /// root, or an unusable state store. Per-path problems are reported in
    /// the [`SyncResult`].
    #[instrument(skip_all, fields(location = %self.backend.location()))]
    pub async fn run(&self, decider: &dyn IDecisionProvider) -> Result<SyncResult, SyncError> {
        let start = Instant::now();
        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(%run_id, root = %self.local.root().display(), "Starting sync run");

        self.control.ensure().await?;
        self.ensure_remote_initialized().await?;

        let prepared = self.prepare(decider).await?;
        let writer = SharedIndexWriter::new(self.backend.as_ref(), &self.user_name);
        let report = Executor::new(
            self.backend.as_ref(),
            self.local.as_ref(),
            self.state.as_ref(),
            &writer,
            holding_prefix(started_at, run_id)?,
        )
        .with_concurrency(self.transfer_concurrency)
        .with_cancellation(self.cancel.clone())
        .execute(prepared.operations)
        .await;

        let mut skipped = prepared.skipped;
        skipped.extend(report.cancelled);

        let mut log = RunLog::new(&self.control.logs_dir(), run_id, started_at);
        for failed in &report.failed {
            log.log_failure(
                &failed.operation.path,
                &failed.operation.kind.to_string(),
                failed.reason,
                &failed.error,
            )
            .await;
        }
        for skip in &skipped {
            log.log_skip(&skip.path, &skip.message()).await;
        }

        let result = SyncResult {
            run_id,
            applied: report.applied,
            failed: report.failed,
            skipped,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            log_path: log.finish(),
        };

        info!(
            %run_id,
            applied = result.applied.len(),
            failed = result.failed.len(),
            skipped = result.skipped.len(),
            duration_ms = result.duration_ms,
            "Sync run complete"
        );
        Ok(result)
    }

    /// Forget all recorded history on both sides
    ///
    /// Clears the state store (recorded state, tombstones, hash cache), the
    /// shared history and the remote prefix marker. Soft-deleted objects
    /// stay in the holding area. The next run treats every path as new;
    /// identical content on both sides converges without transfers.
    #[instrument(skip(self), fields(location = %self.backend.location()))]
    pub async fn reset(&self, confirmed: bool) -> Result<(), SyncError> {
        if !confirmed {
            return Err(SyncError::ResetNotConfirmed);
        }
        self.state.reset().await.map_err(SyncError::State)?;

        for record in [shared_index_path()?, prefix_record_path()?] {
            if self
                .backend
                .exists(&record)
                .await
                .map_err(SyncError::BackendUnavailable)?
            {
                self.backend
                    .remove(&record)
                    .await
                    .map_err(SyncError::BackendUnavailable)?;
            }
        }
        info!("Synchronization state reset");
        Ok(())
    }
}
