//! Operation executor
//!
//! Applies a plan. Each operation is isolated: a failure is classified,
//! reported and the run moves on. State is recorded per operation, right
//! after the side effect succeeds, so an interrupted run keeps everything
//! that finished and re-detects the rest next time. The shared index is
//! published before the private state, so a path whose publication failed
//! is planned again and published by the next run.
//!
//! A local file is only replaced or removed while it still matches the
//! signature the plan was made against. Decisions are taken between scan and
//! execution, and an edit saved meanwhile fails the operation with a hash
//! mismatch instead of being lost.
//!
//! Uploads, downloads and recorded updates run with bounded concurrency.
//! Deleting operations run afterwards, one at a time. The cancellation token
//! is checked before each operation starts; in-flight operations always
//! finish.

use anyhow::anyhow;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use synchrony_audit::ReasonCode;
use synchrony_core::domain::{ContentHash, FileSignature, Operation, OperationKind, SyncPath};
use synchrony_core::ports::{ILocalFileSystem, IStateStore, IStorageBackend};

use crate::result::{FailedOperation, SkipReason, SkippedPath};
use crate::shared::{SharedIndexWriter, SharedUpdate};
use crate::SyncError;

#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub applied: Vec<Operation>,
    pub failed: Vec<FailedOperation>,
    pub cancelled: Vec<SkippedPath>,
}

enum Outcome {
    Applied(Operation),
    Failed(FailedOperation),
    Cancelled(Operation),
}

impl Outcome {
    fn path(&self) -> &SyncPath {
        match self {
            Outcome::Applied(op) | Outcome::Cancelled(op) => &op.path,
            Outcome::Failed(failed) => &failed.operation.path,
        }
    }
}

fn transfer_error(op: &Operation, source: anyhow::Error) -> SyncError {
    SyncError::Transfer {
        operation: op.kind,
        path: op.path.clone(),
        source,
    }
}

pub struct Executor<'a> {
    backend: &'a dyn IStorageBackend,
    local: &'a dyn ILocalFileSystem,
    state: &'a dyn IStateStore,
    shared: &'a SharedIndexWriter<'a>,
    /// Remote prefix receiving soft-deleted objects for this run
    holding_prefix: SyncPath,
    concurrency: usize,
    cancel: CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(
        backend: &'a dyn IStorageBackend,
        local: &'a dyn ILocalFileSystem,
        state: &'a dyn IStateStore,
        shared: &'a SharedIndexWriter<'a>,
        holding_prefix: SyncPath,
    ) -> Self {
        Self {
            backend,
            local,
            state,
            shared,
            holding_prefix,
            concurrency: 1,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Apply `operations` in plan order
    pub async fn execute(&self, operations: Vec<Operation>) -> ExecutionReport {
        let (deletions, transfers): (Vec<_>, Vec<_>) =
            operations.into_iter().partition(Operation::is_deletion);

        let mut outcomes: Vec<Outcome> = stream::iter(transfers)
            .map(|op| self.run_one(op))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.path().cmp(b.path()));

        for op in deletions {
            outcomes.push(self.run_one(op).await);
        }

        let mut report = ExecutionReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Applied(op) => report.applied.push(op),
                Outcome::Failed(failed) => report.failed.push(failed),
                Outcome::Cancelled(op) => report
                    .cancelled
                    .push(SkippedPath::new(op.path, SkipReason::Cancelled)),
            }
        }
        report
    }

    async fn run_one(&self, op: Operation) -> Outcome {
        if self.cancel.is_cancelled() {
            debug!(op = %op, "cancelled before start");
            return Outcome::Cancelled(op);
        }
        match self.apply(&op).await {
            Ok(()) => {
                info!(op = %op, "applied");
                Outcome::Applied(op)
            }
            Err(err) => {
                let (reason, error) = match &err {
                    SyncError::Transfer { source, .. } => {
                        (ReasonCode::classify(source), format!("{source:#}"))
                    }
                    SyncError::State(source) => (
                        ReasonCode::State,
                        format!("state store write failed: {source:#}"),
                    ),
                    other => (ReasonCode::Other, other.to_string()),
                };
                warn!(op = %op, %reason, %error, "operation failed");
                Outcome::Failed(FailedOperation {
                    operation: op,
                    error,
                    reason,
                })
            }
        }
    }

    /// Fail unless the local file still matches `op.local_expected`
    ///
    /// Size and modification time vouch for unchanged content; anything
    /// else is read back and hashed.
    async fn verify_local(&self, op: &Operation) -> Result<(), SyncError> {
        let current = self
            .local
            .stat(&op.path)
            .await
            .map_err(|e| transfer_error(op, e))?;
        let unchanged = match (&op.local_expected, current) {
            (None, None) => true,
            (Some(expected), Some(stat))
                if stat.size == expected.size && stat.last_modified == expected.last_modified =>
            {
                true
            }
            (Some(expected), Some(_)) => {
                let data = self
                    .local
                    .read_file(&op.path)
                    .await
                    .map_err(|e| transfer_error(op, e))?;
                ContentHash::compute(&data) == expected.content_hash
            }
            (None, Some(_)) | (Some(_), None) => false,
        };
        if unchanged {
            Ok(())
        } else {
            Err(transfer_error(
                op,
                anyhow!("hash mismatch for {}: local file changed since scan", op.path),
            ))
        }
    }

    async fn publish(&self, op: &Operation, update: SharedUpdate) -> Result<(), SyncError> {
        self.shared
            .publish(&update)
            .await
            .map_err(|e| transfer_error(op, e.context("shared history not updated")))
    }

    #[instrument(skip(self), fields(kind = %op.kind, path = %op.path))]
    async fn apply(&self, op: &Operation) -> Result<(), SyncError> {
        let transfer = |source: anyhow::Error| transfer_error(op, source);
        let planned = || {
            op.signature
                .as_ref()
                .ok_or_else(|| transfer(anyhow!("{} planned without a signature", op.kind)))
        };

        if op.touches_local() {
            self.verify_local(op).await?;
        }

        match op.kind {
            OperationKind::Upload => {
                let planned = planned()?;
                let data = self.local.read_file(&op.path).await.map_err(transfer)?;
                let hash = ContentHash::compute(&data);
                if hash != planned.content_hash {
                    return Err(transfer(anyhow!(
                        "hash mismatch for {}: local content changed since scan",
                        op.path
                    )));
                }
                let object = self.backend.put(&op.path, &data).await.map_err(transfer)?;
                let uploaded =
                    FileSignature::new(op.path.clone(), hash, object.size, object.last_modified);
                self.publish(op, SharedUpdate::Written(uploaded.clone())).await?;
                self.state
                    .save_synced(planned, &uploaded)
                    .await
                    .map_err(SyncError::State)?;
                if let Err(e) = self
                    .state
                    .remember_remote_hash(&object, &uploaded.content_hash)
                    .await
                {
                    warn!(path = %op.path, error = %e, "Remote hash not cached, next scan fetches it");
                }
            }
            OperationKind::Download => {
                let planned = planned()?;
                let data = self.backend.get(&op.path).await.map_err(transfer)?;
                let hash = ContentHash::compute(&data);
                if hash != planned.content_hash {
                    return Err(transfer(anyhow!(
                        "hash mismatch for {}: remote content changed since scan",
                        op.path
                    )));
                }
                let stat = self
                    .local
                    .write_file(&op.path, &data)
                    .await
                    .map_err(transfer)?;
                let written = FileSignature::new(op.path.clone(), hash, stat.size, stat.last_modified);
                self.state
                    .save_synced(&written, planned)
                    .await
                    .map_err(SyncError::State)?;
            }
            OperationKind::SoftDeleteRemote => {
                let moved = self
                    .backend
                    .move_to(&op.path, &self.holding_prefix)
                    .await
                    .map_err(transfer)?;
                debug!(to = %moved, "moved to holding area");
                self.retire(op).await?;
            }
            OperationKind::DeleteLocal => {
                self.local.delete_file(&op.path).await.map_err(transfer)?;
                self.retire(op).await?;
            }
            OperationKind::RecordOnly => match &op.signature {
                Some(sig) => {
                    self.publish(op, SharedUpdate::Written(sig.clone())).await?;
                    self.state
                        .save_synced(sig, sig)
                        .await
                        .map_err(SyncError::State)?;
                }
                None => self.retire(op).await?,
            },
        }
        Ok(())
    }

    /// Record that `op.path` is gone from both sides
    async fn retire(&self, op: &Operation) -> Result<(), SyncError> {
        let at = Utc::now();
        self.publish(
            op,
            SharedUpdate::Deleted {
                path: op.path.clone(),
                at,
            },
        )
        .await?;
        self.state
            .mark_deleted_synced(&op.path, at)
            .await
            .map_err(SyncError::State)
    }
}
