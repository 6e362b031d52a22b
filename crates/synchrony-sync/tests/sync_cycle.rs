//! End-to-end synchronization cycles
//!
//! Every test syncs a scratch local tree against a scratch directory acting
//! as the remote prefix, with state in an in-memory SQLite database.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use synchrony_audit::logger::read_log;
use synchrony_audit::{Outcome, ReasonCode};
use synchrony_cache::{DatabasePool, SqliteStateStore};
use synchrony_conflict::{PolicyDecider, PolicyEngine};
use synchrony_core::config::ConflictRuleConfig;
use synchrony_core::domain::{
    ChangeKind, ChangeRecord, ConflictDecision, ContentHash, FileSignature, OperationKind, Side,
    SyncPath,
};
use synchrony_core::ports::{
    IDecisionProvider, IStateStore, IStorageBackend, RemoteObject, SideState,
};
use synchrony_sync::backends::DirectoryBackend;
use synchrony_sync::filesystem::LocalFileSystemAdapter;
use synchrony_sync::{ControlDir, IgnoreFilter, SkipReason, SyncEngine, SyncError, SyncResult};

// ============================================================================
// Test helpers
// ============================================================================

/// Answers every question the same way
struct Fixed {
    conflict: ConflictDecision,
    delete_local: bool,
    delete_remote: bool,
}

impl Fixed {
    fn cautious() -> Self {
        Self {
            conflict: ConflictDecision::Skip,
            delete_local: false,
            delete_remote: false,
        }
    }

    fn approving() -> Self {
        Self {
            conflict: ConflictDecision::Skip,
            delete_local: true,
            delete_remote: true,
        }
    }

    fn winner(conflict: ConflictDecision) -> Self {
        Self {
            conflict,
            ..Self::cautious()
        }
    }
}

impl IDecisionProvider for Fixed {
    fn resolve_conflict(&self, _change: &ChangeRecord) -> ConflictDecision {
        self.conflict
    }

    fn approve_deletions(&self, side: Side, _changes: &[ChangeRecord]) -> bool {
        match side {
            Side::Local => self.delete_local,
            Side::Remote => self.delete_remote,
        }
    }
}

/// Saves an edit to a local file while being asked, then agrees to
/// everything: deletions are approved and conflicts go to the remote
struct EditsWhileAsked {
    file: PathBuf,
}

impl EditsWhileAsked {
    fn edit(&self) {
        std::fs::write(&self.file, "important new work").unwrap();
    }
}

impl IDecisionProvider for EditsWhileAsked {
    fn resolve_conflict(&self, _change: &ChangeRecord) -> ConflictDecision {
        self.edit();
        ConflictDecision::RemoteWins
    }

    fn approve_deletions(&self, _side: Side, _changes: &[ChangeRecord]) -> bool {
        self.edit();
        true
    }
}

struct User {
    local: TempDir,
    engine: SyncEngine,
    store: Arc<SqliteStateStore>,
    _pool: DatabasePool,
}

impl User {
    async fn join(remote: &Path) -> Self {
        Self::named(remote, "tester").await
    }

    async fn named(remote: &Path, name: &str) -> Self {
        let backend = DirectoryBackend::open(remote).await.unwrap();
        Self::with_backend(Arc::new(backend), name).await
    }

    async fn with_backend(backend: Arc<dyn IStorageBackend>, name: &str) -> Self {
        let local = TempDir::new().unwrap();
        let pool = DatabasePool::in_memory().await.unwrap();
        let store = Arc::new(SqliteStateStore::new(pool.pool().clone()));
        let engine = SyncEngine::new(
            backend,
            Arc::new(LocalFileSystemAdapter::new(local.path())),
            store.clone(),
            ControlDir::new(local.path()),
        )
        .with_user_name(name);
        Self {
            local,
            engine,
            store,
            _pool: pool,
        }
    }

    fn root(&self) -> &Path {
        self.local.path()
    }

    async fn sync(&self, decider: &dyn IDecisionProvider) -> SyncResult {
        self.engine.run(decider).await.expect("sync run")
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}

fn backdate(root: &Path, rel: &str, by: Duration) {
    std::fs::File::options()
        .write(true)
        .open(root.join(rel))
        .unwrap()
        .set_modified(SystemTime::now() - by)
        .unwrap();
}

fn shared_index(remote: &Path) -> serde_json::Value {
    serde_json::from_str(&read(remote, ".synchrony/index.json")).unwrap()
}

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn kinds(result: &SyncResult) -> Vec<(OperationKind, String)> {
    result
        .applied
        .iter()
        .map(|op| (op.kind, op.path.to_string()))
        .collect()
}

/// Every file under the holding area, relative to `remote`
fn held(remote: &Path) -> Vec<PathBuf> {
    let area = remote.join(".synchrony/deleted");
    let mut out = Vec::new();
    let Ok(runs) = std::fs::read_dir(&area) else {
        return out;
    };
    for run in runs {
        let run = run.unwrap().path();
        let mut stack = vec![run];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    out.push(path.strip_prefix(remote).unwrap().to_path_buf());
                }
            }
        }
    }
    out
}

// ============================================================================
// Convergence
// ============================================================================

#[tokio::test]
async fn test_first_sync_exchanges_both_sides() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "docs/local.txt", "from local");
    write(remote.path(), "remote.txt", "from remote");

    let result = user.sync(&Fixed::cautious()).await;
    assert!(result.is_clean(), "{result:?}");
    assert_eq!(
        kinds(&result),
        vec![
            (OperationKind::Upload, "docs/local.txt".to_string()),
            (OperationKind::Download, "remote.txt".to_string()),
        ]
    );
    assert_eq!(read(remote.path(), "docs/local.txt"), "from local");
    assert_eq!(read(user.root(), "remote.txt"), "from remote");
    assert_eq!(result.log_path, None);
}

#[tokio::test]
async fn test_upload_records_both_sides() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "a.txt", "v1");
    user.sync(&Fixed::cautious()).await;

    let h1 = ContentHash::compute(b"v1");
    for side in [Side::Local, Side::Remote] {
        let state = user.store.load(side).await.unwrap();
        let recorded = &state.recorded[&SyncPath::new("a.txt").unwrap()];
        assert_eq!(recorded.content_hash, h1, "{side}");
        assert_eq!(recorded.size, 2);
    }
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "a.txt", "a");
    write(remote.path(), "b.txt", "b");
    user.sync(&Fixed::cautious()).await;

    let again = user.sync(&Fixed::cautious()).await;
    assert!(again.applied.is_empty());
    assert!(again.is_clean());

    let plan = user.engine.preview(&Fixed::cautious()).await.unwrap();
    assert!(plan.changes.is_empty());
    assert!(plan.operations.is_empty());
}

#[tokio::test]
async fn test_identical_content_converges_without_transfer() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "same.txt", "identical");
    write(remote.path(), "same.txt", "identical");

    let result = user.sync(&Fixed::cautious()).await;
    assert_eq!(
        kinds(&result),
        vec![(OperationKind::RecordOnly, "same.txt".to_string())]
    );
}

#[tokio::test]
async fn test_modifications_flow_both_ways() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "l.txt", "v1");
    write(user.root(), "r.txt", "v1");
    user.sync(&Fixed::cautious()).await;

    write(user.root(), "l.txt", "local version 2");
    write(remote.path(), "r.txt", "remote version 2");
    let result = user.sync(&Fixed::cautious()).await;

    assert_eq!(
        kinds(&result),
        vec![
            (OperationKind::Upload, "l.txt".to_string()),
            (OperationKind::Download, "r.txt".to_string()),
        ]
    );
    assert_eq!(read(remote.path(), "l.txt"), "local version 2");
    assert_eq!(read(user.root(), "r.txt"), "remote version 2");
}

#[tokio::test]
async fn test_two_users_converge_through_the_remote() {
    let remote = TempDir::new().unwrap();
    let alice = User::join(remote.path()).await;
    let bob = User::join(remote.path()).await;

    write(alice.root(), "shared/plan.md", "draft");
    alice.sync(&Fixed::cautious()).await;
    bob.sync(&Fixed::cautious()).await;
    assert_eq!(read(bob.root(), "shared/plan.md"), "draft");

    write(bob.root(), "shared/plan.md", "reviewed draft");
    bob.sync(&Fixed::cautious()).await;
    let result = alice.sync(&Fixed::cautious()).await;
    assert_eq!(
        kinds(&result),
        vec![(OperationKind::Download, "shared/plan.md".to_string())]
    );
    assert_eq!(read(alice.root(), "shared/plan.md"), "reviewed draft");
}

// ============================================================================
// Remote control record
// ============================================================================

#[tokio::test]
async fn test_remote_prefix_initialized_once() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;

    assert!(user.engine.ensure_remote_initialized().await.unwrap());
    assert!(!user.engine.ensure_remote_initialized().await.unwrap());

    let record: serde_json::Value =
        serde_json::from_str(&read(remote.path(), ".synchrony/prefix.json")).unwrap();
    assert_eq!(record["initialized_by"], "tester");
    assert_eq!(record["format"], 1);
}

#[tokio::test]
async fn test_control_records_are_never_synchronized() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    user.sync(&Fixed::cautious()).await;

    assert!(!user.root().join(".synchrony/prefix.json").exists());
    assert!(!remote.path().join(".synchrony/state.db").exists());
}

// ============================================================================
// Deletions
// ============================================================================

#[tokio::test]
async fn test_local_delete_waits_for_confirmation() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "a.txt", "keep me");
    user.sync(&Fixed::cautious()).await;

    std::fs::remove_file(user.root().join("a.txt")).unwrap();
    let result = user.sync(&Fixed::cautious()).await;

    assert!(result.applied.is_empty());
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].reason, SkipReason::AwaitingConfirmation);
    assert_eq!(read(remote.path(), "a.txt"), "keep me");
    assert!(!user.root().join("a.txt").exists());

    let log = result.log_path.expect("skips are logged");
    let entries = read_log(&log).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].outcome, Outcome::Skipped);
    assert_eq!(entries[0].path.as_str(), "a.txt");

    // Still pending next time
    let plan = user.engine.preview(&Fixed::cautious()).await.unwrap();
    assert_eq!(plan.changes.len(), 1);
    assert_eq!(plan.changes[0].kind, ChangeKind::DeletedLocal);
    assert_eq!(plan.skipped[0].reason, SkipReason::AwaitingConfirmation);
}

#[tokio::test]
async fn test_approved_local_delete_soft_deletes_remote() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "dir/a.txt", "precious");
    user.sync(&Fixed::cautious()).await;

    std::fs::remove_file(user.root().join("dir/a.txt")).unwrap();
    let result = user.sync(&Fixed::approving()).await;
    assert_eq!(
        kinds(&result),
        vec![(OperationKind::SoftDeleteRemote, "dir/a.txt".to_string())]
    );
    assert!(!remote.path().join("dir/a.txt").exists());

    let held = held(remote.path());
    assert_eq!(held.len(), 1);
    assert!(held[0].ends_with("dir/a.txt"));
    assert_eq!(
        std::fs::read_to_string(remote.path().join(&held[0])).unwrap(),
        "precious"
    );

    let again = user.sync(&Fixed::approving()).await;
    assert!(again.applied.is_empty());
    assert!(!user.root().join("dir/a.txt").exists());
}

#[tokio::test]
async fn test_approved_remote_delete_removes_local() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "old/report.txt", "r");
    user.sync(&Fixed::cautious()).await;

    std::fs::remove_file(remote.path().join("old/report.txt")).unwrap();
    let result = user.sync(&Fixed::approving()).await;
    assert_eq!(
        kinds(&result),
        vec![(OperationKind::DeleteLocal, "old/report.txt".to_string())]
    );
    assert!(!user.root().join("old").exists());
}

#[tokio::test]
async fn test_deletion_recorded_when_both_sides_gone() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "gone.txt", "g");
    user.sync(&Fixed::cautious()).await;

    std::fs::remove_file(user.root().join("gone.txt")).unwrap();
    std::fs::remove_file(remote.path().join("gone.txt")).unwrap();
    let result = user.sync(&Fixed::cautious()).await;
    assert_eq!(
        kinds(&result),
        vec![(OperationKind::RecordOnly, "gone.txt".to_string())]
    );
    assert!(result.is_clean());
}

#[tokio::test]
async fn test_rename_uploads_before_retiring_old_path() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "a_old.txt", "content");
    user.sync(&Fixed::cautious()).await;

    std::fs::rename(user.root().join("a_old.txt"), user.root().join("z_new.txt")).unwrap();
    let result = user.sync(&Fixed::approving()).await;
    assert_eq!(
        kinds(&result),
        vec![
            (OperationKind::Upload, "z_new.txt".to_string()),
            (OperationKind::SoftDeleteRemote, "a_old.txt".to_string()),
        ]
    );
}

// ============================================================================
// Shared history
// ============================================================================

#[tokio::test]
async fn test_stale_copy_of_a_deleted_file_is_not_resurrected() {
    let remote = TempDir::new().unwrap();
    let alice = User::named(remote.path(), "alice").await;
    write(alice.root(), "a.txt", "draft");
    alice.sync(&Fixed::cautious()).await;
    std::fs::remove_file(alice.root().join("a.txt")).unwrap();
    alice.sync(&Fixed::approving()).await;
    assert!(!remote.path().join("a.txt").exists());

    // Carol has never synced and still holds yesterday's copy
    let carol = User::named(remote.path(), "carol").await;
    write(carol.root(), "a.txt", "draft");
    backdate(carol.root(), "a.txt", DAY);

    let result = carol.sync(&Fixed::cautious()).await;
    assert!(result.applied.is_empty());
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].reason, SkipReason::AwaitingConfirmation);
    assert!(!remote.path().join("a.txt").exists());

    let plan = carol.engine.preview(&Fixed::cautious()).await.unwrap();
    assert_eq!(plan.changes[0].kind, ChangeKind::DeletedRemote);
    assert_eq!(plan.changes[0].remote_editor.as_deref(), Some("alice"));

    let result = carol.sync(&Fixed::approving()).await;
    assert_eq!(
        kinds(&result),
        vec![(OperationKind::DeleteLocal, "a.txt".to_string())]
    );
    assert!(!carol.root().join("a.txt").exists());
    assert!(!remote.path().join("a.txt").exists());
    assert_eq!(shared_index(remote.path())["tombstones"]["a.txt"]["deleted_by"], "alice");
}

#[tokio::test]
async fn test_copy_edited_after_the_deletion_is_uploaded() {
    let remote = TempDir::new().unwrap();
    let alice = User::named(remote.path(), "alice").await;
    write(alice.root(), "a.txt", "draft");
    alice.sync(&Fixed::cautious()).await;
    std::fs::remove_file(alice.root().join("a.txt")).unwrap();
    alice.sync(&Fixed::approving()).await;

    let carol = User::named(remote.path(), "carol").await;
    std::thread::sleep(Duration::from_millis(20));
    write(carol.root(), "a.txt", "brand new");

    let result = carol.sync(&Fixed::cautious()).await;
    assert_eq!(kinds(&result), vec![(OperationKind::Upload, "a.txt".to_string())]);
    let index = shared_index(remote.path());
    assert_eq!(index["records"]["a.txt"]["edited_by"], "carol");
    assert!(index["tombstones"].get("a.txt").is_none());
}

#[tokio::test]
async fn test_changes_name_their_last_editor() {
    let remote = TempDir::new().unwrap();
    let alice = User::named(remote.path(), "alice").await;
    let bob = User::named(remote.path(), "bob").await;
    write(alice.root(), "plan.md", "draft");
    alice.sync(&Fixed::cautious()).await;
    assert_eq!(shared_index(remote.path())["records"]["plan.md"]["edited_by"], "alice");

    let plan = bob.engine.preview(&Fixed::cautious()).await.unwrap();
    assert_eq!(plan.changes[0].kind, ChangeKind::CreatedRemote);
    assert_eq!(plan.changes[0].remote_editor.as_deref(), Some("alice"));

    bob.sync(&Fixed::cautious()).await;
    write(bob.root(), "plan.md", "reviewed draft");
    bob.sync(&Fixed::cautious()).await;

    let plan = alice.engine.preview(&Fixed::cautious()).await.unwrap();
    assert_eq!(plan.changes[0].kind, ChangeKind::ModifiedRemote);
    assert_eq!(plan.changes[0].remote_editor.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_downloading_keeps_the_original_author() {
    let remote = TempDir::new().unwrap();
    let alice = User::named(remote.path(), "alice").await;
    let bob = User::named(remote.path(), "bob").await;
    write(alice.root(), "a.txt", "a");
    alice.sync(&Fixed::cautious()).await;
    let result = bob.sync(&Fixed::cautious()).await;
    assert_eq!(kinds(&result), vec![(OperationKind::Download, "a.txt".to_string())]);
    assert_eq!(shared_index(remote.path())["records"]["a.txt"]["edited_by"], "alice");

    let carol = User::named(remote.path(), "carol").await;
    write(carol.root(), "a.txt", "a");
    let result = carol.sync(&Fixed::cautious()).await;
    assert_eq!(
        kinds(&result),
        vec![(OperationKind::RecordOnly, "a.txt".to_string())]
    );
    assert_eq!(shared_index(remote.path())["records"]["a.txt"]["edited_by"], "alice");
}

// ============================================================================
// Local edits made while deciding
// ============================================================================

#[tokio::test]
async fn test_local_delete_spares_a_file_edited_meanwhile() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "a.txt", "v1");
    user.sync(&Fixed::cautious()).await;
    std::fs::remove_file(remote.path().join("a.txt")).unwrap();

    let decider = EditsWhileAsked {
        file: user.root().join("a.txt"),
    };
    let result = user.sync(&decider).await;
    assert!(result.applied.is_empty());
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].operation.kind, OperationKind::DeleteLocal);
    assert_eq!(result.failed[0].reason, ReasonCode::HashMismatch);
    assert_eq!(read(user.root(), "a.txt"), "important new work");

    // The edit is now a local change against a remote deletion
    let plan = user.engine.preview(&Fixed::cautious()).await.unwrap();
    assert_eq!(plan.changes[0].kind, ChangeKind::Conflict);
}

#[tokio::test]
async fn test_download_spares_a_file_edited_meanwhile() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "a.txt", "v1");
    write(user.root(), "c.txt", "base");
    user.sync(&Fixed::cautious()).await;

    write(remote.path(), "a.txt", "remote v2");
    write(user.root(), "c.txt", "local edit");
    write(remote.path(), "c.txt", "a longer remote edit");

    let decider = EditsWhileAsked {
        file: user.root().join("a.txt"),
    };
    let result = user.sync(&decider).await;
    assert_eq!(kinds(&result), vec![(OperationKind::Download, "c.txt".to_string())]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].operation.path.as_str(), "a.txt");
    assert_eq!(result.failed[0].reason, ReasonCode::HashMismatch);
    assert_eq!(read(user.root(), "a.txt"), "important new work");
    assert_eq!(read(user.root(), "c.txt"), "a longer remote edit");
    assert_eq!(read(remote.path(), "a.txt"), "remote v2");

    let entries = read_log(result.log_path.as_ref().unwrap()).await.unwrap();
    assert!(entries
        .iter()
        .any(|e| e.outcome == Outcome::Failed && e.path.as_str() == "a.txt"));
}

// ============================================================================
// Conflicts
// ============================================================================

async fn conflicted(remote: &Path) -> User {
    let user = User::join(remote).await;
    write(user.root(), "c.txt", "base");
    user.sync(&Fixed::cautious()).await;
    write(user.root(), "c.txt", "local edit");
    write(remote, "c.txt", "a longer remote edit");
    user
}

#[tokio::test]
async fn test_unresolved_conflict_leaves_both_sides() {
    let remote = TempDir::new().unwrap();
    let user = conflicted(remote.path()).await;

    let result = user.sync(&Fixed::cautious()).await;
    assert!(result.applied.is_empty());
    assert_eq!(result.skipped[0].reason, SkipReason::ConflictUnresolved);
    assert_eq!(read(user.root(), "c.txt"), "local edit");
    assert_eq!(read(remote.path(), "c.txt"), "a longer remote edit");

    // Still a conflict next time
    let plan = user.engine.preview(&Fixed::cautious()).await.unwrap();
    assert_eq!(plan.skipped[0].reason, SkipReason::ConflictUnresolved);
}

#[tokio::test]
async fn test_conflict_local_wins() {
    let remote = TempDir::new().unwrap();
    let user = conflicted(remote.path()).await;

    let result = user.sync(&Fixed::winner(ConflictDecision::LocalWins)).await;
    assert_eq!(kinds(&result), vec![(OperationKind::Upload, "c.txt".to_string())]);
    assert_eq!(read(remote.path(), "c.txt"), "local edit");
}

#[tokio::test]
async fn test_conflict_remote_wins() {
    let remote = TempDir::new().unwrap();
    let user = conflicted(remote.path()).await;

    let result = user.sync(&Fixed::winner(ConflictDecision::RemoteWins)).await;
    assert_eq!(kinds(&result), vec![(OperationKind::Download, "c.txt".to_string())]);
    assert_eq!(read(user.root(), "c.txt"), "a longer remote edit");
}

#[tokio::test]
async fn test_policy_rule_resolves_conflict() {
    let remote = TempDir::new().unwrap();
    let user = conflicted(remote.path()).await;
    let rules = vec![ConflictRuleConfig {
        pattern: "*.txt".into(),
        strategy: "keep_remote".into(),
    }];
    let decider = PolicyDecider::new(PolicyEngine::new("manual", &rules), false, false);

    let result = user.sync(&decider).await;
    assert_eq!(kinds(&result), vec![(OperationKind::Download, "c.txt".to_string())]);
}

// ============================================================================
// Dry run, ignore, reset, cancellation
// ============================================================================

#[tokio::test]
async fn test_preview_changes_nothing() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "a.txt", "a");

    let plan = user.engine.preview(&Fixed::approving()).await.unwrap();
    assert_eq!(plan.operations.len(), 1);
    assert_eq!(plan.operations[0].kind, OperationKind::Upload);
    assert!(!remote.path().join("a.txt").exists());
    assert!(!remote.path().join(".synchrony/prefix.json").exists());

    let again = user.engine.preview(&Fixed::approving()).await.unwrap();
    assert_eq!(again.operations, plan.operations);
}

#[tokio::test]
async fn test_ignored_paths_stay_put() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    let pool = DatabasePool::in_memory().await.unwrap();
    let engine = SyncEngine::new(
        Arc::new(DirectoryBackend::open(remote.path()).await.unwrap()),
        Arc::new(LocalFileSystemAdapter::new(local.path())),
        Arc::new(SqliteStateStore::new(pool.pool().clone())),
        ControlDir::new(local.path()),
    )
    .with_ignore(IgnoreFilter::parse("*.tmp\nbuild/"));

    write(local.path(), "keep.txt", "k");
    write(local.path(), "scratch.tmp", "t");
    write(local.path(), "build/out.bin", "o");
    write(remote.path(), "remote.tmp", "r");

    let result = engine.run(&Fixed::cautious()).await.unwrap();
    assert_eq!(kinds(&result), vec![(OperationKind::Upload, "keep.txt".to_string())]);
    assert!(!remote.path().join("scratch.tmp").exists());
    assert!(!local.path().join("remote.tmp").exists());
}

#[tokio::test]
async fn test_reset_requires_confirmation_and_reconverges() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "a.txt", "a");
    user.sync(&Fixed::cautious()).await;

    assert!(matches!(
        user.engine.reset(false).await,
        Err(SyncError::ResetNotConfirmed)
    ));
    assert!(remote.path().join(".synchrony/prefix.json").exists());

    user.engine.reset(true).await.unwrap();
    assert!(!remote.path().join(".synchrony/prefix.json").exists());

    let result = user.sync(&Fixed::cautious()).await;
    assert_eq!(
        kinds(&result),
        vec![(OperationKind::RecordOnly, "a.txt".to_string())]
    );
}

#[tokio::test]
async fn test_reset_keeps_holding_area() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "a.txt", "a");
    user.sync(&Fixed::cautious()).await;
    std::fs::remove_file(user.root().join("a.txt")).unwrap();
    user.sync(&Fixed::approving()).await;
    assert_eq!(held(remote.path()).len(), 1);

    user.engine.reset(true).await.unwrap();
    assert_eq!(held(remote.path()).len(), 1);
}

#[tokio::test]
async fn test_cancelled_run_starts_nothing() {
    let remote = TempDir::new().unwrap();
    let user = User::join(remote.path()).await;
    write(user.root(), "a.txt", "a");
    write(user.root(), "b.txt", "b");

    user.engine.cancellation_token().cancel();
    let result = user.sync(&Fixed::cautious()).await;
    assert!(result.applied.is_empty());
    assert_eq!(result.skipped.len(), 2);
    assert!(result
        .skipped
        .iter()
        .all(|s| s.reason == SkipReason::Cancelled));
    assert!(!remote.path().join("a.txt").exists());
}

// ============================================================================
// Failure isolation
// ============================================================================

/// Directory backend that refuses to store one path
struct Flaky {
    inner: DirectoryBackend,
    refuse: &'static str,
}

#[async_trait::async_trait]
impl IStorageBackend for Flaky {
    fn platform(&self) -> &'static str {
        "flaky"
    }

    fn location(&self) -> String {
        self.inner.location()
    }

    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<RemoteObject>> {
        self.inner.list(prefix).await
    }

    async fn get(&self, path: &SyncPath) -> anyhow::Result<Vec<u8>> {
        self.inner.get(path).await
    }

    async fn put(&self, path: &SyncPath, data: &[u8]) -> anyhow::Result<RemoteObject> {
        if path.as_str() == self.refuse {
            anyhow::bail!("dispatch failure: connection reset by peer");
        }
        self.inner.put(path, data).await
    }

    async fn move_to(&self, path: &SyncPath, target: &SyncPath) -> anyhow::Result<SyncPath> {
        self.inner.move_to(path, target).await
    }

    async fn exists(&self, path: &SyncPath) -> anyhow::Result<bool> {
        self.inner.exists(path).await
    }

    async fn remove(&self, path: &SyncPath) -> anyhow::Result<()> {
        self.inner.remove(path).await
    }
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_run() {
    let remote = TempDir::new().unwrap();
    let flaky = Flaky {
        inner: DirectoryBackend::open(remote.path()).await.unwrap(),
        refuse: "bad.txt",
    };
    let user = User::with_backend(Arc::new(flaky), "tester").await;
    write(user.root(), "bad.txt", "b");
    write(user.root(), "good.txt", "g");

    let result = user.sync(&Fixed::cautious()).await;
    assert_eq!(kinds(&result), vec![(OperationKind::Upload, "good.txt".to_string())]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].operation.path.as_str(), "bad.txt");
    assert_eq!(result.failed[0].reason, ReasonCode::Network);

    let entries = read_log(result.log_path.as_ref().unwrap()).await.unwrap();
    assert_eq!(entries[0].outcome, Outcome::Failed);
    assert_eq!(entries[0].operation.as_deref(), Some("upload"));

    // Nothing was recorded for the failed path, so it is retried
    let plan = user.engine.preview(&Fixed::cautious()).await.unwrap();
    assert_eq!(plan.operations.len(), 1);
    assert_eq!(plan.operations[0].path.as_str(), "bad.txt");
}

#[tokio::test]
async fn test_failed_publication_leaves_the_path_pending() {
    let remote = TempDir::new().unwrap();
    let flaky = Flaky {
        inner: DirectoryBackend::open(remote.path()).await.unwrap(),
        refuse: ".synchrony/index.json",
    };
    let user = User::with_backend(Arc::new(flaky), "tester").await;
    write(user.root(), "a.txt", "a");

    let result = user.sync(&Fixed::cautious()).await;
    assert!(result.applied.is_empty());
    assert_eq!(result.failed.len(), 1);
    assert!(result.failed[0].error.contains("shared history not updated"));
    assert_eq!(read(remote.path(), "a.txt"), "a");

    // Private state was left alone, so the path comes back as a record
    let plan = user.engine.preview(&Fixed::cautious()).await.unwrap();
    assert_eq!(plan.operations.len(), 1);
    assert_eq!(plan.operations[0].kind, OperationKind::RecordOnly);
    let state = user.store.load(Side::Remote).await.unwrap();
    assert!(state.recorded.is_empty());
}

/// State store whose remote hash cache cannot be written
struct NoHashCache {
    inner: SqliteStateStore,
}

#[async_trait::async_trait]
impl IStateStore for NoHashCache {
    async fn load(&self, side: Side) -> anyhow::Result<SideState> {
        self.inner.load(side).await
    }

    async fn save(&self, side: Side, signature: &FileSignature) -> anyhow::Result<()> {
        self.inner.save(side, signature).await
    }

    async fn mark_deleted(
        &self,
        side: Side,
        path: &SyncPath,
        deleted_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.inner.mark_deleted(side, path, deleted_at).await
    }

    async fn save_synced(
        &self,
        local: &FileSignature,
        remote: &FileSignature,
    ) -> anyhow::Result<()> {
        self.inner.save_synced(local, remote).await
    }

    async fn mark_deleted_synced(
        &self,
        path: &SyncPath,
        deleted_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        self.inner.mark_deleted_synced(path, deleted_at).await
    }

    async fn cached_remote_hash(
        &self,
        object: &RemoteObject,
    ) -> anyhow::Result<Option<ContentHash>> {
        self.inner.cached_remote_hash(object).await
    }

    async fn remember_remote_hash(
        &self,
        _object: &RemoteObject,
        _hash: &ContentHash,
    ) -> anyhow::Result<()> {
        anyhow::bail!("database is locked")
    }

    async fn reset(&self) -> anyhow::Result<()> {
        self.inner.reset().await
    }
}

#[tokio::test]
async fn test_upload_survives_an_unwritable_hash_cache() {
    let remote = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    let pool = DatabasePool::in_memory().await.unwrap();
    let engine = SyncEngine::new(
        Arc::new(DirectoryBackend::open(remote.path()).await.unwrap()),
        Arc::new(LocalFileSystemAdapter::new(local.path())),
        Arc::new(NoHashCache {
            inner: SqliteStateStore::new(pool.pool().clone()),
        }),
        ControlDir::new(local.path()),
    );
    write(local.path(), "a.txt", "a");

    let result = engine.run(&Fixed::cautious()).await.unwrap();
    assert!(result.is_clean(), "{result:?}");
    assert_eq!(kinds(&result), vec![(OperationKind::Upload, "a.txt".to_string())]);

    // Without a cached hash the remote is fetched to compare, and agrees
    let plan = engine.preview(&Fixed::cautious()).await.unwrap();
    assert!(plan.changes.is_empty());
}
