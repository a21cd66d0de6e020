//! One-way mirror engine
//!
//! The [`SyncEngine`] runs a single synchronization cycle from the source
//! tree onto the replica tree.
//!
//! ## Cycle Flow
//!
//! 1. **Scan**: Inventory both roots (a missing replica root is recreated)
//! 2. **Fingerprint**: Hash the file pairs the comparison policy cannot
//!    decide from metadata alone; a replica file whose content matches gets
//!    the source mtime back so later cycles skip the hash
//! 3. **Reconcile**: Compute the ordered operation list
//! 4. **Apply**: Execute every operation, logging each outcome
//! 5. **Summarize**: Log the cycle summary
//!
//! A failed operation is logged and skipped; the next cycle recomputes the
//! full diff, so there is no retry inside a cycle. Only a log sink failure
//! escapes `run_cycle` as an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use foldersync_audit::{AuditLogger, ReasonCode};
use foldersync_core::domain::{
    CompareMode, ComparisonPolicy, CycleCounts, CycleId, CycleStatus, CycleSummary, EntryKind,
    Inventory, MetadataPolicy, Operation, OperationOutcome, OperationRecord, PathEntry,
    RelativePath,
};
use foldersync_core::ports::{IClock, ILocalFileSystem};
use tracing::{debug, info, warn};

use crate::clock::SystemClock;
use crate::reconciler::reconcile;
use crate::scanner::TreeScanner;
use crate::SyncError;

// ============================================================================
// SyncEngine struct
// ============================================================================

/// One-way synchronization engine
///
/// Holds everything a cycle needs; cycles share no state with each other.
///
/// ## Dependencies
///
/// - `local_filesystem`: Replica mutations and content hashing
/// - `audit`: Operation log
/// - `clock`: Cycle timestamps
pub struct SyncEngine {
    /// Tree to mirror from
    source_root: PathBuf,
    /// Tree to mirror onto
    replica_root: PathBuf,
    scanner: TreeScanner,
    policy: Box<dyn ComparisonPolicy>,
    local_filesystem: Arc<dyn ILocalFileSystem>,
    audit: AuditLogger,
    clock: Arc<dyn IClock>,
}

impl SyncEngine {
    /// Creates a new `SyncEngine` with the default scanner, metadata
    /// comparison and the system clock
    ///
    /// # Arguments
    /// * `source_root` - Directory tree to mirror from
    /// * `replica_root` - Directory tree to mirror onto
    /// * `local_filesystem` - Filesystem operations (ILocalFileSystem)
    /// * `audit` - Operation log writer
    pub fn new(
        source_root: impl Into<PathBuf>,
        replica_root: impl Into<PathBuf>,
        local_filesystem: Arc<dyn ILocalFileSystem>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            replica_root: replica_root.into(),
            scanner: TreeScanner::default(),
            policy: Box::new(MetadataPolicy),
            local_filesystem,
            audit,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the tree scanner (case and symlink handling)
    pub fn with_scanner(mut self, scanner: TreeScanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Selects the content comparison policy
    pub fn with_compare_mode(mut self, mode: CompareMode) -> Self {
        self.policy = mode.policy();
        self
    }

    /// Replaces the clock used for cycle timestamps
    pub fn with_clock(mut self, clock: Arc<dyn IClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn replica_root(&self) -> &Path {
        &self.replica_root
    }

    // ========================================================================
    // Cycle
    // ========================================================================

    /// Runs one full synchronization cycle
    ///
    /// # Returns
    /// The [`CycleSummary`], also when the cycle aborted because the source
    /// could not be scanned
    ///
    /// # Errors
    /// Returns [`SyncError::LogSink`] if the operation log cannot be
    /// written. The replica may have been partially updated at that point.
    #[tracing::instrument(skip(self), fields(
        source = %self.source_root.display(),
        replica = %self.replica_root.display()
    ))]
    pub async fn run_cycle(&self) -> Result<CycleSummary, SyncError> {
        let cycle_id = CycleId::new();
        let started_at = self.clock.now();
        self.audit.log_cycle_start(cycle_id, started_at)?;

        let mut source = match self.scanner.scan(&self.source_root).await {
            Ok(inventory) => inventory,
            Err(err) => {
                return self.abort(cycle_id, started_at, format!("source unavailable: {err}"));
            }
        };
        let mut replica = match self.scan_replica().await {
            Ok(inventory) => inventory,
            Err(reason) => return self.abort(cycle_id, started_at, reason),
        };

        self.fingerprint(&mut source, &mut replica).await;

        let operations = reconcile(&source, &replica, self.policy.as_ref());
        info!(
            source_entries = source.len(),
            replica_entries = replica.len(),
            operations = operations.len(),
            "Reconciliation complete"
        );

        let mut counts = CycleCounts::default();
        for operation in &operations {
            let outcome = self.apply(operation, &source).await;
            counts.record(operation.kind(), &outcome);
            let record = OperationRecord::new(self.clock.now(), cycle_id, operation, outcome);
            self.audit.log_operation(&record)?;
        }

        let summary = CycleSummary {
            cycle_id,
            started_at,
            completed_at: self.clock.now(),
            status: CycleStatus::Completed,
            counts,
        };
        self.audit.log_cycle_summary(&summary)?;
        Ok(summary)
    }

    /// Logs and returns an aborted summary
    fn abort(
        &self,
        cycle_id: CycleId,
        started_at: DateTime<Utc>,
        reason: String,
    ) -> Result<CycleSummary, SyncError> {
        let summary = CycleSummary {
            cycle_id,
            started_at,
            completed_at: self.clock.now(),
            status: CycleStatus::Aborted { reason },
            counts: CycleCounts::default(),
        };
        self.audit.log_cycle_summary(&summary)?;
        Ok(summary)
    }

    /// Scans the replica, recreating its root when it cannot be scanned
    ///
    /// An unscannable replica is treated as empty. Returns the abort reason
    /// if the root cannot be recreated either.
    async fn scan_replica(&self) -> Result<Inventory, String> {
        match self.scanner.scan_replica(&self.replica_root).await {
            Ok(inventory) => Ok(inventory),
            Err(err) => {
                warn!(error = %err, "Replica root unavailable, treating it as empty");
                self.local_filesystem
                    .create_directory(&self.replica_root)
                    .await
                    .map_err(|e| format!("replica unavailable: {err}; recreating it failed: {e:#}"))?;
                info!("Replica root recreated");
                Ok(Inventory::new(self.scanner.case()))
            }
        }
    }

    // ========================================================================
    // Fingerprinting
    // ========================================================================

    /// Attaches content hashes to every file pair the policy asks for
    ///
    /// A hashing failure leaves the hash absent, which the policy treats
    /// as modified. When both hashes match but the mtimes differ, the source
    /// mtime is stamped onto the replica file.
    async fn fingerprint(&self, source: &mut Inventory, replica: &mut Inventory) {
        let pairs: Vec<(RelativePath, RelativePath, bool)> = source
            .entries()
            .filter_map(|src| {
                let rep = replica.get(src.relative_path())?;
                (src.is_file() && rep.is_file() && self.policy.needs_fingerprint(src, rep)).then(
                    || {
                        (
                            src.relative_path().clone(),
                            rep.relative_path().clone(),
                            src.modified() != rep.modified(),
                        )
                    },
                )
            })
            .collect();

        if pairs.is_empty() {
            return;
        }
        debug!(pairs = pairs.len(), "Fingerprinting ambiguous file pairs");

        for (src_path, rep_path, mtime_differs) in pairs {
            let src_hash = match self
                .local_filesystem
                .compute_hash(&src_path.to_native(&self.source_root))
                .await
            {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(path = %src_path, error = %format!("{e:#}"), "Could not hash source file");
                    continue;
                }
            };
            source.attach_hash(&src_path, src_hash.clone());

            let replica_file = rep_path.to_native(&self.replica_root);
            let rep_hash = match self.local_filesystem.compute_hash(&replica_file).await {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(path = %rep_path, error = %format!("{e:#}"), "Could not hash replica file");
                    continue;
                }
            };
            let same_content = rep_hash == src_hash;
            replica.attach_hash(&rep_path, rep_hash);

            if same_content && mtime_differs {
                self.restamp(&src_path, &replica_file, source).await;
            }
        }
    }

    /// Copies the source mtime onto a replica file with identical content
    async fn restamp(&self, path: &RelativePath, replica_file: &Path, source: &Inventory) {
        let Some(modified) = source.get(path).map(PathEntry::modified) else {
            return;
        };
        match self.local_filesystem.set_modified(replica_file, modified).await {
            Ok(()) => debug!(path = %path, "Restamped replica mtime"),
            Err(e) => {
                warn!(path = %path, error = %format!("{e:#}"), "Could not restamp replica mtime");
            }
        }
    }

    // ========================================================================
    // Apply
    // ========================================================================

    /// Executes one operation and converts the result into an outcome
    async fn apply(&self, operation: &Operation, source: &Inventory) -> OperationOutcome {
        match self.execute(operation, source).await {
            Ok(()) => OperationOutcome::success(),
            Err(err) => {
                OperationOutcome::failed(ReasonCode::classify(&err).as_str(), format!("{err:#}"))
            }
        }
    }

    async fn execute(&self, operation: &Operation, source: &Inventory) -> anyhow::Result<()> {
        match operation {
            Operation::Create(path, EntryKind::Directory) => {
                let target = path.to_native(&self.replica_root);
                self.local_filesystem.create_directory(&target).await?;
                if let Err(e) = self
                    .local_filesystem
                    .copy_permissions(&path.to_native(&self.source_root), &target)
                    .await
                {
                    warn!(path = %path, error = %format!("{e:#}"), "Could not copy directory permissions");
                }
            }
            Operation::Update(path, EntryKind::Directory) => {
                self.local_filesystem
                    .copy_permissions(
                        &path.to_native(&self.source_root),
                        &path.to_native(&self.replica_root),
                    )
                    .await?;
            }
            Operation::Create(path, EntryKind::File) | Operation::Update(path, EntryKind::File) => {
                let modified = source
                    .get(path)
                    .map(PathEntry::modified)
                    .ok_or_else(|| anyhow!("{path} is not in the source inventory"))?;
                self.local_filesystem
                    .copy_file(
                        &path.to_native(&self.source_root),
                        &path.to_native(&self.replica_root),
                        modified,
                    )
                    .await?;
            }
            Operation::Delete(path, EntryKind::File | EntryKind::Symlink) => {
                self.local_filesystem
                    .remove_file(&path.to_native(&self.replica_root))
                    .await?;
            }
            Operation::Delete(path, EntryKind::Directory) => {
                self.local_filesystem
                    .remove_directory(&path.to_native(&self.replica_root))
                    .await?;
            }
            Operation::Create(path, EntryKind::Symlink)
            | Operation::Update(path, EntryKind::Symlink) => {
                return Err(anyhow!("{path}: links are never written to the replica"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::DateTime;
    use filetime::FileTime;
    use foldersync_audit::MemoryLogSink;
    use foldersync_core::domain::{ContentHash, PathCase, RecordFormat, SymlinkPolicy};
    use tempfile::TempDir;

    use super::*;
    use crate::filesystem::LocalFileSystemAdapter;

    /// Wraps the real adapter, failing chosen paths and counting hashes
    #[derive(Default)]
    struct TestFs {
        inner: LocalFileSystemAdapter,
        fail_name: Option<&'static str>,
        hashes: AtomicUsize,
    }

    impl TestFs {
        fn failing(name: &'static str) -> Self {
            Self {
                fail_name: Some(name),
                ..Self::default()
            }
        }

        fn check(&self, path: &Path) -> anyhow::Result<()> {
            if self.fail_name.is_some_and(|n| path.ends_with(n)) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "Permission denied",
                )
                .into());
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl ILocalFileSystem for TestFs {
        async fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> anyhow::Result<()> {
            self.check(path)?;
            self.inner.set_modified(path, modified).await
        }

        async fn copy_file(
            &self,
            source: &Path,
            target: &Path,
            modified: DateTime<Utc>,
        ) -> anyhow::Result<u64> {
            self.check(target)?;
            self.inner.copy_file(source, target, modified).await
        }

        async fn create_directory(&self, path: &Path) -> anyhow::Result<()> {
            self.check(path)?;
            self.inner.create_directory(path).await
        }

        async fn copy_permissions(&self, source: &Path, target: &Path) -> anyhow::Result<()> {
            self.inner.copy_permissions(source, target).await
        }

        async fn remove_file(&self, path: &Path) -> anyhow::Result<()> {
            self.check(path)?;
            self.inner.remove_file(path).await
        }

        async fn remove_directory(&self, path: &Path) -> anyhow::Result<()> {
            self.check(path)?;
            self.inner.remove_directory(path).await
        }

        async fn compute_hash(&self, path: &Path) -> anyhow::Result<ContentHash> {
            self.hashes.fetch_add(1, Ordering::SeqCst);
            self.inner.compute_hash(path).await
        }
    }

    struct Fixture {
        _dir: TempDir,
        source: PathBuf,
        replica: PathBuf,
        sink: Arc<MemoryLogSink>,
        fs: Arc<TestFs>,
        engine: SyncEngine,
    }

    fn fixture_with(fs: TestFs, mode: CompareMode) -> Fixture {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        let replica = dir.path().join("replica");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&replica).unwrap();

        let sink = Arc::new(MemoryLogSink::new());
        let fs = Arc::new(fs);
        let engine = SyncEngine::new(
            &source,
            &replica,
            fs.clone(),
            AuditLogger::new(sink.clone(), RecordFormat::Text),
        )
        .with_scanner(TreeScanner::new(PathCase::Sensitive, SymlinkPolicy::Follow))
        .with_compare_mode(mode);

        Fixture {
            _dir: dir,
            source,
            replica,
            sink,
            fs,
            engine,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(TestFs::default(), CompareMode::Metadata)
    }

    fn set_mtime(path: &Path, secs: i64) {
        filetime::set_file_mtime(path, FileTime::from_unix_time(secs, 0)).unwrap();
    }

    fn mtime_secs(path: &Path) -> i64 {
        FileTime::from_last_modification_time(&fs::metadata(path).unwrap()).unix_seconds()
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_creates_new_file() {
        let f = fixture();
        fs::write(f.source.join("a.txt"), b"hello").unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.created, 1);
        assert_eq!(fs::read(f.replica.join("a.txt")).unwrap(), b"hello");
        let lines = f.sink.lines();
        assert!(lines[0].contains("started"));
        assert!(lines[1].ends_with("CREATE file a.txt ok"));
        assert!(lines[2].contains("completed successfully"));
    }

    #[tokio::test]
    async fn test_updates_changed_file_and_preserves_mtime() {
        let f = fixture();
        fs::write(f.source.join("a.txt"), b"new content").unwrap();
        set_mtime(&f.source.join("a.txt"), 1_700_000_100);
        fs::write(f.replica.join("a.txt"), b"old").unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.updated, 1);
        assert_eq!(fs::read(f.replica.join("a.txt")).unwrap(), b"new content");
        assert_eq!(mtime_secs(&f.replica.join("a.txt")), 1_700_000_100);
        assert!(f.sink.lines()[1].ends_with("UPDATE file a.txt ok"));
    }

    #[tokio::test]
    async fn test_deletes_replica_only_file() {
        let f = fixture();
        fs::write(f.replica.join("old.txt"), b"stale").unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.deleted, 1);
        assert!(!f.replica.join("old.txt").exists());
        assert!(f.sink.lines()[1].ends_with("DELETE file old.txt ok"));
    }

    #[tokio::test]
    async fn test_creates_directory_before_its_file() {
        let f = fixture();
        fs::create_dir(f.source.join("dir")).unwrap();
        fs::write(f.source.join("dir/file.txt"), b"x").unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.created, 2);
        let lines = f.sink.lines();
        assert!(lines[1].ends_with("CREATE directory dir ok"));
        assert!(lines[2].ends_with("CREATE file dir/file.txt ok"));
        assert!(f.replica.join("dir/file.txt").is_file());
    }

    #[tokio::test]
    async fn test_empty_directories_are_mirrored_and_removed() {
        let f = fixture();
        fs::create_dir_all(f.source.join("empty/nested")).unwrap();
        fs::create_dir_all(f.replica.join("gone/deeper")).unwrap();

        f.engine.run_cycle().await.unwrap();

        assert!(f.replica.join("empty/nested").is_dir());
        assert!(!f.replica.join("gone").exists());
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_second_cycle_is_noop_without_hashing() {
        let f = fixture();
        fs::create_dir(f.source.join("d")).unwrap();
        fs::write(f.source.join("d/a.txt"), b"aaa").unwrap();
        fs::write(f.source.join("b.txt"), b"bbbb").unwrap();

        f.engine.run_cycle().await.unwrap();
        let hashes_after_first = f.fs.hashes.load(Ordering::SeqCst);
        let second = f.engine.run_cycle().await.unwrap();

        assert!(second.is_noop());
        assert_eq!(f.fs.hashes.load(Ordering::SeqCst), hashes_after_first);
        assert!(f
            .sink
            .lines()
            .last()
            .unwrap()
            .contains("no changes were necessary"));
    }

    #[tokio::test]
    async fn test_touched_file_is_hashed_once_then_restamped() {
        let f = fixture();
        fs::write(f.source.join("a.txt"), b"same").unwrap();
        fs::write(f.replica.join("a.txt"), b"same").unwrap();
        set_mtime(&f.source.join("a.txt"), 1_700_000_000);
        set_mtime(&f.replica.join("a.txt"), 1_600_000_000);

        let first = f.engine.run_cycle().await.unwrap();

        assert!(first.is_noop());
        assert_eq!(f.fs.hashes.load(Ordering::SeqCst), 2);
        assert_eq!(mtime_secs(&f.replica.join("a.txt")), 1_700_000_000);

        let second = f.engine.run_cycle().await.unwrap();

        assert!(second.is_noop());
        assert_eq!(f.fs.hashes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_restamp_is_not_an_operation() {
        let f = fixture_with(TestFs::failing("a.txt"), CompareMode::Metadata);
        fs::write(f.source.join("a.txt"), b"same").unwrap();
        fs::write(f.replica.join("a.txt"), b"same").unwrap();
        set_mtime(&f.source.join("a.txt"), 1_700_000_000);
        set_mtime(&f.replica.join("a.txt"), 1_600_000_000);

        let summary = f.engine.run_cycle().await.unwrap();

        assert!(summary.is_noop());
        assert_eq!(mtime_secs(&f.replica.join("a.txt")), 1_600_000_000);
    }

    #[tokio::test]
    async fn test_checksum_mode_restamps_matching_content() {
        let f = fixture_with(TestFs::default(), CompareMode::Checksum);
        fs::write(f.source.join("a.txt"), b"same").unwrap();
        fs::write(f.replica.join("a.txt"), b"same").unwrap();
        set_mtime(&f.source.join("a.txt"), 1_700_000_000);
        set_mtime(&f.replica.join("a.txt"), 1_600_000_000);

        let summary = f.engine.run_cycle().await.unwrap();

        assert!(summary.is_noop());
        assert_eq!(mtime_secs(&f.replica.join("a.txt")), 1_700_000_000);
    }

    #[tokio::test]
    async fn test_checksum_mode_detects_same_size_same_mtime_change() {
        let f = fixture_with(TestFs::default(), CompareMode::Checksum);
        fs::write(f.source.join("a.txt"), b"AAAA").unwrap();
        fs::write(f.replica.join("a.txt"), b"BBBB").unwrap();
        set_mtime(&f.source.join("a.txt"), 1_700_000_000);
        set_mtime(&f.replica.join("a.txt"), 1_700_000_000);

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.updated, 1);
        assert_eq!(fs::read(f.replica.join("a.txt")).unwrap(), b"AAAA");
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_stop_cycle() {
        let f = fixture_with(TestFs::failing("blocked.txt"), CompareMode::Metadata);
        fs::write(f.source.join("a.txt"), b"a").unwrap();
        fs::write(f.source.join("blocked.txt"), b"b").unwrap();
        fs::write(f.source.join("c.txt"), b"c").unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.created, 2);
        assert_eq!(summary.counts.failed, 1);
        assert!(f.replica.join("a.txt").exists());
        assert!(f.replica.join("c.txt").exists());
        assert!(!f.replica.join("blocked.txt").exists());

        let lines = f.sink.lines();
        assert!(lines[2].contains("CREATE file blocked.txt FAILED [PERMISSION_DENIED]"));
        assert!(lines.last().unwrap().contains("completed with errors"));
    }

    #[tokio::test]
    async fn test_kind_change_file_to_directory() {
        let f = fixture();
        fs::create_dir(f.source.join("x")).unwrap();
        fs::write(f.source.join("x/inner.txt"), b"i").unwrap();
        fs::write(f.replica.join("x"), b"was a file").unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.failed, 0);
        assert!(f.replica.join("x").is_dir());
        assert!(f.replica.join("x/inner.txt").is_file());
    }

    #[tokio::test]
    async fn test_kind_change_directory_to_file() {
        let f = fixture();
        fs::write(f.source.join("x"), b"now a file").unwrap();
        fs::create_dir_all(f.replica.join("x/sub")).unwrap();
        fs::write(f.replica.join("x/sub/f"), b"f").unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.failed, 0);
        assert_eq!(fs::read(f.replica.join("x")).unwrap(), b"now a file");
    }

    #[tokio::test]
    async fn test_leftover_temp_file_is_removed() {
        let f = fixture();
        fs::write(f.source.join("a.txt"), b"a").unwrap();
        fs::write(f.replica.join("a.txt.foldersync.tmp"), b"partial").unwrap();

        f.engine.run_cycle().await.unwrap();

        assert!(!f.replica.join("a.txt.foldersync.tmp").exists());
        assert!(f.replica.join("a.txt").exists());
    }

    // ------------------------------------------------------------------
    // Roots
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_missing_source_aborts_cycle() {
        let f = fixture();
        fs::write(f.replica.join("keep.txt"), b"k").unwrap();
        fs::remove_dir(&f.source).unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert!(summary.is_aborted());
        assert!(f.replica.join("keep.txt").exists());
        let lines = f.sink.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("aborted: source unavailable"));
    }

    #[tokio::test]
    async fn test_missing_replica_is_recreated() {
        let f = fixture();
        fs::write(f.source.join("a.txt"), b"a").unwrap();
        fs::remove_dir(&f.replica).unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.created, 1);
        assert!(f.replica.join("a.txt").is_file());
    }

    #[tokio::test]
    async fn test_replica_that_is_a_file_aborts_cycle() {
        let f = fixture();
        fs::remove_dir(&f.replica).unwrap();
        fs::write(&f.replica, b"not a dir").unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert!(summary.is_aborted());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_source_directory_keeps_replica_contents() {
        use std::os::unix::fs::PermissionsExt;

        let f = fixture();
        let locked = f.source.join("locked");
        fs::create_dir(&locked).unwrap();
        fs::create_dir_all(f.replica.join("locked")).unwrap();
        fs::write(f.replica.join("locked/secret.txt"), b"s").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let summary = f.engine.run_cycle().await.unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(summary.counts.deleted, 0);
        assert!(f.replica.join("locked/secret.txt").exists());
    }

    // ------------------------------------------------------------------
    // Links, names and permissions
    // ------------------------------------------------------------------

    #[cfg(unix)]
    #[tokio::test]
    async fn test_replica_link_is_unlinked_not_followed() {
        let f = fixture();
        let outside = f._dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("precious.txt"), b"keep me").unwrap();
        std::os::unix::fs::symlink(&outside, f.replica.join("link")).unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.deleted, 1);
        assert_eq!(summary.counts.failed, 0);
        assert!(fs::symlink_metadata(f.replica.join("link")).is_err());
        assert_eq!(fs::read(outside.join("precious.txt")).unwrap(), b"keep me");
        assert!(f.sink.lines()[1].ends_with("DELETE symlink link ok"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_replica_link_is_replaced_by_source_directory() {
        let f = fixture();
        let outside = f._dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("precious.txt"), b"keep me").unwrap();
        fs::create_dir(f.source.join("link")).unwrap();
        fs::write(f.source.join("link/inner.txt"), b"i").unwrap();
        std::os::unix::fs::symlink(&outside, f.replica.join("link")).unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.failed, 0);
        assert!(fs::symlink_metadata(f.replica.join("link")).unwrap().is_dir());
        assert!(f.replica.join("link/inner.txt").is_file());
        assert_eq!(fs::read_dir(&outside).unwrap().count(), 1);
        assert_eq!(fs::read(outside.join("precious.txt")).unwrap(), b"keep me");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_utf8_name_is_mirrored() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let f = fixture();
        let name = OsStr::from_bytes(b"caf\xe9.txt");
        if fs::write(f.source.join(name), b"latin-1").is_err() {
            return;
        }

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.created, 1);
        assert_eq!(fs::read(f.replica.join(name)).unwrap(), b"latin-1");
        assert!(f.sink.lines()[1].ends_with("CREATE file caf\\xe9.txt ok"));

        let second = f.engine.run_cycle().await.unwrap();
        assert!(second.is_noop());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_permission_change_is_propagated() {
        use std::os::unix::fs::PermissionsExt;

        let f = fixture();
        let script = f.source.join("run.sh");
        fs::write(&script, b"#!/bin/sh").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();
        f.engine.run_cycle().await.unwrap();

        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.updated, 1);
        let mode = fs::metadata(f.replica.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o755);
        assert!(f.sink.lines().iter().any(|l| l.ends_with("UPDATE file run.sh ok")));
        assert!(f.engine.run_cycle().await.unwrap().is_noop());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_directory_permission_change_is_propagated() {
        use std::os::unix::fs::PermissionsExt;

        let f = fixture();
        let shared = f.source.join("shared");
        fs::create_dir(&shared).unwrap();
        fs::set_permissions(&shared, fs::Permissions::from_mode(0o755)).unwrap();
        fs::create_dir(f.replica.join("shared")).unwrap();
        fs::set_permissions(f.replica.join("shared"), fs::Permissions::from_mode(0o700)).unwrap();

        let summary = f.engine.run_cycle().await.unwrap();

        assert_eq!(summary.counts.updated, 1);
        let mode = fs::metadata(f.replica.join("shared")).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o755);
        assert!(f.sink.lines()[1].ends_with("UPDATE directory shared ok"));
    }

    // ------------------------------------------------------------------
    // Fatal errors
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_sink_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join("a.txt"), b"a").unwrap();

        let sink = Arc::new(MemoryLogSink::failing_after(1));
        let engine = SyncEngine::new(
            &source,
            dir.path().join("replica"),
            Arc::new(LocalFileSystemAdapter::new()),
            AuditLogger::new(sink, RecordFormat::Text),
        );

        let result = engine.run_cycle().await;
        assert!(matches!(result, Err(SyncError::LogSink(_))));
    }

    #[tokio::test]
    async fn test_cycle_timestamps_come_from_clock() {
        struct FixedClock(DateTime<Utc>);

        #[async_trait::async_trait]
        impl IClock for FixedClock {
            fn now(&self) -> DateTime<Utc> {
                self.0
            }
            async fn sleep(&self, _: std::time::Duration) {}
        }

        let fixed = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let f = fixture();
        fs::write(f.source.join("a.txt"), b"a").unwrap();
        let engine = f.engine.with_clock(Arc::new(FixedClock(fixed)));

        let summary = engine.run_cycle().await.unwrap();
        assert_eq!(summary.started_at, fixed);
        assert_eq!(summary.completed_at, fixed);
        assert_eq!(summary.duration_ms(), 0);
        assert_eq!(
            f.sink.lines()[1],
            "2023-11-14T22:13:20.000Z CREATE file a.txt ok"
        );
    }
}
