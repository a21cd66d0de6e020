//! Tree scanner
//!
//! Walks a directory root with `walkdir` and produces an [`Inventory`] of
//! every file and directory below it, keyed by relative path.
//!
//! ## Design Decisions
//!
//! - **No hashing**: content fingerprints are computed later by the engine,
//!   only for pairs the comparison policy cannot decide from metadata.
//! - **Partial trees**: an unreadable subdirectory is kept as an entry and
//!   marked incomplete, so its replica counterpart is left alone instead of
//!   being emptied.
//! - **Blocking walk**: `walkdir` is synchronous, so [`TreeScanner::scan`]
//!   runs it on the blocking pool.
//! - **Links on the replica side**: [`SymlinkPolicy`] only governs how the
//!   source is read. The replica is never walked through a link; each link
//!   found there, under either policy, is recorded as a
//!   [`EntryKind::Symlink`] leaf, so deleting it unlinks the link and never
//!   reaches into its target.

use std::fs::Metadata;
use std::path::Path;

use chrono::{DateTime, Utc};
use foldersync_core::domain::{
    EntryKind, Inventory, PathCase, PathEntry, RelativePath, SymlinkPolicy,
};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::ScanError;

/// Which tree a walk reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Source,
    Replica,
}

/// Scans directory trees into inventories
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeScanner {
    case: PathCase,
    symlinks: SymlinkPolicy,
}

impl TreeScanner {
    pub fn new(case: PathCase, symlinks: SymlinkPolicy) -> Self {
        Self { case, symlinks }
    }

    pub fn case(&self) -> PathCase {
        self.case
    }

    pub fn symlinks(&self) -> SymlinkPolicy {
        self.symlinks
    }

    /// Scans a source tree, following links per the symlink policy
    ///
    /// # Errors
    /// Fails only when the root itself is missing, not a directory, or not
    /// listable. Problems below the root are logged and skipped.
    pub async fn scan(&self, root: &Path) -> Result<Inventory, ScanError> {
        self.scan_on_pool(root, Side::Source).await
    }

    /// Scans a replica tree without ever resolving links below the root
    ///
    /// # Errors
    /// Same as [`TreeScanner::scan`].
    pub async fn scan_replica(&self, root: &Path) -> Result<Inventory, ScanError> {
        self.scan_on_pool(root, Side::Replica).await
    }

    async fn scan_on_pool(&self, root: &Path, side: Side) -> Result<Inventory, ScanError> {
        let scanner = *self;
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || scanner.walk(&root, side))
            .await
            .map_err(|e| ScanError::TaskFailed(e.to_string()))?
    }

    #[instrument(skip(self), fields(root = %root.display()))]
    fn walk(&self, root: &Path, side: Side) -> Result<Inventory, ScanError> {
        let metadata =
            std::fs::metadata(root).map_err(|e| ScanError::from_io(root.to_path_buf(), e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }
        std::fs::read_dir(root).map_err(|e| ScanError::from_io(root.to_path_buf(), e))?;

        let mut inventory = Inventory::new(self.case);
        let follow = side == Side::Source && self.symlinks == SymlinkPolicy::Follow;
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(follow)
            .sort_by_file_name();

        for item in walker {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    self.handle_walk_error(root, &mut inventory, err)?;
                    continue;
                }
            };

            if side == Side::Source
                && entry.path_is_symlink()
                && self.symlinks == SymlinkPolicy::Skip
            {
                debug!(path = %entry.path().display(), "Skipping symbolic link");
                continue;
            }

            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else if file_type.is_symlink() && !follow {
                EntryKind::Symlink
            } else {
                debug!(path = %entry.path().display(), "Skipping special file");
                continue;
            };

            let relative = match RelativePath::from_native(entry.path(), root) {
                Ok(rel) => rel,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "Skipping path outside the root");
                    continue;
                }
            };

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warn!(path = %relative, error = %err, "Skipping entry with unreadable metadata");
                    continue;
                }
            };
            let modified: DateTime<Utc> = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default();

            let path_entry = match kind {
                EntryKind::Directory => PathEntry::directory(relative, modified),
                EntryKind::File => PathEntry::file(relative, metadata.len(), modified),
                EntryKind::Symlink => PathEntry::symlink(relative, modified),
            };
            let path_entry = match permission_bits(&metadata) {
                Some(mode) if kind != EntryKind::Symlink => path_entry.with_mode(mode),
                _ => path_entry,
            };

            if let Err(err) = inventory.insert(path_entry) {
                warn!(error = %err, "Skipping entry that collides with another path");
            }
        }

        debug!(
            entries = inventory.len(),
            incomplete = inventory.incomplete_count(),
            "Scan complete"
        );
        Ok(inventory)
    }

    /// Classifies an error reported during the walk
    ///
    /// A listing failure on a directory already recorded marks it
    /// incomplete. Link loops, broken links and vanished entries are
    /// skipped. An error on the root itself aborts the scan.
    fn handle_walk_error(
        &self,
        root: &Path,
        inventory: &mut Inventory,
        err: walkdir::Error,
    ) -> Result<(), ScanError> {
        if let Some(ancestor) = err.loop_ancestor() {
            warn!(
                path = ?err.path(),
                ancestor = %ancestor.display(),
                "Skipping symbolic link loop"
            );
            return Ok(());
        }

        let Some(path) = err.path().map(Path::to_path_buf) else {
            warn!(error = %err, "Skipping unreadable entry");
            return Ok(());
        };

        if err.depth() == 0 || path == root {
            let io = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "walk failed"));
            return Err(ScanError::from_io(path, io));
        }

        match RelativePath::from_native(&path, root) {
            Ok(relative) if inventory.get(&relative).is_some_and(PathEntry::is_directory) => {
                warn!(path = %relative, error = %err, "Directory contents unreadable; leaving its replica subtree untouched");
                inventory.mark_incomplete(&relative);
            }
            _ => {
                warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn permission_bits(_metadata: &Metadata) -> Option<u32> {
    None
}
