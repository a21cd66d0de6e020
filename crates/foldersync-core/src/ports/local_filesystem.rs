//! Local filesystem port (driven/secondary port)
//!
//! This module defines the interface the apply step uses to change the
//! replica tree and to fingerprint files on either side.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//!   Callers classify failures by downcasting to `std::io::Error`.
//! - `copy_file` must never leave a partially written file under the target
//!   name: either the old content, the new content, or (for a new file) no
//!   file at all.
//! - Directory removal is never recursive; the reconciler deletes children
//!   before their parent.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::domain::newtypes::ContentHash;

// ============================================================================
// ILocalFileSystem trait
// ============================================================================

/// Port trait for local filesystem operations
///
/// ## Implementation Notes
///
/// - All paths are absolute native paths, already resolved against the
///   source or replica root.
/// - `compute_hash` returns a SHA-256 digest so hashes from both trees are
///   directly comparable.
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Copies `source` over `target` atomically and stamps `modified` on it
    ///
    /// # Arguments
    /// * `source` - File to read
    /// * `target` - Destination; replaced if it exists
    /// * `modified` - Modification time to set on the destination
    ///
    /// # Returns
    /// The number of bytes copied
    async fn copy_file(
        &self,
        source: &Path,
        target: &Path,
        modified: DateTime<Utc>,
    ) -> anyhow::Result<u64>;

    /// Creates a directory and all parent directories as needed
    ///
    /// This is equivalent to `mkdir -p` behavior.
    async fn create_directory(&self, path: &Path) -> anyhow::Result<()>;

    /// Copies the permission bits of `source` onto `target`
    async fn copy_permissions(&self, source: &Path, target: &Path) -> anyhow::Result<()>;

    /// Stamps `modified` on an existing file without touching its content
    async fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> anyhow::Result<()>;

    /// Removes a single file, or a symbolic link itself (never its target)
    async fn remove_file(&self, path: &Path) -> anyhow::Result<()>;

    /// Removes an empty directory
    ///
    /// # Errors
    /// Returns an error if the directory still has entries
    async fn remove_directory(&self, path: &Path) -> anyhow::Result<()>;

    /// Computes the SHA-256 digest of a file's content
    async fn compute_hash(&self, path: &Path) -> anyhow::Result<ContentHash>;
}
