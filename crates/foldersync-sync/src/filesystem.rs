//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Atomic copies**: Copies to a sibling temp file, stamps the source
//!   mtime on it with `filetime`, then renames over the target. A copy cut
//!   short never leaves a truncated file under the target name.
//! - **SHA-256**: Content is hashed in 64 KiB chunks on the blocking pool,
//!   so large files are never loaded into memory at once.
//! - **No recursion on delete**: `remove_directory` fails on a non-empty
//!   directory instead of wiping it, and `remove_file` on a symbolic link
//!   unlinks the link, never its target.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use foldersync_core::{
    domain::ContentHash,
    ports::local_filesystem::ILocalFileSystem,
};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

/// Suffix appended to a target's file name while its new content is written
pub const TEMP_SUFFIX: &str = ".foldersync.tmp";

/// Read buffer size for hashing
const HASH_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations derive their context
/// from the path arguments. The source and replica roots live in the engine.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Sibling path used while copying onto `target`
fn temp_path_for(target: &Path) -> PathBuf {
    let mut name: OsString = target.file_name().map(OsString::from).unwrap_or_default();
    name.push(TEMP_SUFFIX);
    target.with_file_name(name)
}

/// Streams a file through SHA-256
fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Sets a file's mtime on the blocking pool
async fn stamp_mtime(path: &Path, modified: DateTime<Utc>) -> anyhow::Result<()> {
    let mtime = FileTime::from_unix_time(modified.timestamp(), modified.timestamp_subsec_nanos());
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || filetime::set_file_mtime(&owned, mtime))
        .await
        .context("setting modification time")?
        .context("setting modification time")
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(source = %source.display(), target = %target.display()))]
    async fn copy_file(
        &self,
        source: &Path,
        target: &Path,
        modified: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let tmp_path = temp_path_for(target);

        debug!(tmp = %tmp_path.display(), "copying to temporary file");
        let bytes = match tokio::fs::copy(source, &tmp_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(e).with_context(|| format!("copying {}", source.display()));
            }
        };

        if let Err(e) = stamp_mtime(&tmp_path, modified).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        debug!("renaming temporary file to target");
        if let Err(e) = tokio::fs::rename(&tmp_path, target).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| format!("replacing {}", target.display()));
        }

        debug!(bytes, "copy complete");
        Ok(bytes)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_directory(&self, path: &Path) -> anyhow::Result<()> {
        debug!("creating directory");
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(source = %source.display(), target = %target.display()))]
    async fn copy_permissions(&self, source: &Path, target: &Path) -> anyhow::Result<()> {
        let permissions = tokio::fs::metadata(source).await?.permissions();
        tokio::fs::set_permissions(target, permissions).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn set_modified(&self, path: &Path, modified: DateTime<Utc>) -> anyhow::Result<()> {
        debug!("restamping modification time");
        stamp_mtime(path, modified).await
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove_file(&self, path: &Path) -> anyhow::Result<()> {
        debug!("removing file");
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove_directory(&self, path: &Path) -> anyhow::Result<()> {
        debug!("removing directory");
        tokio::fs::remove_dir(path).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn compute_hash(&self, path: &Path) -> anyhow::Result<ContentHash> {
        let owned = path.to_path_buf();
        let digest = tokio::task::spawn_blocking(move || hash_file(&owned)).await??;
        debug!(hash = %digest, "hash computed");
        Ok(ContentHash::new(digest)?)
    }
}

// ============================================================================
// Unit tests
// ============================================================================
