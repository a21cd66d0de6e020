//! foldersync Sync - One-way mirror engine
//!
//! Provides:
//! - Tree scanning into inventories
//! - Pure reconciliation of a source inventory against a replica inventory
//! - Applying the resulting operations to the replica
//! - Periodic scheduling with graceful cancellation
//!
//! ## Modules
//!
//! - [`scanner`] - Walks a directory root into an `Inventory`
//! - [`reconciler`] - Computes the ordered operation list
//! - [`filesystem`] - Local filesystem adapter (atomic copies, SHA-256)
//! - [`engine`] - Runs one scan/reconcile/apply cycle
//! - [`scheduler`] - Repeats cycles on a fixed interval
//! - [`clock`] - Wall-clock implementation of `IClock`

pub mod clock;
pub mod engine;
pub mod filesystem;
pub mod reconciler;
pub mod scanner;
pub mod scheduler;

use std::path::PathBuf;

use foldersync_core::ports::SinkError;
use thiserror::Error;

/// Errors raised while scanning a tree root
#[derive(Debug, Error)]
pub enum ScanError {
    /// The root path does not exist
    #[error("root not found: {0}")]
    RootNotFound(PathBuf),

    /// The root path exists but is not a directory
    #[error("root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The root directory cannot be listed
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Any other I/O failure on the root
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking scan task did not complete
    #[error("scan task failed: {0}")]
    TaskFailed(String),
}

impl ScanError {
    /// Maps an I/O error on `path` to the matching variant
    pub fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ScanError::RootNotFound(path),
            std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(path),
            _ => ScanError::Io { path, source: err },
        }
    }
}

/// Errors that stop the sync scheduler
///
/// Anything that only affects one operation or one cycle is logged as an
/// operation record or an aborted summary instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The operation log could not be written
    #[error("operation log unavailable: {0}")]
    LogSink(#[from] SinkError),
}
