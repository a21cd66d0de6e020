//! Reason codes for failed operations
//!
//! Provides structured codes for categorizing why a replica operation
//! failed. The engine attaches one to every failed `OperationRecord` so the
//! log can be filtered without parsing OS error messages.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

/// Structured reason codes for failed operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Insufficient permissions to perform the operation
    PermissionDenied,
    /// The path vanished between scanning and applying
    NotFound,
    /// Something unexpected already occupies the target path
    AlreadyExists,
    /// A directory scheduled for removal still has entries
    DirectoryNotEmpty,
    /// The replica filesystem has no space left
    DiskFull,
    /// File path exceeds the maximum allowed length
    PathTooLong,
    /// Any other I/O failure
    IoError,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::PermissionDenied => "PERMISSION_DENIED",
            ReasonCode::NotFound => "NOT_FOUND",
            ReasonCode::AlreadyExists => "ALREADY_EXISTS",
            ReasonCode::DirectoryNotEmpty => "DIRECTORY_NOT_EMPTY",
            ReasonCode::DiskFull => "DISK_FULL",
            ReasonCode::PathTooLong => "PATH_TOO_LONG",
            ReasonCode::IoError => "IO_ERROR",
        }
    }

    /// Classifies an I/O error
    ///
    /// The OS error number is consulted first because several of these
    /// conditions have no stable `io::ErrorKind` on older toolchains.
    pub fn from_io_error(err: &io::Error) -> Self {
        if let Some(code) = err.raw_os_error().and_then(Self::from_errno) {
            return code;
        }
        match err.kind() {
            io::ErrorKind::PermissionDenied => ReasonCode::PermissionDenied,
            io::ErrorKind::NotFound => ReasonCode::NotFound,
            io::ErrorKind::AlreadyExists => ReasonCode::AlreadyExists,
            _ => ReasonCode::IoError,
        }
    }

    /// Classifies an adapter error by looking for an `io::Error` in its chain
    pub fn classify(err: &anyhow::Error) -> Self {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<io::Error>())
            .map(Self::from_io_error)
            .unwrap_or(ReasonCode::IoError)
    }

    #[cfg(unix)]
    fn from_errno(errno: i32) -> Option<Self> {
        match errno {
            libc::EACCES | libc::EPERM | libc::EROFS => Some(ReasonCode::PermissionDenied),
            libc::ENOENT => Some(ReasonCode::NotFound),
            libc::EEXIST => Some(ReasonCode::AlreadyExists),
            libc::ENOTEMPTY => Some(ReasonCode::DirectoryNotEmpty),
            libc::ENOSPC | libc::EDQUOT => Some(ReasonCode::DiskFull),
            libc::ENAMETOOLONG => Some(ReasonCode::PathTooLong),
            _ => None,
        }
    }

    #[cfg(not(unix))]
    fn from_errno(_errno: i32) -> Option<Self> {
        None
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
