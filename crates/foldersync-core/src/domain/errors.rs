//! Domain error types
//!
//! Failures raised while building domain values: malformed relative paths
//! or hashes, and inventory key collisions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid hash format (expected hex SHA-256)
    #[error("Invalid hash format: {0}")]
    InvalidHash(String),

    /// Path is not within the tree root it was resolved against
    #[error("Path not within root: {0}")]
    PathNotInRoot(String),

    /// Two entries mapped to the same inventory key
    #[error("Duplicate inventory entry: {0}")]
    DuplicateEntry(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
