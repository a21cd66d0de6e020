//! Reconciliation operations
//!
//! Operations are produced by the reconciler and consumed by the apply step
//! within a single cycle. They are never persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entry::EntryKind;
use super::newtypes::RelativePath;

/// Kind of an operation, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// A single action that brings the replica closer to the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create a directory, or copy a file that is missing from the replica
    Create(RelativePath, EntryKind),
    /// Re-copy a file whose content or permissions differ, or re-apply a
    /// directory's permissions
    Update(RelativePath, EntryKind),
    /// Remove an entry that no longer exists in the source
    Delete(RelativePath, EntryKind),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Create(..) => OperationKind::Create,
            Operation::Update(..) => OperationKind::Update,
            Operation::Delete(..) => OperationKind::Delete,
        }
    }

    pub fn path(&self) -> &RelativePath {
        match self {
            Operation::Create(path, _)
            | Operation::Update(path, _)
            | Operation::Delete(path, _) => path,
        }
    }

    /// Kind of the entry the operation targets
    pub fn entry_kind(&self) -> EntryKind {
        match self {
            Operation::Create(_, kind) | Operation::Update(_, kind) | Operation::Delete(_, kind) => {
                *kind
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind(), self.entry_kind(), self.path())
    }
}
