//! Inventory entries
//!
//! A [`PathEntry`] is one file or directory found by the tree scanner,
//! identified by its root-relative path.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ContentHash, RelativePath};

/// Kind of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
    /// A link recorded as itself, never resolved (replica side only)
    Symlink,
}

impl EntryKind {
    pub fn is_file(self) -> bool {
        matches!(self, EntryKind::File)
    }

    pub fn is_directory(self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    pub fn is_symlink(self) -> bool {
        matches!(self, EntryKind::Symlink)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Directory => write!(f, "directory"),
            EntryKind::Symlink => write!(f, "symlink"),
        }
    }
}

/// A file or directory in an inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    relative_path: RelativePath,
    kind: EntryKind,
    /// Size in bytes (always 0 for directories)
    size: u64,
    modified: DateTime<Utc>,
    /// Permission bits (`0o7777` mask), where the platform has them
    mode: Option<u32>,
    /// Filled in lazily, only when a comparison needs it
    content_hash: Option<ContentHash>,
}

impl PathEntry {
    /// Creates a file entry
    pub fn file(relative_path: RelativePath, size: u64, modified: DateTime<Utc>) -> Self {
        Self {
            relative_path,
            kind: EntryKind::File,
            size,
            modified,
            mode: None,
            content_hash: None,
        }
    }

    /// Creates a directory entry
    pub fn directory(relative_path: RelativePath, modified: DateTime<Utc>) -> Self {
        Self {
            relative_path,
            kind: EntryKind::Directory,
            size: 0,
            modified,
            mode: None,
            content_hash: None,
        }
    }

    /// Creates an entry for an unresolved symbolic link
    pub fn symlink(relative_path: RelativePath, modified: DateTime<Utc>) -> Self {
        Self {
            relative_path,
            kind: EntryKind::Symlink,
            size: 0,
            modified,
            mode: None,
            content_hash: None,
        }
    }

    /// Records permission bits (builder style)
    #[must_use]
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode & 0o7777);
        self
    }

    /// Attaches a content hash (builder style)
    #[must_use]
    pub fn with_hash(mut self, hash: ContentHash) -> Self {
        self.content_hash = Some(hash);
        self
    }

    pub fn relative_path(&self) -> &RelativePath {
        &self.relative_path
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn mode(&self) -> Option<u32> {
        self.mode
    }

    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.content_hash.as_ref()
    }

    pub fn set_content_hash(&mut self, hash: ContentHash) {
        self.content_hash = Some(hash);
    }
}
