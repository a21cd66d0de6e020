//! Tree inventory
//!
//! An [`Inventory`] is the snapshot of one tree taken at the start of a
//! cycle. Entries are keyed by a comparison key derived from the relative
//! path and the [`PathCase`] policy, and iterate in lexicographic key order
//! so that logs are reproducible.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::entry::PathEntry;
use super::errors::DomainError;
use super::newtypes::{ContentHash, RelativePath};

/// Whether relative paths are compared case-sensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathCase {
    Sensitive,
    Insensitive,
}

impl PathCase {
    /// Comparison key for a relative path under this policy
    pub fn key(self, path: &RelativePath) -> String {
        match self {
            PathCase::Sensitive => path.as_str().to_string(),
            PathCase::Insensitive => path.as_str().to_lowercase(),
        }
    }
}

impl Default for PathCase {
    /// Follows the platform default: macOS and Windows filesystems are
    /// case-insensitive out of the box, everything else is not.
    fn default() -> Self {
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            PathCase::Insensitive
        } else {
            PathCase::Sensitive
        }
    }
}

/// How the scanner treats symbolic links
///
/// `Follow` resolves each link and records it with its target's kind. A
/// followed link may point outside the tree, so its target's content is
/// mirrored as a regular file or directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymlinkPolicy {
    #[default]
    Follow,
    /// Ignore links on both sides; they are never created, updated or deleted
    Skip,
}

impl std::fmt::Display for SymlinkPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymlinkPolicy::Follow => write!(f, "follow"),
            SymlinkPolicy::Skip => write!(f, "skip"),
        }
    }
}

impl std::str::FromStr for SymlinkPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow" => Ok(SymlinkPolicy::Follow),
            "skip" => Ok(SymlinkPolicy::Skip),
            other => Err(format!("invalid symlink policy '{other}'; valid: follow, skip")),
        }
    }
}

/// Snapshot of a directory tree for one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    case: PathCase,
    entries: BTreeMap<String, PathEntry>,
    /// Keys of directories whose contents could not be listed
    incomplete: BTreeSet<String>,
}

impl Inventory {
    /// Creates an empty inventory
    pub fn new(case: PathCase) -> Self {
        Self {
            case,
            entries: BTreeMap::new(),
            incomplete: BTreeSet::new(),
        }
    }

    /// Builds an inventory from entries, rejecting duplicates
    pub fn from_entries(
        case: PathCase,
        entries: impl IntoIterator<Item = PathEntry>,
    ) -> Result<Self, DomainError> {
        let mut inventory = Self::new(case);
        for entry in entries {
            inventory.insert(entry)?;
        }
        Ok(inventory)
    }

    pub fn case(&self) -> PathCase {
        self.case
    }

    /// Comparison key for `path` in this inventory
    pub fn key_for(&self, path: &RelativePath) -> String {
        self.case.key(path)
    }

    /// Inserts an entry
    ///
    /// # Errors
    /// Returns `DomainError::DuplicateEntry` if another entry already maps to
    /// the same key (e.g. `A.txt` and `a.txt` under case-insensitive
    /// comparison).
    pub fn insert(&mut self, entry: PathEntry) -> Result<(), DomainError> {
        let key = self.key_for(entry.relative_path());
        if let Some(existing) = self.entries.get(&key) {
            return Err(DomainError::DuplicateEntry(format!(
                "{} collides with {}",
                entry.relative_path(),
                existing.relative_path()
            )));
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    pub fn get(&self, path: &RelativePath) -> Option<&PathEntry> {
        self.entries.get(&self.key_for(path))
    }

    pub fn get_by_key(&self, key: &str) -> Option<&PathEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, path: &RelativePath) -> bool {
        self.entries.contains_key(&self.key_for(path))
    }

    /// Records the content hash of a file entry
    ///
    /// Returns false if no entry exists for `path`.
    pub fn attach_hash(&mut self, path: &RelativePath, hash: ContentHash) -> bool {
        let key = self.key_for(path);
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.set_content_hash(hash);
                true
            }
            None => false,
        }
    }

    /// Iterates `(key, entry)` pairs in lexicographic key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PathEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates entries in lexicographic key order
    pub fn entries(&self) -> impl Iterator<Item = &PathEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks a directory whose contents could not be read
    pub fn mark_incomplete(&mut self, path: &RelativePath) {
        let key = self.key_for(path);
        self.incomplete.insert(key);
    }

    /// Number of directories marked incomplete
    pub fn incomplete_count(&self) -> usize {
        self.incomplete.len()
    }

    /// Returns true if `path` lies strictly below a directory marked incomplete
    pub fn is_under_incomplete(&self, path: &RelativePath) -> bool {
        let key = self.key_for(path);
        self.incomplete.iter().any(|dir| {
            key.len() > dir.len() && key.starts_with(dir.as_str()) && key.as_bytes()[dir.len()] == b'/'
        })
    }
}
