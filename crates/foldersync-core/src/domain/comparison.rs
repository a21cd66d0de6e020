//! Content comparison policies
//!
//! A [`ComparisonPolicy`] decides whether a file present in both trees has
//! to be updated. Deciding happens in two steps so the reconciler can stay
//! free of I/O:
//!
//! 1. [`needs_fingerprint`](ComparisonPolicy::needs_fingerprint) tells the
//!    engine which pairs must be hashed before reconciling.
//! 2. [`is_modified`](ComparisonPolicy::is_modified) makes the decision from
//!    the metadata and whatever hashes were attached.
//!
//! Both policies treat a difference in size or permission bits as a
//! modification without hashing.

use serde::{Deserialize, Serialize};

use super::entry::PathEntry;

/// Policy deciding whether a replica file differs from its source
pub trait ComparisonPolicy: Send + Sync {
    /// Whether content hashes of both files are needed to decide
    fn needs_fingerprint(&self, source: &PathEntry, replica: &PathEntry) -> bool;

    /// Whether the replica file must be overwritten
    ///
    /// When a hash is required but missing on either side the pair is
    /// reported as modified.
    fn is_modified(&self, source: &PathEntry, replica: &PathEntry) -> bool;
}

/// Whether both entries report permission bits and they disagree
///
/// Also the test the reconciler applies to directory pairs.
pub fn permissions_differ(source: &PathEntry, replica: &PathEntry) -> bool {
    matches!((source.mode(), replica.mode()), (Some(a), Some(b)) if a != b)
}

/// Differences that need no hashing to detect
fn metadata_differs(source: &PathEntry, replica: &PathEntry) -> bool {
    source.size() != replica.size() || permissions_differ(source, replica)
}

/// Compares hashes when both are present; a missing hash counts as a difference
fn hashes_differ(source: &PathEntry, replica: &PathEntry) -> bool {
    match (source.content_hash(), replica.content_hash()) {
        (Some(a), Some(b)) => a != b,
        _ => true,
    }
}

/// Size and modification time first, content hash only when they disagree
///
/// Equal size and equal mtime are trusted as "already synced". The apply
/// step copies the source mtime onto every file it writes, so files it
/// synced take the fast path on the next cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataPolicy;

impl ComparisonPolicy for MetadataPolicy {
    fn needs_fingerprint(&self, source: &PathEntry, replica: &PathEntry) -> bool {
        !metadata_differs(source, replica) && source.modified() != replica.modified()
    }

    fn is_modified(&self, source: &PathEntry, replica: &PathEntry) -> bool {
        if metadata_differs(source, replica) {
            return true;
        }
        if source.modified() == replica.modified() {
            return false;
        }
        hashes_differ(source, replica)
    }
}

/// Always compare content when sizes match, ignoring modification times
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumPolicy;

impl ComparisonPolicy for ChecksumPolicy {
    fn needs_fingerprint(&self, source: &PathEntry, replica: &PathEntry) -> bool {
        !metadata_differs(source, replica)
    }

    fn is_modified(&self, source: &PathEntry, replica: &PathEntry) -> bool {
        metadata_differs(source, replica) || hashes_differ(source, replica)
    }
}

/// Configured comparison mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// [`MetadataPolicy`]
    #[default]
    Metadata,
    /// [`ChecksumPolicy`]
    Checksum,
}

impl CompareMode {
    /// Builds the policy for this mode
    pub fn policy(self) -> Box<dyn ComparisonPolicy> {
        match self {
            CompareMode::Metadata => Box::new(MetadataPolicy),
            CompareMode::Checksum => Box::new(ChecksumPolicy),
        }
    }
}

impl std::fmt::Display for CompareMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompareMode::Metadata => write!(f, "metadata"),
            CompareMode::Checksum => write!(f, "checksum"),
        }
    }
}

impl std::str::FromStr for CompareMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metadata" => Ok(CompareMode::Metadata),
            "checksum" => Ok(CompareMode::Checksum),
            other => Err(format!(
                "invalid compare mode '{other}'; valid: metadata, checksum"
            )),
        }
    }
}
