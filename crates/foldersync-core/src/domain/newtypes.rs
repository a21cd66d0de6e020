//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier correlating every record written during one sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(Uuid);

impl CycleId {
    /// Create a new random CycleId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a CycleId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CycleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CycleId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid UUID: {e}")))
    }
}

// ============================================================================
// Path types
// ============================================================================

/// A root-relative path in POSIX form (`dir/sub/file.txt`)
///
/// RelativePath ensures the path is:
/// - Non-empty
/// - Relative (no leading `/`)
/// - Normalized (no empty, `.` or `..` components)
///
/// The native components are kept alongside the `/`-joined display form, so
/// names that are not valid UTF-8 still resolve to the exact file on disk.
/// Their invalid bytes are shown as `\xNN` escapes in the display form.
///
/// The same value identifies an entry in both the source and the replica
/// tree; [`RelativePath::to_native`] resolves it under either root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath {
    display: String,
    native: PathBuf,
}

impl RelativePath {
    /// Create a new RelativePath from a `/`-separated string
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is empty, absolute, or
    /// contains empty, `.` or `..` components
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();

        if path.is_empty() {
            return Err(DomainError::InvalidPath(
                "Relative path cannot be empty".to_string(),
            ));
        }

        if path.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "Path must be relative: {path}"
            )));
        }

        let mut native = PathBuf::new();
        for component in path.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(DomainError::InvalidPath(format!(
                    "Invalid path component in {path}"
                )));
            }
            native.push(component);
        }

        Ok(Self {
            display: path,
            native,
        })
    }

    /// Build a RelativePath from a native path that lies under `root`
    ///
    /// # Errors
    /// Returns `DomainError::PathNotInRoot` if `path` is not strictly below
    /// `root`, or `DomainError::InvalidPath` if it is not normalized
    pub fn from_native(path: &Path, root: &Path) -> Result<Self, DomainError> {
        let relative = path.strip_prefix(root).map_err(|_| {
            DomainError::PathNotInRoot(format!(
                "{} is not within {}",
                path.display(),
                root.display()
            ))
        })?;

        let mut parts = Vec::new();
        let mut native = PathBuf::new();
        for component in relative.components() {
            let Component::Normal(name) = component else {
                return Err(DomainError::InvalidPath(format!(
                    "Invalid path component in {}",
                    path.display()
                )));
            };
            parts.push(display_component(name));
            native.push(name);
        }

        if parts.is_empty() {
            return Err(DomainError::InvalidPath(
                "Relative path cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            display: parts.join("/"),
            native,
        })
    }

    /// The `/`-separated display form
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Number of components (`a` is 1, `a/b` is 2)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.display.split('/').count()
    }

    /// The final component
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.display.rsplit('/').next().unwrap_or(&self.display)
    }

    /// The parent path, or `None` for a top-level entry
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let idx = self.display.rfind('/')?;
        Some(Self {
            display: self.display[..idx].to_string(),
            native: self.native.parent()?.to_path_buf(),
        })
    }

    /// Returns true if `self` is strictly below `ancestor`
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &RelativePath) -> bool {
        self.display.len() > ancestor.display.len()
            && self.display.starts_with(&ancestor.display)
            && self.display.as_bytes()[ancestor.display.len()] == b'/'
    }

    /// Resolve this path under a native root directory
    #[must_use]
    pub fn to_native(&self, root: &Path) -> PathBuf {
        root.join(&self.native)
    }
}

/// Display form of one native name component
#[cfg(unix)]
fn display_component(name: &OsStr) -> String {
    use std::fmt::Write as _;
    use std::os::unix::ffi::OsStrExt;

    let mut bytes = name.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(err) => {
                let (valid, rest) = bytes.split_at(err.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let bad = err.error_len().unwrap_or(rest.len());
                for byte in &rest[..bad] {
                    let _ = write!(out, "\\x{byte:02x}");
                }
                bytes = &rest[bad..];
            }
        }
    }
}

#[cfg(not(unix))]
fn display_component(name: &OsStr) -> String {
    name.to_string_lossy().into_owned()
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

impl FromStr for RelativePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.display
    }
}

// ============================================================================
// Content fingerprint
// ============================================================================

/// SHA-256 content digest in lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Hex length of a SHA-256 digest
    const EXPECTED_HEX_LEN: usize = 64;

    /// Create a new ContentHash
    ///
    /// Uppercase hex is accepted and normalized to lowercase.
    ///
    /// # Errors
    /// Returns error if the value is not 64 hex characters
    pub fn new(hash: impl Into<String>) -> Result<Self, DomainError> {
        let hash = hash.into();

        if hash.len() != Self::EXPECTED_HEX_LEN {
            return Err(DomainError::InvalidHash(format!(
                "Hash has wrong length: expected {} hex characters, got {}",
                Self::EXPECTED_HEX_LEN,
                hash.len()
            )));
        }

        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(format!(
                "Hash is not valid hex: {hash}"
            )));
        }

        Ok(Self(hash.to_ascii_lowercase()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------
    // CycleId
    // ------------------------------------------------------------------

    #[test]
    fn test_cycle_id_unique() {
        assert_ne!(CycleId::new(), CycleId::new());
    }

    #[test]
    fn test_cycle_id_roundtrip_through_string() {
        let id = CycleId::new();
        let parsed: CycleId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_cycle_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<CycleId>().is_err());
    }

    // ------------------------------------------------------------------
    // RelativePath
    // ------------------------------------------------------------------

    #[test]
    fn test_relative_path_valid() {
        let path = RelativePath::new("dir/sub/file.txt").unwrap();
        assert_eq!(path.as_str(), "dir/sub/file.txt");
        assert_eq!(path.depth(), 3);
        assert_eq!(path.file_name(), "file.txt");
    }

    #[test]
    fn test_relative_path_rejects_invalid() {
        assert!(RelativePath::new("").is_err());
        assert!(RelativePath::new("/abs").is_err());
        assert!(RelativePath::new("a//b").is_err());
        assert!(RelativePath::new("a/./b").is_err());
        assert!(RelativePath::new("a/../b").is_err());
        assert!(RelativePath::new("trailing/").is_err());
    }

    #[test]
    fn test_relative_path_allows_dots_inside_names() {
        assert!(RelativePath::new("..hidden").is_ok());
        assert!(RelativePath::new("a/.config").is_ok());
    }

    #[test]
    fn test_relative_path_parent() {
        let path = RelativePath::new("a/b/c").unwrap();
        assert_eq!(path.parent().unwrap().as_str(), "a/b");
        assert!(RelativePath::new("top").unwrap().parent().is_none());
    }

    #[test]
    fn test_relative_path_is_descendant_of() {
        let dir = RelativePath::new("dir").unwrap();
        assert!(RelativePath::new("dir/file").unwrap().is_descendant_of(&dir));
        assert!(RelativePath::new("dir/a/b").unwrap().is_descendant_of(&dir));
        assert!(!RelativePath::new("dir").unwrap().is_descendant_of(&dir));
        assert!(!RelativePath::new("dir-other/file")
            .unwrap()
            .is_descendant_of(&dir));
        assert!(!RelativePath::new("directory").unwrap().is_descendant_of(&dir));
    }

    #[test]
    fn test_relative_path_native_roundtrip() {
        let root = Path::new("/srv/source");
        let native = RelativePath::new("a/b.txt").unwrap().to_native(root);
        assert_eq!(native, PathBuf::from("/srv/source/a/b.txt"));

        let back = RelativePath::from_native(&native, root).unwrap();
        assert_eq!(back.as_str(), "a/b.txt");
    }

    #[test]
    fn test_relative_path_from_native_outside_root() {
        let err = RelativePath::from_native(Path::new("/other/x"), Path::new("/srv")).unwrap_err();
        assert!(matches!(err, DomainError::PathNotInRoot(_)));
    }

    #[test]
    fn test_relative_path_from_native_root_itself() {
        let root = Path::new("/srv");
        assert!(RelativePath::from_native(root, root).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_path_keeps_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new("/srv/source");
        let name = OsStr::from_bytes(b"caf\xe9.txt");
        let native = root.join("dir").join(name);

        let path = RelativePath::from_native(&native, root).unwrap();

        assert_eq!(path.as_str(), "dir/caf\\xe9.txt");
        assert_eq!(path.file_name(), "caf\\xe9.txt");
        assert_eq!(
            path.to_native(Path::new("/srv/replica")),
            Path::new("/srv/replica/dir").join(name)
        );
        assert_eq!(path.parent().unwrap(), RelativePath::new("dir").unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_path_distinct_invalid_bytes_stay_distinct() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = Path::new("/r");
        let a = RelativePath::from_native(&root.join(OsStr::from_bytes(b"x\xe9")), root);
        let b = RelativePath::from_native(&root.join(OsStr::from_bytes(b"x\xe8")), root);
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_relative_path_lexicographic_order_puts_parent_first() {
        let mut paths = vec![
            RelativePath::new("dir/file.txt").unwrap(),
            RelativePath::new("dir-a").unwrap(),
            RelativePath::new("dir").unwrap(),
        ];
        paths.sort();
        let dir_pos = paths.iter().position(|p| p.as_str() == "dir").unwrap();
        let child_pos = paths
            .iter()
            .position(|p| p.as_str() == "dir/file.txt")
            .unwrap();
        assert!(dir_pos < child_pos);
    }

    // ------------------------------------------------------------------
    // ContentHash
    // ------------------------------------------------------------------

    #[test]
    fn test_content_hash_valid() {
        let hex = "a".repeat(64);
        let hash = ContentHash::new(hex.clone()).unwrap();
        assert_eq!(hash.as_str(), hex);
    }

    #[test]
    fn test_content_hash_normalizes_case() {
        let hash = ContentHash::new("AB".repeat(32)).unwrap();
        assert_eq!(hash.as_str(), "ab".repeat(32));
    }

    #[test]
    fn test_content_hash_rejects_bad_input() {
        assert!(ContentHash::new("").is_err());
        assert!(ContentHash::new("abc").is_err());
        assert!(ContentHash::new("z".repeat(64)).is_err());
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = serde_json::to_string(&RelativePath::new("a/b").unwrap()).unwrap();
        assert_eq!(json, "\"a/b\"");
        assert!(serde_json::from_str::<RelativePath>("\"/etc\"").is_err());
    }
}
