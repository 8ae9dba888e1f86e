//! Absolute path handling and case-aware segment comparison

use crate::error::VfsError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

/// How path segments are compared, fixed for the lifetime of a hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseSensitivity {
    CaseSensitive,
    CaseInsensitive,
}

impl CaseSensitivity {
    /// Case sensitivity of the default file system on this platform
    pub fn for_current_platform() -> Self {
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            CaseSensitivity::CaseInsensitive
        } else {
            CaseSensitivity::CaseSensitive
        }
    }

    /// Total order on segments. Insensitive mode compares lower-cased characters.
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            CaseSensitivity::CaseSensitive => a.cmp(b),
            CaseSensitivity::CaseInsensitive => a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase)),
        }
    }

    pub fn equals(self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// Key under which two equal paths hash identically
    pub fn hash_key(self, path: &str) -> Cow<'_, str> {
        match self {
            CaseSensitivity::CaseSensitive => Cow::Borrowed(path),
            CaseSensitivity::CaseInsensitive => Cow::Owned(path.to_lowercase()),
        }
    }
}

/// Normalized absolute path, cheap to clone
///
/// Invariants:
/// 1. Starts with `/`
/// 2. Unicode is NFC-normalized
/// 3. No trailing slash except for the root itself
/// 4. No empty, `.` or `..` segments
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VfsPath(Arc<str>);

impl VfsPath {
    pub fn root() -> Self {
        VfsPath(Arc::from("/"))
    }

    /// Parse and normalize an absolute path string
    pub fn new(path: &str) -> Result<Self, VfsError> {
        let normalized = normalize_path_string(path);
        if !normalized.starts_with('/') {
            return Err(VfsError::InvalidPath(format!(
                "Path must be absolute: {}",
                path
            )));
        }
        if normalized.len() > 1 {
            for segment in normalized[1..].split('/') {
                if segment.is_empty() || segment == "." || segment == ".." {
                    return Err(VfsError::InvalidPath(format!(
                        "Path contains an invalid segment {:?}: {}",
                        segment, path
                    )));
                }
            }
        }
        Ok(VfsPath(Arc::from(normalized)))
    }

    pub fn from_path(path: &Path) -> Result<Self, VfsError> {
        let path_str = path.to_str().ok_or_else(|| {
            VfsError::InvalidPath(format!("Path is not valid UTF-8: {}", path.display()))
        })?;
        Self::new(path_str)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(self.as_str())
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Segments from the root down; empty for the root
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        let rest = if self.is_root() { "" } else { &self.0[1..] };
        rest.split('/').filter(|s| !s.is_empty())
    }

    pub fn segment_count(&self) -> usize {
        self.segments().count()
    }

    /// Last segment in its original case; empty for the root
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => "",
        }
    }

    pub fn parent(&self) -> Option<VfsPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(VfsPath(Arc::from(&self.0[..idx]))),
            None => None,
        }
    }

    /// Append a single segment. File names read from disk never contain `/`.
    pub fn join(&self, segment: &str) -> VfsPath {
        debug_assert!(!segment.is_empty() && !segment.contains('/'));
        let joined = if self.is_root() {
            format!("/{}", segment)
        } else {
            format!("{}/{}", self.0, segment)
        };
        VfsPath(Arc::from(joined.nfc().collect::<String>()))
    }

    /// Build the path reached by following `segments` below `self`
    pub fn join_segments<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> VfsPath {
        segments
            .into_iter()
            .fold(self.clone(), |path, segment| path.join(segment))
    }

    /// Whether `self` equals `other` or lies below it
    pub fn is_same_or_descendant_of(&self, other: &VfsPath, case: CaseSensitivity) -> bool {
        let mut ours = self.segments();
        for theirs in other.segments() {
            match ours.next() {
                Some(segment) if case.equals(segment, theirs) => {}
                _ => return false,
            }
        }
        true
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VfsPath({:?})", &*self.0)
    }
}

impl AsRef<Path> for VfsPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl TryFrom<&str> for VfsPath {
    type Error = VfsError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        VfsPath::new(value)
    }
}

impl TryFrom<&Path> for VfsPath {
    type Error = VfsError;

    fn try_from(value: &Path) -> Result<Self, Self::Error> {
        VfsPath::from_path(value)
    }
}

/// Normalize a path string without touching the file system
///
/// NFC-normalizes Unicode and strips trailing slashes (except for the root).
pub fn normalize_path_string(path: &str) -> String {
    let mut result: String = path.nfc().collect();
    while result.len() > 1 && result.ends_with('/') {
        result.pop();
    }
    result
}
