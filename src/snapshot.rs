//! Immutable descriptions of what is on disk at a location
//!
//! A [`LocationSnapshot`] is fully known: a regular file with its content hash,
//! a directory with every child (recursively), or a missing location. Snapshots
//! are shared behind `Arc` between tree generations and threads.

pub mod excludes;
pub mod hasher;
pub mod walker;

use crate::tree::path::{CaseSensitivity, VfsPath};
use crate::types::Hash;
use std::sync::Arc;

/// How a location was reached while probing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    Direct,
    ViaSymlink,
}

/// Type tag of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    RegularFile,
    Directory,
    Missing,
}

/// Stat-level information recorded for a regular file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileMetadata {
    pub length: u64,
    /// Milliseconds since the Unix epoch
    pub last_modified: u64,
    pub access_type: AccessType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularFileSnapshot {
    pub absolute_path: VfsPath,
    pub content_hash: Hash,
    pub metadata: FileMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySnapshot {
    pub absolute_path: VfsPath,
    /// Merkle hash over the children's names and hashes
    pub content_hash: Hash,
    /// Sorted by name (byte order)
    pub children: Vec<Arc<LocationSnapshot>>,
    pub access_type: AccessType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSnapshot {
    pub absolute_path: VfsPath,
    pub access_type: AccessType,
}

/// Fully known state of one location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationSnapshot {
    RegularFile(RegularFileSnapshot),
    Directory(DirectorySnapshot),
    Missing(MissingSnapshot),
}

impl LocationSnapshot {
    pub fn regular_file(absolute_path: VfsPath, content_hash: Hash, metadata: FileMetadata) -> Self {
        LocationSnapshot::RegularFile(RegularFileSnapshot {
            absolute_path,
            content_hash,
            metadata,
        })
    }

    /// Build a directory snapshot; children are sorted and the Merkle hash computed here.
    pub fn directory(
        absolute_path: VfsPath,
        mut children: Vec<Arc<LocationSnapshot>>,
        access_type: AccessType,
    ) -> Self {
        children.sort_by(|a, b| a.name().cmp(b.name()));
        let content_hash = hasher::compute_directory_hash(&children);
        LocationSnapshot::Directory(DirectorySnapshot {
            absolute_path,
            content_hash,
            children,
            access_type,
        })
    }

    pub fn missing(absolute_path: VfsPath) -> Self {
        LocationSnapshot::Missing(MissingSnapshot {
            absolute_path,
            access_type: AccessType::Direct,
        })
    }

    pub fn absolute_path(&self) -> &VfsPath {
        match self {
            LocationSnapshot::RegularFile(file) => &file.absolute_path,
            LocationSnapshot::Directory(dir) => &dir.absolute_path,
            LocationSnapshot::Missing(missing) => &missing.absolute_path,
        }
    }

    /// Last path segment in its original case
    pub fn name(&self) -> &str {
        self.absolute_path().name()
    }

    pub fn file_type(&self) -> FileType {
        match self {
            LocationSnapshot::RegularFile(_) => FileType::RegularFile,
            LocationSnapshot::Directory(_) => FileType::Directory,
            LocationSnapshot::Missing(_) => FileType::Missing,
        }
    }

    pub fn hash(&self) -> Hash {
        match self {
            LocationSnapshot::RegularFile(file) => file.content_hash,
            LocationSnapshot::Directory(dir) => dir.content_hash,
            LocationSnapshot::Missing(_) => hasher::missing_hash(),
        }
    }

    pub fn access_type(&self) -> AccessType {
        match self {
            LocationSnapshot::RegularFile(file) => file.metadata.access_type,
            LocationSnapshot::Directory(dir) => dir.access_type,
            LocationSnapshot::Missing(missing) => missing.access_type,
        }
    }

    pub fn children(&self) -> &[Arc<LocationSnapshot>] {
        match self {
            LocationSnapshot::Directory(dir) => &dir.children,
            _ => &[],
        }
    }

    /// Same type and same content hash; paths and timestamps are ignored
    pub fn is_content_up_to_date(&self, other: &LocationSnapshot) -> bool {
        self.file_type() == other.file_type() && self.hash() == other.hash()
    }

    /// Answer a lookup for a path below this snapshot.
    ///
    /// Anything below a regular file or a missing location is missing, as is
    /// anything a directory does not list.
    pub fn find_descendant(
        self: &Arc<Self>,
        relative_segments: &[&str],
        case_sensitivity: CaseSensitivity,
    ) -> Arc<LocationSnapshot> {
        let mut current = Arc::clone(self);
        for (depth, segment) in relative_segments.iter().enumerate() {
            let next = current
                .children()
                .iter()
                .find(|child| case_sensitivity.equals(child.name(), segment))
                .cloned();
            match next {
                Some(child) => current = child,
                None => {
                    let missing_path = current
                        .absolute_path()
                        .join_segments(relative_segments[depth..].iter().copied());
                    return Arc::new(LocationSnapshot::missing(missing_path));
                }
            }
        }
        current
    }

    /// The same snapshot re-rooted at `target`
    pub fn relocated(&self, target: &VfsPath) -> LocationSnapshot {
        match self {
            LocationSnapshot::RegularFile(file) => LocationSnapshot::RegularFile(RegularFileSnapshot {
                absolute_path: target.clone(),
                content_hash: file.content_hash,
                metadata: file.metadata,
            }),
            LocationSnapshot::Directory(dir) => {
                let children = dir
                    .children
                    .iter()
                    .map(|child| Arc::new(child.relocated(&target.join(child.name()))))
                    .collect();
                LocationSnapshot::directory(target.clone(), children, dir.access_type)
            }
            LocationSnapshot::Missing(missing) => LocationSnapshot::Missing(MissingSnapshot {
                absolute_path: target.clone(),
                access_type: missing.access_type,
            }),
        }
    }

    /// Restrict this snapshot to the entries accepted by `predicate`.
    ///
    /// The predicate sees every descendant and a root regular file; a root
    /// directory is always kept and rejected subdirectories drop their subtree.
    /// Returns `None` for a missing root or a rejected root file.
    pub fn filtered(&self, predicate: &dyn Fn(&LocationSnapshot) -> bool) -> Option<LocationSnapshot> {
        match self {
            LocationSnapshot::Missing(_) => None,
            LocationSnapshot::RegularFile(_) => predicate(self).then(|| self.clone()),
            LocationSnapshot::Directory(_) => Some(self.filter_directory(predicate)),
        }
    }

    fn filter_directory(&self, predicate: &dyn Fn(&LocationSnapshot) -> bool) -> LocationSnapshot {
        let mut changed = false;
        let mut children = Vec::with_capacity(self.children().len());
        for child in self.children() {
            if !predicate(child) {
                changed = true;
                continue;
            }
            if let LocationSnapshot::Directory(_) = child.as_ref() {
                let filtered = child.filter_directory(predicate);
                if filtered.hash() != child.hash() {
                    changed = true;
                    children.push(Arc::new(filtered));
                    continue;
                }
            }
            children.push(Arc::clone(child));
        }
        if !changed {
            return self.clone();
        }
        LocationSnapshot::directory(self.absolute_path().clone(), children, self.access_type())
    }
}
