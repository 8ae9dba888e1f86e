//! Version Index
//!
//! Cheap persistent map from paths to change counters, consulted by the
//! store protocol to decide whether a freshly probed snapshot is still valid.
//!
//! Each node keeps the version last written at exactly its path (`own`) and the
//! largest version anywhere in its subtree (`max`). A path's version is the
//! largest `own` along its ancestor chain combined with the `max` of its own
//! node, so updating an ancestor, the path itself, or any descendant strictly
//! increases it.

use crate::tree::path::{CaseSensitivity, VfsPath};
use crate::types::Version;
use std::cmp;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct VersionNode {
    own: Version,
    max: Version,
    children: Arc<Vec<(Arc<str>, VersionNode)>>,
}

impl VersionNode {
    fn child(&self, name: &str, case: CaseSensitivity) -> Option<&VersionNode> {
        self.search(name, case)
            .ok()
            .map(|idx| &self.children[idx].1)
    }

    fn search(&self, name: &str, case: CaseSensitivity) -> Result<usize, usize> {
        self.children
            .binary_search_by(|(entry, _)| case.compare(entry, name))
    }

    fn updated(&self, segments: &[&str], version: Version, case: CaseSensitivity) -> VersionNode {
        let Some((first, rest)) = segments.split_first() else {
            // The new version subsumes everything below
            return VersionNode {
                own: version,
                max: version,
                children: Arc::default(),
            };
        };

        let mut children = (*self.children).clone();
        match self.search(first, case) {
            Ok(idx) => {
                let child = children[idx].1.updated(rest, version, case);
                children[idx].1 = child;
            }
            Err(idx) => {
                let child = VersionNode::default().updated(rest, version, case);
                children.insert(idx, (Arc::from(*first), child));
            }
        }
        VersionNode {
            own: self.own,
            max: version,
            children: Arc::new(children),
        }
    }
}

/// Immutable version index
#[derive(Debug, Clone)]
pub struct VersionHierarchy {
    root: VersionNode,
    case_sensitivity: CaseSensitivity,
}

impl VersionHierarchy {
    pub fn empty(case_sensitivity: CaseSensitivity) -> Self {
        Self {
            root: VersionNode::default(),
            case_sensitivity,
        }
    }

    /// Largest version issued so far
    pub fn root_version(&self) -> Version {
        self.root.max
    }

    pub fn get_version(&self, path: &VfsPath) -> Version {
        let mut node = &self.root;
        let mut version = node.own;
        for segment in path.segments() {
            match node.child(segment, self.case_sensitivity) {
                Some(child) => {
                    node = child;
                    version = cmp::max(version, node.own);
                }
                None => return version,
            }
        }
        cmp::max(version, node.max)
    }

    /// New index where `path` carries a version larger than any issued before
    pub fn update_version(&self, path: &VfsPath) -> VersionHierarchy {
        let segments: Vec<&str> = path.segments().collect();
        let version = self.root.max + 1;
        VersionHierarchy {
            root: self.root.updated(&segments, version, self.case_sensitivity),
            case_sensitivity: self.case_sensitivity,
        }
    }
}
