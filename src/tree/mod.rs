//! Snapshot Hierarchy
//!
//! A persistent, path-segment-keyed tree describing what is known about the
//! file system. Every mutation returns a new hierarchy sharing all untouched
//! subtrees with the old one, so a hierarchy can be read from any thread
//! without synchronization.

pub mod node;
pub mod path;
pub mod version;

use crate::snapshot::{FileType, LocationSnapshot};
use node::{ChildNodes, FileSystemNode, RootSnapshots};
use path::{CaseSensitivity, VfsPath};
use std::sync::{Arc, OnceLock};

/// Receives structural changes while a hierarchy is being rebuilt
///
/// `node_removed` is reported for nodes that drop out of the tree, `node_added`
/// for complete snapshots that enter it.
pub trait NodeDiffListener {
    fn node_removed(&mut self, node: &FileSystemNode);
    fn node_added(&mut self, node: &FileSystemNode);
}

/// Discards all diff events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDiffListener;

impl NodeDiffListener for NoopDiffListener {
    fn node_removed(&mut self, _node: &FileSystemNode) {}
    fn node_added(&mut self, _node: &FileSystemNode) {}
}

/// What is known about a single path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metadata {
    /// Fully known location
    Snapshot(Arc<LocationSnapshot>),
    /// Known to be a directory; `children` lists the entries known to exist
    PartialDirectory {
        absolute_path: VfsPath,
        children: Vec<String>,
    },
}

impl Metadata {
    pub fn file_type(&self) -> FileType {
        match self {
            Metadata::Snapshot(snapshot) => snapshot.file_type(),
            Metadata::PartialDirectory { .. } => FileType::Directory,
        }
    }

    pub fn as_snapshot(&self) -> Option<&Arc<LocationSnapshot>> {
        match self {
            Metadata::Snapshot(snapshot) => Some(snapshot),
            Metadata::PartialDirectory { .. } => None,
        }
    }

    /// Names of entries known to exist below a directory
    pub fn child_names(&self) -> Vec<String> {
        match self {
            Metadata::Snapshot(snapshot) => snapshot
                .children()
                .iter()
                .filter(|child| child.file_type() != FileType::Missing)
                .map(|child| child.name().to_string())
                .collect(),
            Metadata::PartialDirectory { children, .. } => children.clone(),
        }
    }
}

fn empty_children() -> &'static Arc<ChildNodes> {
    static EMPTY: OnceLock<Arc<ChildNodes>> = OnceLock::new();
    EMPTY.get_or_init(|| Arc::new(ChildNodes::default()))
}

/// Immutable snapshot tree
#[derive(Debug, Clone)]
pub struct SnapshotHierarchy {
    root: FileSystemNode,
    case_sensitivity: CaseSensitivity,
}

impl SnapshotHierarchy {
    /// The empty hierarchy; all empty hierarchies share one root
    pub fn empty(case_sensitivity: CaseSensitivity) -> Self {
        Self {
            root: FileSystemNode::Unknown(Arc::clone(empty_children())),
            case_sensitivity,
        }
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    pub fn root_node(&self) -> &FileSystemNode {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Same root by reference, i.e. nothing changed between the two
    pub fn ptr_eq(&self, other: &SnapshotHierarchy) -> bool {
        self.root.ptr_eq(&other.root)
    }

    /// The tree node materialized exactly at `path`, if any
    pub fn node_at(&self, path: &VfsPath) -> Option<&FileSystemNode> {
        let mut node = &self.root;
        for segment in path.segments() {
            node = node.children()?.get(segment, self.case_sensitivity)?;
        }
        Some(node)
    }

    /// Look up what is known at `path`, descending segment by segment
    pub fn find_metadata(&self, path: &VfsPath) -> Option<Metadata> {
        let segments: Vec<&str> = path.segments().collect();
        let mut node = &self.root;
        for (depth, segment) in segments.iter().enumerate() {
            match node {
                FileSystemNode::Snapshot(snapshot) => {
                    return Some(Metadata::Snapshot(
                        snapshot.find_descendant(&segments[depth..], self.case_sensitivity),
                    ));
                }
                FileSystemNode::PartialDirectory(children) | FileSystemNode::Unknown(children) => {
                    node = children.get(segment, self.case_sensitivity)?;
                }
            }
        }

        match node {
            FileSystemNode::Snapshot(snapshot) => Some(Metadata::Snapshot(Arc::clone(snapshot))),
            FileSystemNode::PartialDirectory(children) => Some(Metadata::PartialDirectory {
                absolute_path: path.clone(),
                children: children
                    .iter()
                    .filter(|child| child.node.implies_existing())
                    .map(|child| child.name.to_string())
                    .collect(),
            }),
            FileSystemNode::Unknown(_) => None,
        }
    }

    /// Fully known snapshot at `path`; partial knowledge counts as a miss
    pub fn find_snapshot(&self, path: &VfsPath) -> Option<Arc<LocationSnapshot>> {
        match self.find_metadata(path)? {
            Metadata::Snapshot(snapshot) => Some(snapshot),
            Metadata::PartialDirectory { .. } => None,
        }
    }

    /// New hierarchy with `snapshot` stored at its absolute path
    ///
    /// Ancestors known as a different type (a file or missing location) are
    /// overwritten by partial directories. Storing at the root replaces the tree.
    pub fn store(
        &self,
        snapshot: Arc<LocationSnapshot>,
        diff: &mut dyn NodeDiffListener,
    ) -> SnapshotHierarchy {
        let location = snapshot.absolute_path().clone();
        let segments: Vec<&str> = location.segments().collect();
        let root = FileSystemNode::store(
            Some(&self.root),
            &segments,
            &snapshot,
            self.case_sensitivity,
            false,
            diff,
        );
        self.with_root(root)
    }

    /// New hierarchy without any knowledge at or below `path`
    pub fn invalidate(&self, path: &VfsPath, diff: &mut dyn NodeDiffListener) -> SnapshotHierarchy {
        let segments: Vec<&str> = path.segments().collect();
        match FileSystemNode::invalidate(&self.root, &segments, self.case_sensitivity, false, diff) {
            Some(root) => self.with_root(root),
            None => Self::empty(self.case_sensitivity),
        }
    }

    /// Every maximal fully known snapshot at or below `path`
    ///
    /// The sequence is computed lazily against this hierarchy; call again on a
    /// newer hierarchy to see later changes.
    pub fn root_snapshots_under(&self, path: &VfsPath) -> RootSnapshots {
        let segments: Vec<&str> = path.segments().collect();
        let mut node = &self.root;
        for (depth, segment) in segments.iter().enumerate() {
            match node {
                FileSystemNode::Snapshot(snapshot) => {
                    return RootSnapshots::single(
                        snapshot.find_descendant(&segments[depth..], self.case_sensitivity),
                    );
                }
                FileSystemNode::PartialDirectory(children) | FileSystemNode::Unknown(children) => {
                    match children.get(segment, self.case_sensitivity) {
                        Some(child) => node = child,
                        None => return RootSnapshots::empty(),
                    }
                }
            }
        }
        node.root_snapshots()
    }

    pub fn root_snapshots(&self) -> RootSnapshots {
        self.root.root_snapshots()
    }

    fn with_root(&self, root: FileSystemNode) -> SnapshotHierarchy {
        if root.ptr_eq(&self.root) {
            return self.clone();
        }
        if root.children().is_some_and(ChildNodes::is_empty) {
            return Self::empty(self.case_sensitivity);
        }
        SnapshotHierarchy {
            root,
            case_sensitivity: self.case_sensitivity,
        }
    }
}
