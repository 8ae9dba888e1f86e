//! Tree nodes of the snapshot hierarchy
//!
//! A node is one of:
//! - a complete [`LocationSnapshot`] (file, directory with all children, or missing)
//! - a partial directory: known to be a directory, some children known
//! - unknown: type not known, but some descendant is (e.g. a stored missing path)
//!
//! All operations are copy-on-write. Nodes off the mutated path are shared by
//! reference with the previous generation.

use crate::snapshot::{FileType, LocationSnapshot};
use crate::tree::path::CaseSensitivity;
use crate::tree::NodeDiffListener;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum FileSystemNode {
    Snapshot(Arc<LocationSnapshot>),
    PartialDirectory(Arc<ChildNodes>),
    Unknown(Arc<ChildNodes>),
}

/// Named child of a partial or unknown node
#[derive(Debug, Clone)]
pub struct ChildNode {
    /// Original-case segment
    pub name: Arc<str>,
    pub node: FileSystemNode,
}

/// Children sorted by the hierarchy's segment order
#[derive(Debug, Clone, Default)]
pub struct ChildNodes {
    entries: Vec<ChildNode>,
}

impl ChildNodes {
    pub fn iter(&self) -> std::slice::Iter<'_, ChildNode> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn search(&self, name: &str, case: CaseSensitivity) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|entry| case.compare(&entry.name, name))
    }

    pub fn get(&self, name: &str, case: CaseSensitivity) -> Option<&FileSystemNode> {
        self.search(name, case).ok().map(|idx| &self.entries[idx].node)
    }

    fn with_child(&self, name: &str, node: FileSystemNode, case: CaseSensitivity) -> ChildNodes {
        let mut entries = self.entries.clone();
        match self.search(name, case) {
            // Keep the case the entry was first seen with
            Ok(idx) => entries[idx].node = node,
            Err(idx) => entries.insert(
                idx,
                ChildNode {
                    name: Arc::from(name),
                    node,
                },
            ),
        }
        ChildNodes { entries }
    }

    fn without_child(&self, idx: usize) -> ChildNodes {
        let mut entries = self.entries.clone();
        entries.remove(idx);
        ChildNodes { entries }
    }

    fn single(name: &str, node: FileSystemNode) -> ChildNodes {
        ChildNodes {
            entries: vec![ChildNode {
                name: Arc::from(name),
                node,
            }],
        }
    }

    /// Children of a complete directory snapshot, minus the branch being replaced
    fn from_snapshot_children(
        snapshot: &LocationSnapshot,
        excluded: Option<&str>,
        case: CaseSensitivity,
        diff: &mut dyn NodeDiffListener,
    ) -> ChildNodes {
        let mut entries: Vec<ChildNode> = snapshot
            .children()
            .iter()
            .filter(|child| excluded.map_or(true, |name| !case.equals(child.name(), name)))
            .map(|child| {
                let node = FileSystemNode::Snapshot(Arc::clone(child));
                diff.node_added(&node);
                ChildNode {
                    name: Arc::from(child.name()),
                    node,
                }
            })
            .collect();
        entries.sort_by(|a, b| case.compare(&a.name, &b.name));
        ChildNodes { entries }
    }
}

impl FileSystemNode {
    /// Reference identity, used to detect untouched subtrees
    pub fn ptr_eq(&self, other: &FileSystemNode) -> bool {
        match (self, other) {
            (FileSystemNode::Snapshot(a), FileSystemNode::Snapshot(b)) => Arc::ptr_eq(a, b),
            (FileSystemNode::PartialDirectory(a), FileSystemNode::PartialDirectory(b))
            | (FileSystemNode::Unknown(a), FileSystemNode::Unknown(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_snapshot(&self) -> Option<&Arc<LocationSnapshot>> {
        match self {
            FileSystemNode::Snapshot(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&ChildNodes> {
        match self {
            FileSystemNode::PartialDirectory(children) | FileSystemNode::Unknown(children) => {
                Some(children)
            }
            FileSystemNode::Snapshot(_) => None,
        }
    }

    /// An unknown node without children carries no information
    pub fn is_empty(&self) -> bool {
        matches!(self, FileSystemNode::Unknown(children) if children.is_empty())
    }

    /// Whether this node's presence proves its parent is a directory
    pub fn implies_existing(&self) -> bool {
        match self {
            FileSystemNode::Snapshot(snapshot) => snapshot.file_type() != FileType::Missing,
            FileSystemNode::PartialDirectory(_) => true,
            FileSystemNode::Unknown(_) => false,
        }
    }

    /// Maximal complete snapshots at or below this node, lazily
    pub fn root_snapshots(&self) -> RootSnapshots {
        RootSnapshots {
            stack: vec![self.clone()],
        }
    }

    fn with_children(children: ChildNodes, known_directory: bool) -> FileSystemNode {
        let implies_directory = known_directory || children.iter().any(|c| c.node.implies_existing());
        if implies_directory {
            FileSystemNode::PartialDirectory(Arc::new(children))
        } else {
            FileSystemNode::Unknown(Arc::new(children))
        }
    }

    /// Store `snapshot` at `segments` relative to this position.
    ///
    /// `covered` is set while rebuilding the inside of a complete snapshot that
    /// was already reported as removed; nodes in there get no removal event.
    pub(crate) fn store(
        existing: Option<&FileSystemNode>,
        segments: &[&str],
        snapshot: &Arc<LocationSnapshot>,
        case: CaseSensitivity,
        covered: bool,
        diff: &mut dyn NodeDiffListener,
    ) -> FileSystemNode {
        let Some((first, rest)) = segments.split_first() else {
            if let Some(existing) = existing {
                if let FileSystemNode::Snapshot(current) = existing {
                    if Arc::ptr_eq(current, snapshot) || **current == **snapshot {
                        return existing.clone();
                    }
                }
                if !covered && !existing.is_empty() {
                    diff.node_removed(existing);
                }
            }
            let stored = FileSystemNode::Snapshot(Arc::clone(snapshot));
            diff.node_added(&stored);
            return stored;
        };

        match existing {
            None => {
                let child = Self::store(None, rest, snapshot, case, covered, diff);
                Self::with_children(ChildNodes::single(first, child), false)
            }
            Some(node @ (FileSystemNode::PartialDirectory(children) | FileSystemNode::Unknown(children))) => {
                let existing_child = children.get(first, case);
                let child = Self::store(existing_child, rest, snapshot, case, covered, diff);
                if existing_child.is_some_and(|c| c.ptr_eq(&child)) {
                    return node.clone();
                }
                let known_directory = matches!(node, FileSystemNode::PartialDirectory(_));
                Self::with_children(children.with_child(first, child, case), known_directory)
            }
            Some(node @ FileSystemNode::Snapshot(current)) => {
                let implied = current.find_descendant(segments, case);
                let consistent = Arc::ptr_eq(&implied, snapshot)
                    || *implied == **snapshot
                    || (snapshot.file_type() == FileType::Missing
                        && implied.file_type() == FileType::Missing);
                if consistent {
                    return node.clone();
                }

                // Split the complete snapshot to make room for the new one
                if !covered {
                    diff.node_removed(node);
                }
                let siblings = ChildNodes::from_snapshot_children(current, Some(first), case, diff);
                let branch = current
                    .children()
                    .iter()
                    .find(|child| case.equals(child.name(), first))
                    .map(|child| FileSystemNode::Snapshot(Arc::clone(child)));
                let child = Self::store(branch.as_ref(), rest, snapshot, case, true, diff);
                let known_directory = current.file_type() == FileType::Directory;
                Self::with_children(siblings.with_child(first, child, case), known_directory)
            }
        }
    }

    /// Forget everything at and below `segments` relative to this position.
    ///
    /// Returns `None` when nothing worth keeping remains at this position.
    pub(crate) fn invalidate(
        existing: &FileSystemNode,
        segments: &[&str],
        case: CaseSensitivity,
        covered: bool,
        diff: &mut dyn NodeDiffListener,
    ) -> Option<FileSystemNode> {
        let Some((first, rest)) = segments.split_first() else {
            if !covered && !existing.is_empty() {
                diff.node_removed(existing);
            }
            return None;
        };

        match existing {
            FileSystemNode::PartialDirectory(children) | FileSystemNode::Unknown(children) => {
                let Ok(idx) = children.search(first, case) else {
                    return Some(existing.clone());
                };
                let child = &children.entries[idx].node;
                let known_directory = matches!(existing, FileSystemNode::PartialDirectory(_));
                match Self::invalidate(child, rest, case, covered, diff) {
                    Some(new_child) if new_child.ptr_eq(child) => Some(existing.clone()),
                    Some(new_child) => Some(Self::with_children(
                        children.with_child(first, new_child, case),
                        known_directory,
                    )),
                    None => {
                        let remaining = children.without_child(idx);
                        if !known_directory && remaining.is_empty() {
                            None
                        } else {
                            Some(Self::with_children(remaining, known_directory))
                        }
                    }
                }
            }
            FileSystemNode::Snapshot(current) => {
                if !covered {
                    diff.node_removed(existing);
                }
                if current.file_type() != FileType::Directory {
                    // A file or missing location vouches for everything below it
                    return None;
                }
                let siblings = ChildNodes::from_snapshot_children(current, Some(first), case, diff);
                let branch = current
                    .children()
                    .iter()
                    .find(|child| case.equals(child.name(), first))
                    .map(|child| FileSystemNode::Snapshot(Arc::clone(child)));
                let children = match branch {
                    Some(branch) => match Self::invalidate(&branch, rest, case, true, diff) {
                        Some(kept) => siblings.with_child(first, kept, case),
                        None => siblings,
                    },
                    None => siblings,
                };
                Some(FileSystemNode::PartialDirectory(Arc::new(children)))
            }
        }
    }
}

/// Lazy depth-first walk yielding maximal complete snapshots
pub struct RootSnapshots {
    stack: Vec<FileSystemNode>,
}

impl RootSnapshots {
    pub(crate) fn empty() -> Self {
        RootSnapshots { stack: Vec::new() }
    }

    pub(crate) fn single(snapshot: Arc<LocationSnapshot>) -> Self {
        RootSnapshots {
            stack: vec![FileSystemNode::Snapshot(snapshot)],
        }
    }
}

impl Iterator for RootSnapshots {
    type Item = Arc<LocationSnapshot>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                FileSystemNode::Snapshot(snapshot) => return Some(snapshot),
                FileSystemNode::PartialDirectory(children) | FileSystemNode::Unknown(children) => {
                    // Reverse so children come out in sorted order
                    self.stack
                        .extend(children.iter().rev().map(|child| child.node.clone()));
                }
            }
        }
        None
    }
}
