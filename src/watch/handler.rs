//! Turns batches of file system changes into invalidations

use super::written::WrittenLocations;
use crate::tree::path::VfsPath;
use crate::vfs::VirtualFileSystem;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => f.write_str("created"),
            ChangeKind::Modified => f.write_str("modified"),
            ChangeKind::Removed => f.write_str("removed"),
        }
    }
}

/// One reported change to one location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileChange {
    pub kind: ChangeKind,
    pub path: VfsPath,
}

impl FileChange {
    pub fn new(kind: ChangeKind, path: VfsPath) -> Self {
        Self { kind, path }
    }
}

/// Applies watcher output to a [`VirtualFileSystem`]
///
/// Once a watching error was reported, the handler is stopped for good and
/// ignores everything that still arrives.
#[derive(Debug)]
pub struct VfsChangeHandler {
    vfs: Arc<VirtualFileSystem>,
    written: Arc<WrittenLocations>,
    stopped: AtomicBool,
    received: AtomicU64,
}

impl VfsChangeHandler {
    pub fn new(vfs: Arc<VirtualFileSystem>, written: Arc<WrittenLocations>) -> Self {
        Self {
            vfs,
            written,
            stopped: AtomicBool::new(false),
            received: AtomicU64::new(0),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Number of changes received so far, including filtered ones
    pub fn received_changes(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Invalidate every changed location the running build did not write
    ///
    /// Returns whether cached knowledge was dropped.
    pub fn handle_changes(&self, changes: &[FileChange]) -> bool {
        if changes.is_empty() || self.is_stopped() {
            return false;
        }
        self.received.fetch_add(changes.len() as u64, Ordering::Relaxed);

        let relevant: Vec<&FileChange> = changes
            .iter()
            .filter(|change| self.written.should_watch(&change.path))
            .collect();
        if relevant.is_empty() {
            debug!(changes = changes.len(), "Ignoring changes to locations written by the build");
            return false;
        }

        let paths: Vec<VfsPath> = relevant.iter().map(|change| change.path.clone()).collect();
        let changed = self.vfs.invalidate(&paths);
        if changed {
            match relevant.as_slice() {
                [single] => debug!(kind = %single.kind, path = %single.path, "Handling VFS change"),
                _ => debug!(changes = relevant.len(), "Handling VFS changes"),
            }
        }
        changed
    }

    /// The watcher may have missed events; nothing cached can be trusted
    pub fn state_lost(&self) {
        if self.is_stopped() {
            return;
        }
        warn!("Dropped VFS state due to lost state");
        self.vfs.invalidate_all();
    }

    /// Stop handling changes and drop all cached state
    pub fn stop_after_error(&self, reason: &str) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        error!(reason, "Stopping file watching and invalidating VFS after an error happened");
        self.vfs.invalidate_all();
    }
}
