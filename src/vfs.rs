//! Virtual File System state holder
//!
//! Holds the current [`SnapshotHierarchy`] and [`VersionHierarchy`] as one
//! immutable [`VfsState`] behind a single atomic slot. Readers load the slot's
//! `Arc` without locking and work on that generation. Writers build the next
//! generation from the one they read and publish it with a compare-and-swap;
//! a lost swap is recomputed against the newer state.

pub mod diff;

use crate::snapshot::LocationSnapshot;
use crate::tree::node::RootSnapshots;
use crate::tree::path::{CaseSensitivity, VfsPath};
use crate::tree::version::VersionHierarchy;
use crate::tree::{Metadata, SnapshotHierarchy};
use crate::types::Version;
use arc_swap::ArcSwap;
use diff::{DiffNotifier, RecordingDiffListener, VfsListener};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// One committed generation of the cache
#[derive(Debug, Clone)]
pub struct VfsState {
    pub hierarchy: SnapshotHierarchy,
    pub versions: VersionHierarchy,
    /// Commit counter, used to order diff delivery
    pub sequence: u64,
}

/// Process-wide snapshot cache
///
/// Any number of threads may read, store, and invalidate concurrently.
#[derive(Debug)]
pub struct VirtualFileSystem {
    state: ArcSwap<VfsState>,
    notifier: DiffNotifier,
    case_sensitivity: CaseSensitivity,
}

impl VirtualFileSystem {
    pub fn new(case_sensitivity: CaseSensitivity) -> Self {
        Self {
            state: ArcSwap::from_pointee(VfsState {
                hierarchy: SnapshotHierarchy::empty(case_sensitivity),
                versions: VersionHierarchy::empty(case_sensitivity),
                sequence: 0,
            }),
            notifier: DiffNotifier::new(),
            case_sensitivity,
        }
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case_sensitivity
    }

    /// The most recently committed state
    pub fn load(&self) -> Arc<VfsState> {
        self.state.load_full()
    }

    /// The most recently committed hierarchy
    pub fn current_root(&self) -> SnapshotHierarchy {
        self.load().hierarchy.clone()
    }

    pub fn find_metadata(&self, path: &VfsPath) -> Option<Metadata> {
        self.load().hierarchy.find_metadata(path)
    }

    pub fn find_snapshot(&self, path: &VfsPath) -> Option<Arc<LocationSnapshot>> {
        self.load().hierarchy.find_snapshot(path)
    }

    pub fn root_snapshots_under(&self, path: &VfsPath) -> RootSnapshots {
        self.load().hierarchy.root_snapshots_under(path)
    }

    pub fn version_of(&self, path: &VfsPath) -> Version {
        self.load().versions.get_version(path)
    }

    pub fn add_listener(&self, listener: Arc<dyn VfsListener>) {
        self.notifier.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn VfsListener>) -> bool {
        self.notifier.remove_listener(listener)
    }

    /// Store the snapshot produced by `supplier` at `path`
    ///
    /// See [`VirtualFileSystem::try_store`].
    pub fn store<F>(&self, path: &VfsPath, supplier: F) -> Arc<LocationSnapshot>
    where
        F: FnOnce() -> LocationSnapshot,
    {
        match self.try_store(path, || Ok::<_, Infallible>(supplier())) {
            Ok(snapshot) => snapshot,
            Err(never) => match never {},
        }
    }

    /// Store the snapshot produced by a fallible `supplier` at `path`
    ///
    /// The supplier runs exactly once and outside of any lock. If `path` was
    /// invalidated while it ran, the snapshot is returned without being cached.
    /// Supplier errors are returned unchanged and leave the cache untouched.
    pub fn try_store<F, E>(&self, path: &VfsPath, supplier: F) -> Result<Arc<LocationSnapshot>, E>
    where
        F: FnOnce() -> Result<LocationSnapshot, E>,
    {
        let version_before = self.version_of(path);
        let snapshot = Arc::new(supplier()?);
        debug_assert!(
            self.case_sensitivity
                .equals(path.as_str(), snapshot.absolute_path().as_str()),
            "snapshot for {} stored at {}",
            snapshot.absolute_path(),
            path
        );

        loop {
            let current = self.load();
            if current.versions.get_version(path) != version_before {
                debug!(path = %path, "Discarding snapshot invalidated while it was computed");
                return Ok(snapshot);
            }

            let mut recorder = RecordingDiffListener::new();
            let hierarchy = current.hierarchy.store(Arc::clone(&snapshot), &mut recorder);
            if hierarchy.ptr_eq(&current.hierarchy) {
                trace!(path = %path, "Snapshot already cached");
                return Ok(snapshot);
            }

            let next = VfsState {
                hierarchy,
                versions: current.versions.clone(),
                sequence: current.sequence + 1,
            };
            if self.commit(&current, next, recorder) {
                return Ok(snapshot);
            }
            debug!(path = %path, "Lost compare-and-swap, retrying store");
        }
    }

    /// Forget everything at and below each of `paths`
    ///
    /// Returns whether any cached knowledge was dropped. Versions are bumped
    /// either way.
    pub fn invalidate(&self, paths: &[VfsPath]) -> bool {
        if paths.is_empty() {
            return false;
        }
        loop {
            let current = self.load();
            let mut recorder = RecordingDiffListener::new();
            let mut hierarchy = current.hierarchy.clone();
            let mut versions = current.versions.clone();
            for path in paths {
                hierarchy = hierarchy.invalidate(path, &mut recorder);
                versions = versions.update_version(path);
            }

            let next = VfsState {
                hierarchy,
                versions,
                sequence: current.sequence + 1,
            };
            let changed = !recorder.is_empty();
            if self.commit(&current, next, recorder) {
                trace!(paths = paths.len(), changed, "Invalidated");
                return changed;
            }
            debug!(paths = paths.len(), "Lost compare-and-swap, retrying invalidation");
        }
    }

    /// Forget everything
    pub fn invalidate_all(&self) {
        info!("Invalidating all cached file system state");
        self.invalidate(&[VfsPath::root()]);
    }

    /// Publish `next` if `expected` is still current, then deliver its events
    fn commit(&self, expected: &Arc<VfsState>, next: VfsState, recorder: RecordingDiffListener) -> bool {
        let sequence = next.sequence;
        let previous = self.state.compare_and_swap(expected, Arc::new(next));
        if !Arc::ptr_eq(&*previous, expected) {
            return false;
        }
        self.notifier.deliver(sequence, recorder.into_events());
        true
    }
}
