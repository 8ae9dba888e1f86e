//! File System Access
//!
//! The façade build logic talks to. Reads are answered from the virtual file
//! system when possible and otherwise probed from disk at most once at a time
//! per location. Writes invalidate the affected locations before touching disk,
//! so nothing taken afterwards is served from a pre-write entry.

pub mod striped;

use crate::config::VfsConfig;
use crate::error::VfsError;
use crate::snapshot::excludes::DefaultExcludes;
use crate::snapshot::walker::DirectorySnapshotter;
use crate::snapshot::LocationSnapshot;
use crate::tree::path::{CaseSensitivity, VfsPath};
use crate::vfs::VirtualFileSystem;
use parking_lot::RwLock;
use std::fs;
use std::sync::Arc;
use striped::StripedLock;
use tracing::{info, trace};

/// Produces the current snapshot of a location on disk
pub trait SnapshotProbe: Send + Sync {
    fn snapshot(
        &self,
        location: &VfsPath,
        excludes: &DefaultExcludes,
    ) -> Result<LocationSnapshot, VfsError>;
}

impl<F> SnapshotProbe for F
where
    F: Fn(&VfsPath, &DefaultExcludes) -> Result<LocationSnapshot, VfsError> + Send + Sync,
{
    fn snapshot(
        &self,
        location: &VfsPath,
        excludes: &DefaultExcludes,
    ) -> Result<LocationSnapshot, VfsError> {
        self(location, excludes)
    }
}

/// Told about locations right before they are written
pub trait WriteListener: Send + Sync {
    fn locations_written(&self, locations: &[VfsPath]);
}

pub struct FileSystemAccess<P: SnapshotProbe = DirectorySnapshotter> {
    vfs: Arc<VirtualFileSystem>,
    probe: P,
    locks: StripedLock,
    default_excludes: RwLock<Arc<DefaultExcludes>>,
    write_listener: Option<Arc<dyn WriteListener>>,
}

impl FileSystemAccess<DirectorySnapshotter> {
    /// Wire a fresh virtual file system and the disk probe from configuration
    pub fn from_config(config: &VfsConfig) -> Result<Self, VfsError> {
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            VfsError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;
        let case_sensitivity = config
            .case_sensitivity
            .unwrap_or_else(CaseSensitivity::for_current_platform);
        Ok(Self::new(
            Arc::new(VirtualFileSystem::new(case_sensitivity)),
            DirectorySnapshotter::new(),
            DefaultExcludes::new(&config.default_excludes),
            config.lock_stripes,
        ))
    }
}

impl<P: SnapshotProbe> FileSystemAccess<P> {
    pub fn new(
        vfs: Arc<VirtualFileSystem>,
        probe: P,
        default_excludes: DefaultExcludes,
        lock_stripes: usize,
    ) -> Self {
        let locks = StripedLock::new(lock_stripes, vfs.case_sensitivity());
        Self {
            vfs,
            probe,
            locks,
            default_excludes: RwLock::new(Arc::new(default_excludes)),
            write_listener: None,
        }
    }

    pub fn with_write_listener(mut self, listener: Arc<dyn WriteListener>) -> Self {
        self.write_listener = Some(listener);
        self
    }

    pub fn virtual_file_system(&self) -> &Arc<VirtualFileSystem> {
        &self.vfs
    }

    pub fn default_excludes(&self) -> Arc<DefaultExcludes> {
        Arc::clone(&*self.default_excludes.read())
    }

    /// Snapshot of `location`, from the cache or probed from disk
    pub fn read(&self, location: &VfsPath) -> Result<Arc<LocationSnapshot>, VfsError> {
        if let Some(snapshot) = self.vfs.find_snapshot(location) {
            trace!(location = %location, "Snapshot cache hit");
            return Ok(snapshot);
        }

        let _guard = self.locks.lock(location);
        // Another thread may have probed while we waited for the stripe
        if let Some(snapshot) = self.vfs.find_snapshot(location) {
            trace!(location = %location, "Snapshot cache hit after wait");
            return Ok(snapshot);
        }

        trace!(location = %location, "Snapshot cache miss");
        self.vfs.try_store(location, || {
            let excludes = self.default_excludes();
            self.probe.snapshot(location, &excludes)
        })
    }

    /// Like [`FileSystemAccess::read`], restricted to entries accepted by `filter`
    ///
    /// The unfiltered snapshot is what gets cached. Returns `None` when the
    /// location itself is rejected or missing.
    pub fn read_filtered(
        &self,
        location: &VfsPath,
        filter: &dyn Fn(&LocationSnapshot) -> bool,
    ) -> Result<Option<LocationSnapshot>, VfsError> {
        let snapshot = self.read(location)?;
        Ok(snapshot.filtered(filter))
    }

    /// Invalidate `locations`, then run `action`
    pub fn write<T, E, F>(&self, locations: &[VfsPath], action: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(listener) = &self.write_listener {
            listener.locations_written(locations);
        }
        self.vfs.invalidate(locations);
        action()
    }

    /// Seed the cache with a snapshot taken elsewhere
    pub fn record(&self, snapshot: LocationSnapshot) -> Arc<LocationSnapshot> {
        let location = snapshot.absolute_path().clone();
        self.vfs.store(&location, || snapshot)
    }

    /// Rename `from` to `to` and carry the cached knowledge along
    pub fn move_atomically(&self, from: &VfsPath, to: &VfsPath) -> Result<(), VfsError> {
        let snapshot = self.read(from)?;
        self.write(&[from.clone(), to.clone()], || {
            fs::rename(from, to).map_err(|e| VfsError::io(from, e))
        })?;
        self.record(snapshot.relocated(to));
        Ok(())
    }

    pub fn invalidate(&self, locations: &[VfsPath]) {
        self.vfs.invalidate(locations);
    }

    pub fn invalidate_all(&self) {
        self.vfs.invalidate_all();
    }

    /// Replace the exclude patterns; the cache is cleared if they changed
    pub fn update_default_excludes<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let excludes = DefaultExcludes::new(patterns);
        {
            let mut current = self.default_excludes.write();
            if **current == excludes {
                return;
            }
            info!(patterns = ?excludes.patterns(), "Default excludes changed");
            *current = Arc::new(excludes);
        }
        self.vfs.invalidate_all();
    }
}

impl<P: SnapshotProbe> std::fmt::Debug for FileSystemAccess<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSystemAccess")
            .field("vfs", &self.vfs)
            .field("locks", &self.locks)
            .field("default_excludes", &*self.default_excludes.read())
            .finish_non_exhaustive()
    }
}
