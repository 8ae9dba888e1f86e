//! Disk probe: turns a location on disk into a [`LocationSnapshot`]
//!
//! Directories are listed one level at a time with `walkdir`, sorted by file
//! name, and recursed into so every directory snapshot is complete. Symbolic
//! links are followed; entries reached through one are marked
//! [`AccessType::ViaSymlink`] and directory cycles are skipped.

use crate::access::SnapshotProbe;
use crate::error::VfsError;
use crate::snapshot::excludes::DefaultExcludes;
use crate::snapshot::{hasher, AccessType, FileMetadata, LocationSnapshot, MissingSnapshot};
use crate::tree::path::VfsPath;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, instrument, trace, warn};
use walkdir::WalkDir;

/// Walker configuration
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Whether to follow symbolic links (default: true)
    pub follow_symlinks: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: true,
        }
    }
}

/// Default [`SnapshotProbe`] backed by the real file system
#[derive(Debug, Clone, Default)]
pub struct DirectorySnapshotter {
    config: WalkerConfig,
}

impl DirectorySnapshotter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WalkerConfig) -> Self {
        Self { config }
    }

    /// Snapshot whatever is at `location` right now
    #[instrument(skip(self, excludes), fields(location = %location))]
    pub fn snapshot_location(
        &self,
        location: &VfsPath,
        excludes: &DefaultExcludes,
    ) -> Result<LocationSnapshot, VfsError> {
        let path = location.to_path_buf();
        let Some((metadata, access_type)) = self.resolve(&path)? else {
            trace!("Location is missing");
            return Ok(LocationSnapshot::missing(location.clone()));
        };

        if metadata.is_dir() {
            let mut ancestors = Vec::new();
            let snapshot = self
                .snapshot_directory(location, access_type, excludes, &mut ancestors)?
                .unwrap_or_else(|| LocationSnapshot::missing(location.clone()));
            debug!(
                hash = %hex::encode(snapshot.hash()),
                children = snapshot.children().len(),
                "Snapshotted directory"
            );
            Ok(snapshot)
        } else {
            snapshot_file(location, &metadata, access_type)
        }
    }

    /// Stat a path, following a symlink when configured.
    ///
    /// Returns `None` if nothing is there (including dangling links).
    fn resolve(&self, path: &Path) -> Result<Option<(Metadata, AccessType)>, VfsError> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(VfsError::io(path, e)),
        };
        if !metadata.file_type().is_symlink() {
            return Ok(Some((metadata, AccessType::Direct)));
        }
        if !self.config.follow_symlinks {
            return Ok(Some((metadata, AccessType::Direct)));
        }
        match fs::metadata(path) {
            Ok(target) => Ok(Some((target, AccessType::ViaSymlink))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VfsError::io(path, e)),
        }
    }

    /// Returns `None` when the directory is already being walked further up (a link cycle)
    fn snapshot_directory(
        &self,
        location: &VfsPath,
        access_type: AccessType,
        excludes: &DefaultExcludes,
        ancestors: &mut Vec<PathBuf>,
    ) -> Result<Option<LocationSnapshot>, VfsError> {
        let canonical = dunce::canonicalize(location).map_err(|e| VfsError::io(location, e))?;
        if ancestors.contains(&canonical) {
            warn!(location = %location, "Skipping symlink cycle");
            return Ok(None);
        }
        ancestors.push(canonical);

        let mut children = Vec::new();
        let entries = WalkDir::new(location)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in entries {
            let entry = entry.map_err(|e| walk_error(location.as_ref(), e))?;
            let Some(name) = entry.file_name().to_str() else {
                warn!(path = %entry.path().display(), "Skipping entry with non UTF-8 name");
                continue;
            };
            let child_location = location.join(name);

            let resolved = if entry.file_type().is_symlink() {
                self.resolve(entry.path())?
            } else {
                let metadata = entry.metadata().map_err(|e| walk_error(entry.path(), e))?;
                Some((metadata, AccessType::Direct))
            };

            let Some((metadata, child_access)) = resolved else {
                // Dangling symlink
                if !excludes.exclude_file(name) {
                    children.push(Arc::new(LocationSnapshot::Missing(MissingSnapshot {
                        absolute_path: child_location,
                        access_type: AccessType::ViaSymlink,
                    })));
                }
                continue;
            };

            if metadata.is_dir() {
                if excludes.exclude_dir(name) {
                    continue;
                }
                if let Some(dir) =
                    self.snapshot_directory(&child_location, child_access, excludes, ancestors)?
                {
                    children.push(Arc::new(dir));
                }
            } else {
                if excludes.exclude_file(name) {
                    continue;
                }
                children.push(Arc::new(snapshot_file(
                    &child_location,
                    &metadata,
                    child_access,
                )?));
            }
        }

        ancestors.pop();
        Ok(Some(LocationSnapshot::directory(
            location.clone(),
            children,
            access_type,
        )))
    }
}

impl SnapshotProbe for DirectorySnapshotter {
    fn snapshot(
        &self,
        location: &VfsPath,
        excludes: &DefaultExcludes,
    ) -> Result<LocationSnapshot, VfsError> {
        self.snapshot_location(location, excludes)
    }
}

fn snapshot_file(
    location: &VfsPath,
    metadata: &Metadata,
    access_type: AccessType,
) -> Result<LocationSnapshot, VfsError> {
    let content_hash = hasher::hash_file(location.as_ref()).map_err(|e| VfsError::io(location, e))?;
    let last_modified = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    trace!(path = %location, hash = %hex::encode(content_hash), "Hashed file");
    Ok(LocationSnapshot::regular_file(
        location.clone(),
        content_hash,
        FileMetadata {
            length: metadata.len(),
            last_modified,
            access_type,
        },
    ))
}

fn walk_error(fallback: &Path, err: walkdir::Error) -> VfsError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf());
    VfsError::io(path, io::Error::from(err))
}
