//! Snapvfs: Concurrent File System Snapshot Cache
//!
//! An in-memory, copy-on-write map from absolute paths to immutable snapshots
//! of what is on disk, kept current while many threads read, probe, and write
//! the file tree of a long-lived build process.

pub mod access;
pub mod config;
pub mod error;
pub mod logging;
pub mod snapshot;
pub mod tree;
pub mod types;
pub mod vfs;
pub mod watch;

pub use access::{FileSystemAccess, SnapshotProbe, WriteListener};
pub use error::VfsError;
pub use snapshot::LocationSnapshot;
pub use tree::path::{CaseSensitivity, VfsPath};
pub use tree::{Metadata, SnapshotHierarchy};
pub use vfs::VirtualFileSystem;
pub use watch::written::WrittenLocations;
pub use watch::{FileWatcher, WatchConfig};
