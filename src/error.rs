//! Error types for the snapshot cache.
//!
//! Races between writers (stale snapshots, lost compare-and-swap attempts) are
//! resolved internally and never show up here.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the virtual file system and its collaborators
#[derive(Debug, Error)]
pub enum VfsError {
    /// The caller handed over a path that is not absolute or cannot be normalized.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Probing or mutating the real file system failed. Never cached.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File watching error: {0}")]
    Watch(#[from] notify::Error),
}

impl VfsError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        VfsError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<config::ConfigError> for VfsError {
    fn from(err: config::ConfigError) -> Self {
        VfsError::ConfigError(err.to_string())
    }
}
