//! File Watching
//!
//! Keeps the virtual file system honest between builds. A `notify` watcher
//! reports changes below the registered hierarchies; a worker thread groups
//! them into short batches and invalidates the affected locations. Changes to
//! locations the running build wrote itself are skipped. When the watcher
//! reports an error, watching stops and all cached state is dropped, since
//! changes may have been missed.

pub mod handler;
pub mod written;

use crate::error::VfsError;
use crate::tree::path::VfsPath;
use crate::vfs::VirtualFileSystem;
use handler::{ChangeKind, FileChange, VfsChangeHandler};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::mem;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use written::WrittenLocations;

/// Watcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period after the last event before a batch is applied
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,

    /// A batch is applied as soon as it holds this many changes
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

pub(crate) fn default_batch_window_ms() -> u64 {
    50
}

pub(crate) fn default_max_batch_size() -> usize {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            batch_window_ms: default_batch_window_ms(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

/// What a single watcher event means for the cache
#[derive(Debug, PartialEq, Eq)]
enum Converted {
    Changes(Vec<FileChange>),
    /// The watcher dropped events and asks for a rescan
    LostState,
    Ignored,
}

fn convert_event(event: &Event) -> Converted {
    if event.need_rescan() {
        return Converted::LostState;
    }
    let kind = match event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Removed,
        // Renames list both ends; each is a change
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => ChangeKind::Modified,
        EventKind::Access(_) => return Converted::Ignored,
    };

    let mut changes = Vec::with_capacity(event.paths.len());
    for path in &event.paths {
        match VfsPath::from_path(path) {
            Ok(path) => changes.push(FileChange::new(kind, path)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Cannot track change to unsupported path");
                return Converted::LostState;
            }
        }
    }
    if changes.is_empty() {
        Converted::Ignored
    } else {
        Converted::Changes(changes)
    }
}

/// Watches hierarchies and invalidates a [`VirtualFileSystem`] on change
pub struct FileWatcher {
    watcher: Mutex<Option<RecommendedWatcher>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    handler: Arc<VfsChangeHandler>,
    watched: Mutex<Vec<VfsPath>>,
}

impl FileWatcher {
    /// Start the watcher and its worker thread; nothing is watched yet
    pub fn start(
        vfs: Arc<VirtualFileSystem>,
        written: Arc<WrittenLocations>,
        config: &WatchConfig,
    ) -> Result<Self, VfsError> {
        let handler = Arc::new(VfsChangeHandler::new(vfs, written));

        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(move |res| {
            // The receiver is gone once the worker stopped
            let _ = tx.send(res);
        })?;

        let worker = {
            let handler = Arc::clone(&handler);
            let batch_window = Duration::from_millis(config.batch_window_ms.max(1));
            let max_batch_size = config.max_batch_size.max(1);
            thread::Builder::new()
                .name("snapvfs-watch".to_string())
                .spawn(move || process_events(rx, &handler, batch_window, max_batch_size))
                .map_err(|e| VfsError::io("snapvfs-watch", e))?
        };

        Ok(Self {
            watcher: Mutex::new(Some(watcher)),
            worker: Mutex::new(Some(worker)),
            handler,
            watched: Mutex::new(Vec::new()),
        })
    }

    /// Watch `hierarchy` and everything below it
    pub fn watch(&self, hierarchy: &VfsPath) -> Result<(), VfsError> {
        let mut watcher = self.watcher.lock();
        let Some(watcher) = watcher.as_mut() else {
            return Err(VfsError::ConfigError("File watching has been stopped".to_string()));
        };
        if let Err(err) = watcher.watch(&hierarchy.to_path_buf(), RecursiveMode::Recursive) {
            warn!(hierarchy = %hierarchy, error = %err, "Unable to watch the file system for changes");
            return Err(err.into());
        }
        info!(hierarchy = %hierarchy, "Watching hierarchy");
        self.watched.lock().push(hierarchy.clone());
        Ok(())
    }

    pub fn watched_hierarchies(&self) -> Vec<VfsPath> {
        self.watched.lock().clone()
    }

    /// False once stopped explicitly or after a watching error
    pub fn is_watching(&self) -> bool {
        self.watcher.lock().is_some() && !self.handler.is_stopped()
    }

    pub fn handler(&self) -> &Arc<VfsChangeHandler> {
        &self.handler
    }

    /// Stop watching; changes already received are still applied
    pub fn stop(&self) {
        // Dropping the watcher disconnects the worker's channel
        let watcher = self.watcher.lock().take();
        if watcher.is_none() {
            return;
        }
        drop(watcher);
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!("File watching worker panicked");
            }
        }
        self.watched.lock().clear();
        debug!("Stopped file watching");
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("watching", &self.is_watching())
            .field("watched", &*self.watched.lock())
            .finish()
    }
}

fn process_events(
    rx: Receiver<notify::Result<Event>>,
    handler: &VfsChangeHandler,
    batch_window: Duration,
    max_batch_size: usize,
) {
    let mut pending: Vec<FileChange> = Vec::new();
    loop {
        let received = if pending.is_empty() {
            rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
        } else {
            rx.recv_timeout(batch_window)
        };

        match received {
            Ok(Ok(event)) => match convert_event(&event) {
                Converted::Changes(changes) => {
                    pending.extend(changes);
                    if pending.len() >= max_batch_size {
                        handler.handle_changes(&mem::take(&mut pending));
                    }
                }
                Converted::LostState => {
                    pending.clear();
                    handler.state_lost();
                }
                Converted::Ignored => {}
            },
            Ok(Err(err)) => {
                handler.stop_after_error(&err.to_string());
                return;
            }
            Err(RecvTimeoutError::Timeout) => {
                handler.handle_changes(&mem::take(&mut pending));
            }
            Err(RecvTimeoutError::Disconnected) => {
                handler.handle_changes(&pending);
                return;
            }
        }
    }
}
