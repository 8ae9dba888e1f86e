//! Diff notification
//!
//! Tree mutations report structural changes into a [`RecordingDiffListener`].
//! Only when the owning compare-and-swap commits are the recorded events handed
//! to the [`DiffNotifier`], which replays them to every registered
//! [`VfsListener`] in commit order. Events from losing attempts are dropped
//! with their recorder.

use crate::snapshot::LocationSnapshot;
use crate::tree::node::FileSystemNode;
use crate::tree::NodeDiffListener;
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::Arc;
use tracing::trace;

/// A single buffered structural change
#[derive(Debug, Clone)]
pub enum DiffEvent {
    Added(FileSystemNode),
    Removed(FileSystemNode),
}

/// Buffers events of one mutation attempt, in order
#[derive(Debug, Default)]
pub struct RecordingDiffListener {
    events: Vec<DiffEvent>,
}

impl RecordingDiffListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[DiffEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<DiffEvent> {
        self.events
    }

    /// Replay the buffered events, in recording order
    pub fn replay_into(&self, target: &mut dyn NodeDiffListener) {
        for event in &self.events {
            match event {
                DiffEvent::Added(node) => target.node_added(node),
                DiffEvent::Removed(node) => target.node_removed(node),
            }
        }
    }
}

impl NodeDiffListener for RecordingDiffListener {
    fn node_removed(&mut self, node: &FileSystemNode) {
        self.events.push(DiffEvent::Removed(node.clone()));
    }

    fn node_added(&mut self, node: &FileSystemNode) {
        self.events.push(DiffEvent::Added(node.clone()));
    }
}

/// Outward listener interface, called after a change is committed
///
/// Callbacks run on the committing thread. They must not mutate the virtual
/// file system they are registered with.
pub trait VfsListener: Send + Sync {
    fn node_removed(&self, node: &FileSystemNode);
    fn node_added(&self, node: &FileSystemNode);
}

/// Aggregates a batch of events into removed and added maximal snapshots
///
/// A snapshot that is removed and then re-added unchanged cancels out.
#[derive(Debug, Default)]
pub struct SnapshotCollectingDiffListener {
    removed: Vec<Arc<LocationSnapshot>>,
    added: Vec<Arc<LocationSnapshot>>,
}

impl SnapshotCollectingDiffListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand the collected diff to `publish`, unless it is empty
    pub fn publish_snapshot_diff<F>(self, publish: F)
    where
        F: FnOnce(Vec<Arc<LocationSnapshot>>, Vec<Arc<LocationSnapshot>>),
    {
        if self.removed.is_empty() && self.added.is_empty() {
            return;
        }
        publish(self.removed, self.added);
    }
}

impl NodeDiffListener for SnapshotCollectingDiffListener {
    fn node_removed(&mut self, node: &FileSystemNode) {
        for snapshot in node.root_snapshots() {
            match self.added.iter().position(|added| **added == *snapshot) {
                Some(idx) => {
                    self.added.remove(idx);
                }
                None => self.removed.push(snapshot),
            }
        }
    }

    fn node_added(&mut self, node: &FileSystemNode) {
        for snapshot in node.root_snapshots() {
            match self.removed.iter().position(|removed| **removed == *snapshot) {
                Some(idx) => {
                    self.removed.remove(idx);
                }
                None => self.added.push(snapshot),
            }
        }
    }
}

/// Delivers committed events to registered listeners in commit order
///
/// Every commit carries a sequence number one larger than the commit it
/// replaced. A committing thread waits until all earlier sequences were
/// delivered before replaying its own events.
#[derive(Default)]
pub struct DiffNotifier {
    listeners: RwLock<Vec<Arc<dyn VfsListener>>>,
    delivered: Mutex<u64>,
    turn: Condvar,
}

impl DiffNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn VfsListener>) {
        self.listeners.write().push(listener);
    }

    /// Returns whether the listener was registered
    pub fn remove_listener(&self, listener: &Arc<dyn VfsListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Replay the events of commit `sequence` once all earlier commits are out
    pub fn deliver(&self, sequence: u64, events: Vec<DiffEvent>) {
        {
            let mut delivered = self.delivered.lock();
            while *delivered + 1 < sequence {
                self.turn.wait(&mut delivered);
            }
        }
        let _advance = AdvanceOnDrop {
            notifier: self,
            sequence,
        };

        if events.is_empty() {
            return;
        }
        let listeners = self.listeners.read().clone();
        if listeners.is_empty() {
            return;
        }
        trace!(sequence, events = events.len(), "Replaying committed diff");
        for event in &events {
            for listener in &listeners {
                match event {
                    DiffEvent::Added(node) => listener.node_added(node),
                    DiffEvent::Removed(node) => listener.node_removed(node),
                }
            }
        }
    }
}

impl std::fmt::Debug for DiffNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffNotifier")
            .field("listeners", &self.listener_count())
            .field("delivered", &*self.delivered.lock())
            .finish()
    }
}

/// Marks a sequence delivered even if a listener panics
struct AdvanceOnDrop<'a> {
    notifier: &'a DiffNotifier,
    sequence: u64,
}

impl Drop for AdvanceOnDrop<'_> {
    fn drop(&mut self) {
        let mut delivered = self.notifier.delivered.lock();
        if *delivered < self.sequence {
            *delivered = self.sequence;
        }
        self.notifier.turn.notify_all();
    }
}
