//! Locations written by the running build
//!
//! While a build runs, every location it writes through the façade was
//! invalidated before the write and is probed again afterwards, so watcher
//! events for those locations carry no news. They are dropped here.

use crate::access::WriteListener;
use crate::tree::path::{CaseSensitivity, VfsPath};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct BuildState {
    running: bool,
    written: Vec<VfsPath>,
}

#[derive(Debug)]
pub struct WrittenLocations {
    state: Mutex<BuildState>,
    case_sensitivity: CaseSensitivity,
}

impl WrittenLocations {
    pub fn new(case_sensitivity: CaseSensitivity) -> Self {
        Self {
            state: Mutex::new(BuildState::default()),
            case_sensitivity,
        }
    }

    pub fn build_started(&self) {
        let mut state = self.state.lock();
        state.running = true;
        state.written.clear();
    }

    pub fn build_finished(&self) {
        let mut state = self.state.lock();
        debug!(written = state.written.len(), "Build finished, watching all locations again");
        state.running = false;
        state.written.clear();
    }

    pub fn is_build_running(&self) -> bool {
        self.state.lock().running
    }

    /// False for locations at or below something the running build wrote
    pub fn should_watch(&self, location: &VfsPath) -> bool {
        let state = self.state.lock();
        !state.running
            || !state
                .written
                .iter()
                .any(|written| location.is_same_or_descendant_of(written, self.case_sensitivity))
    }
}

impl WriteListener for WrittenLocations {
    fn locations_written(&self, locations: &[VfsPath]) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }
        for location in locations {
            let covered = state
                .written
                .iter()
                .any(|written| location.is_same_or_descendant_of(written, self.case_sensitivity));
            if !covered {
                let case = self.case_sensitivity;
                state
                    .written
                    .retain(|written| !written.is_same_or_descendant_of(location, case));
                state.written.push(location.clone());
            }
        }
    }
}
