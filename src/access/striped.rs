//! Striped mutual exclusion keyed by path
//!
//! A fixed array of `Mutex<()>` indexed by a hash of the case-normalized path.
//! Unrelated paths may share a stripe.

use crate::tree::path::{CaseSensitivity, VfsPath};
use parking_lot::{Mutex, MutexGuard};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct StripedLock {
    stripes: Box<[Mutex<()>]>,
    case_sensitivity: CaseSensitivity,
}

impl StripedLock {
    /// `stripes` is rounded up to the next power of two
    pub fn new(stripes: usize, case_sensitivity: CaseSensitivity) -> Self {
        let count = stripes.max(1).next_power_of_two();
        Self {
            stripes: (0..count).map(|_| Mutex::new(())).collect(),
            case_sensitivity,
        }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    pub fn stripe_index(&self, path: &VfsPath) -> usize {
        let mut hasher = DefaultHasher::new();
        self.case_sensitivity.hash_key(path.as_str()).hash(&mut hasher);
        (hasher.finish() as usize) & (self.stripes.len() - 1)
    }

    pub fn lock(&self, path: &VfsPath) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_index(path)].lock()
    }
}

impl std::fmt::Debug for StripedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripedLock")
            .field("stripes", &self.stripes.len())
            .field("case_sensitivity", &self.case_sensitivity)
            .finish()
    }
}
