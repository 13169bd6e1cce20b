use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One mutex per filesystem path. Two installs into the same working copy (or
/// two cache steps on the same checkout) are serialized; different paths run freely.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    visited: Mutex<HashSet<PathBuf>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// True the first time `path` is seen by this set of locks.
    pub fn first_visit(&self, path: &Path) -> bool {
        self.visited.lock().insert(path.to_path_buf())
    }
}
