//! Watched directory registry
//!
//! Tracks the set of absolute source-side directories currently subscribed to
//! change notifications. The registry is the only record of that set: the
//! replicator registers a directory when it starts watching it and drops a
//! whole subtree when a removal event arrives, so the set always equals
//! "every directory currently under the replication root".

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// The set of watched source-side directories.
///
/// Internally locked: registration happens on the startup thread while
/// unregistration runs on the propagation loop.
#[derive(Default)]
pub struct WatchRegistry {
    watched: Mutex<BTreeSet<PathBuf>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` as watched.
    pub fn register(&self, path: impl Into<PathBuf>) {
        self.watched.lock().insert(path.into());
    }

    /// Drop every watched directory at or under `path` and return the
    /// directories that were dropped, so the caller can tear down their
    /// filesystem watches.
    ///
    /// Matching is by path segment: removing `/a` drops `/a` and `/a/b` but
    /// never a sibling `/ab`.
    pub fn unregister_prefix(&self, path: &Path) -> Vec<PathBuf> {
        let mut watched = self.watched.lock();
        let dropped: Vec<PathBuf> = watched
            .iter()
            .filter(|candidate| candidate.starts_with(path))
            .cloned()
            .collect();
        for dir in &dropped {
            watched.remove(dir);
        }
        dropped
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.watched.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.lock().is_empty()
    }
}
