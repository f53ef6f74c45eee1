//! Local filesystem
//!
//! [`FileSystem`] backed by `std::fs`, with per-directory non-recursive
//! `notify` watches for change notifications.

use crate::error::FsError;
use crate::fs::{FileSystem, FsEvent, FsEventKind, WatchCallback};
use notify::event::{EventKind, ModifyKind};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Canonicalize a replication root before any relative paths are derived
/// from it, so event paths reported by the watcher strip cleanly.
pub fn canonical_root(path: &Path) -> Result<PathBuf, FsError> {
    dunce::canonicalize(path).map_err(|e| {
        FsError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to canonicalize {}: {}", path.display(), e),
        ))
    })
}

type WatchMap = Arc<Mutex<HashMap<PathBuf, WatchCallback>>>;

/// Local filesystem with `notify`-driven directory watches.
pub struct LocalFs {
    watches: WatchMap,
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl Default for LocalFs {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalFs {
    pub fn new() -> Self {
        Self {
            watches: Arc::new(Mutex::new(HashMap::new())),
            watcher: Mutex::new(None),
        }
    }

    /// Create the shared notify watcher on first use. Its handler thread
    /// routes each event to the callback registered for the event path's
    /// parent directory.
    fn with_watcher<R>(
        &self,
        f: impl FnOnce(&mut RecommendedWatcher) -> Result<R, notify::Error>,
    ) -> Result<R, FsError> {
        let mut guard = self.watcher.lock();
        if guard.is_none() {
            *guard = Some(create_watcher(Arc::clone(&self.watches))?);
        }
        match guard.as_mut() {
            Some(watcher) => f(watcher).map_err(|e| FsError::Watch(e.to_string())),
            None => Err(FsError::Watch("watcher unavailable".to_string())),
        }
    }
}

fn create_watcher(watches: WatchMap) -> Result<RecommendedWatcher, FsError> {
    notify::recommended_watcher(move |result: notify::Result<Event>| match result {
        Ok(event) => route_event(&watches, event),
        Err(e) => warn!("Watch error: {}", e),
    })
    .map_err(|e| FsError::Watch(e.to_string()))
}

/// Translate a notify event into replication events and deliver each to the
/// watch covering its parent directory.
fn route_event(watches: &WatchMap, event: Event) {
    for fs_event in convert_event(event) {
        let callback = {
            let guard = watches.lock();
            fs_event
                .path
                .parent()
                .and_then(|parent| guard.get(parent).cloned())
        };
        // Invoke with the map unlocked: the callback may block on a full
        // event queue while the consumer is busy unwatching directories.
        if let Some(callback) = callback {
            callback(fs_event);
        }
    }
}

/// Convert a notify event to zero or more replication events.
fn convert_event(event: Event) -> Vec<FsEvent> {
    match event.kind {
        EventKind::Create(_) => event
            .paths
            .first()
            .map(|p| FsEvent::new(FsEventKind::Added, p.clone()))
            .into_iter()
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) => {
            if event.paths.len() >= 2 {
                // Rename carries both sides: old path disappears, new appears.
                vec![
                    FsEvent::new(FsEventKind::Removed, event.paths[0].clone()),
                    FsEvent::new(FsEventKind::Added, event.paths[1].clone()),
                ]
            } else if let Some(path) = event.paths.first() {
                // Single-sided rename: probe which half of the move we saw.
                let kind = if path.exists() {
                    FsEventKind::Added
                } else {
                    FsEventKind::Removed
                };
                vec![FsEvent::new(kind, path.clone())]
            } else {
                Vec::new()
            }
        }
        EventKind::Modify(_) => event
            .paths
            .first()
            .map(|p| FsEvent::new(FsEventKind::Modified, p.clone()))
            .into_iter()
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .first()
            .map(|p| FsEvent::new(FsEventKind::Removed, p.clone()))
            .into_iter()
            .collect(),
        _ => Vec::new(),
    }
}

fn io_error(path: &Path, err: std::io::Error) -> FsError {
    if err.kind() == std::io::ErrorKind::NotFound {
        FsError::NotFound(path.to_path_buf())
    } else {
        FsError::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.display(), err),
        ))
    }
}

impl FileSystem for LocalFs {
    fn list_dir(&self, path: &Path) -> Result<Vec<String>, FsError> {
        if path.exists() && !path.is_dir() {
            return Err(FsError::NotADirectory(path.to_path_buf()));
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path).map_err(|e| io_error(path, e))? {
            let entry = entry.map_err(|e| io_error(path, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        let bytes = std::fs::read(path).map_err(|e| io_error(path, e))?;
        String::from_utf8(bytes).map_err(|_| FsError::NonUtf8(path.to_path_buf()))
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<(), FsError> {
        std::fs::write(path, content).map_err(|e| io_error(path, e))
    }

    fn make_dirs(&self, path: &Path) -> Result<(), FsError> {
        std::fs::create_dir_all(path).map_err(|e| io_error(path, e))
    }

    fn remove_dir(&self, path: &Path) -> Result<(), FsError> {
        std::fs::remove_dir_all(path).map_err(|e| io_error(path, e))
    }

    fn remove_file(&self, path: &Path) -> Result<(), FsError> {
        std::fs::remove_file(path).map_err(|e| io_error(path, e))
    }

    fn watch_dir(&self, path: &Path, callback: WatchCallback) -> Result<(), FsError> {
        self.with_watcher(|watcher| watcher.watch(path, RecursiveMode::NonRecursive))?;
        self.watches.lock().insert(path.to_path_buf(), callback);
        Ok(())
    }

    fn unwatch_dir(&self, path: &Path) -> Result<(), FsError> {
        if self.watches.lock().remove(path).is_none() {
            return Ok(());
        }
        let result = self.with_watcher(|watcher| watcher.unwatch(path));
        match result {
            Ok(()) => Ok(()),
            // The kernel drops watches on deleted directories before we get
            // here; that is not a failure.
            Err(FsError::Watch(_)) => Ok(()),
            Err(other) => Err(other),
        }
    }
}
