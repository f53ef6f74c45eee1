//! In-memory filesystem
//!
//! Deterministic [`FileSystem`] implementation backing unit and integration
//! tests: watch callbacks fire synchronously on mutation, and a write counter
//! records how many times file content was actually written, which is what
//! makes the interpreter's no-op write behavior observable.

use crate::error::FsError;
use crate::fs::{FileSystem, FsEvent, FsEventKind, WatchCallback};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
enum Entry {
    File(String),
    Directory,
}

struct State {
    entries: BTreeMap<PathBuf, Entry>,
    watches: BTreeMap<PathBuf, WatchCallback>,
}

/// In-memory filesystem rooted at `/`.
pub struct MemoryFs {
    state: Mutex<State>,
    write_count: AtomicU64,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem containing only the `/` directory.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(PathBuf::from("/"), Entry::Directory);
        Self {
            state: Mutex::new(State {
                entries,
                watches: BTreeMap::new(),
            }),
            write_count: AtomicU64::new(0),
        }
    }

    /// Number of times file content was actually written.
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Dispatch an event to the watch registered for the path's parent, if
    /// any. Called with the state lock released so a callback can block
    /// (e.g. on a full event queue) without deadlocking filesystem calls
    /// made by the consumer.
    fn notify(watch: Option<WatchCallback>, event: FsEvent) {
        if let Some(callback) = watch {
            callback(event);
        }
    }

    fn parent_watch(state: &State, path: &Path) -> Option<WatchCallback> {
        path.parent()
            .and_then(|parent| state.watches.get(parent).cloned())
    }
}

impl FileSystem for MemoryFs {
    fn list_dir(&self, path: &Path) -> Result<Vec<String>, FsError> {
        let state = self.state.lock();
        match state.entries.get(path) {
            Some(Entry::Directory) => {}
            Some(Entry::File(_)) => return Err(FsError::NotADirectory(path.to_path_buf())),
            None => return Err(FsError::NotFound(path.to_path_buf())),
        }

        // BTreeMap iteration keeps siblings sorted by name.
        let names = state
            .entries
            .keys()
            .filter(|candidate| candidate.parent() == Some(path))
            .filter_map(|candidate| candidate.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        Ok(names)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.state.lock().entries.get(path), Some(Entry::Directory))
    }

    fn exists(&self, path: &Path) -> bool {
        self.state.lock().entries.contains_key(path)
    }

    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        let state = self.state.lock();
        match state.entries.get(path) {
            Some(Entry::File(content)) => Ok(content.clone()),
            Some(Entry::Directory) => Err(FsError::IsADirectory(path.to_path_buf())),
            None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    fn write_file(&self, path: &Path, content: &str) -> Result<(), FsError> {
        let (watch, event) = {
            let mut state = self.state.lock();

            let parent = path
                .parent()
                .ok_or_else(|| FsError::NotFound(path.to_path_buf()))?;
            match state.entries.get(parent) {
                Some(Entry::Directory) => {}
                Some(Entry::File(_)) => return Err(FsError::NotADirectory(parent.to_path_buf())),
                None => return Err(FsError::NotFound(parent.to_path_buf())),
            }
            if let Some(Entry::Directory) = state.entries.get(path) {
                return Err(FsError::IsADirectory(path.to_path_buf()));
            }

            let existed = state.entries.contains_key(path);
            state
                .entries
                .insert(path.to_path_buf(), Entry::File(content.to_string()));
            self.write_count.fetch_add(1, Ordering::Relaxed);

            let kind = if existed {
                FsEventKind::Modified
            } else {
                FsEventKind::Added
            };
            (
                Self::parent_watch(&state, path),
                FsEvent::new(kind, path.to_path_buf()),
            )
        };
        Self::notify(watch, event);
        Ok(())
    }

    fn make_dirs(&self, path: &Path) -> Result<(), FsError> {
        let mut pending = Vec::new();
        {
            let mut state = self.state.lock();

            // Create missing ancestors root-first so each Added event names a
            // directory whose parent already exists.
            let mut missing = Vec::new();
            let mut cursor = path.to_path_buf();
            loop {
                match state.entries.get(&cursor) {
                    Some(Entry::Directory) => break,
                    Some(Entry::File(_)) => return Err(FsError::NotADirectory(cursor)),
                    None => {}
                }
                missing.push(cursor.clone());
                match cursor.parent() {
                    Some(parent) => cursor = parent.to_path_buf(),
                    None => break,
                }
            }

            for dir in missing.into_iter().rev() {
                state.entries.insert(dir.clone(), Entry::Directory);
                pending.push((
                    Self::parent_watch(&state, &dir),
                    FsEvent::new(FsEventKind::Added, dir),
                ));
            }
        }
        for (watch, event) in pending {
            Self::notify(watch, event);
        }
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> Result<(), FsError> {
        let (watch, event) = {
            let mut state = self.state.lock();
            match state.entries.get(path) {
                Some(Entry::Directory) => {}
                Some(Entry::File(_)) => return Err(FsError::NotADirectory(path.to_path_buf())),
                None => return Err(FsError::NotFound(path.to_path_buf())),
            }

            // The subtree disappears as one operation: exactly one Removed
            // event fires, for the removed root itself.
            state
                .entries
                .retain(|candidate, _| !candidate.starts_with(path));
            (
                Self::parent_watch(&state, path),
                FsEvent::new(FsEventKind::Removed, path.to_path_buf()),
            )
        };
        Self::notify(watch, event);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), FsError> {
        let (watch, event) = {
            let mut state = self.state.lock();
            match state.entries.get(path) {
                Some(Entry::File(_)) => {}
                Some(Entry::Directory) => return Err(FsError::IsADirectory(path.to_path_buf())),
                None => return Err(FsError::NotFound(path.to_path_buf())),
            }
            state.entries.remove(path);
            (
                Self::parent_watch(&state, path),
                FsEvent::new(FsEventKind::Removed, path.to_path_buf()),
            )
        };
        Self::notify(watch, event);
        Ok(())
    }

    fn watch_dir(&self, path: &Path, callback: WatchCallback) -> Result<(), FsError> {
        let mut state = self.state.lock();
        match state.entries.get(path) {
            Some(Entry::Directory) => {}
            Some(Entry::File(_)) => return Err(FsError::NotADirectory(path.to_path_buf())),
            None => return Err(FsError::NotFound(path.to_path_buf())),
        }
        state.watches.insert(path.to_path_buf(), callback);
        Ok(())
    }

    fn unwatch_dir(&self, path: &Path) -> Result<(), FsError> {
        self.state.lock().watches.remove(path);
        Ok(())
    }
}
