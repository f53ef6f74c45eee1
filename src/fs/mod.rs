//! Filesystem capability
//!
//! The replication core never touches the OS filesystem directly; both sides
//! operate through this trait. [`local::LocalFs`] backs it with `std::fs`
//! plus `notify` watches, [`memory::MemoryFs`] is a deterministic in-memory
//! implementation used by tests and in-process mirrors.

use crate::error::FsError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod local;
pub mod memory;

pub use local::LocalFs;
pub use memory::MemoryFs;

/// Kind of a filesystem change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// A file or subdirectory appeared
    Added,
    /// A file or subdirectory disappeared
    Removed,
    /// A file's content changed
    Modified,
}

/// A single filesystem change notification
///
/// `path` is absolute on the side that produced the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
}

impl FsEvent {
    pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Callback invoked by the watch mechanism, possibly from another thread.
pub type WatchCallback = Arc<dyn Fn(FsEvent) + Send + Sync>;

/// Filesystem operations the replicator depends on.
///
/// Watches are per-directory and non-recursive: an event fires on the watch
/// registered for the entry's parent directory, and the caller re-registers
/// for subdirectories it discovers.
pub trait FileSystem: Send + Sync {
    /// List the entry names of a directory, sorted by name.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>, FsError>;

    /// Whether the path exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Whether the path exists at all.
    fn exists(&self, path: &Path) -> bool;

    /// Read a file's full content.
    fn read_file(&self, path: &Path) -> Result<String, FsError>;

    /// Write full content to a file, truncating any previous content.
    fn write_file(&self, path: &Path, content: &str) -> Result<(), FsError>;

    /// Create a directory and any missing ancestors. Idempotent.
    fn make_dirs(&self, path: &Path) -> Result<(), FsError>;

    /// Remove a directory and everything under it.
    fn remove_dir(&self, path: &Path) -> Result<(), FsError>;

    /// Remove a single file.
    fn remove_file(&self, path: &Path) -> Result<(), FsError>;

    /// Register `callback` for changes to the immediate entries of `path`.
    fn watch_dir(&self, path: &Path, callback: WatchCallback) -> Result<(), FsError>;

    /// Drop the watch on `path`. No-op when the path is not watched.
    fn unwatch_dir(&self, path: &Path) -> Result<(), FsError>;
}
