//! Target-side command interpreter
//!
//! Applies replication commands beneath a replica root and answers snapshot
//! queries. Application is idempotent: replaying a command against a replica
//! already in the commanded state leaves the tree unchanged, so a source may
//! re-send its full state after a restart without corrupting the replica.

use crate::command::{Command, Reply, WireReply, WireRequest};
use crate::error::ReplicationError;
use crate::fs::FileSystem;
use crate::path;
use crate::snapshot;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Executes commands against a replica root.
pub struct CommandInterpreter {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl CommandInterpreter {
    /// Create an interpreter over `root`. The root directory must already
    /// exist; callers serving a fresh replica create it first.
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Decode and apply one wire request, always producing a reply.
    ///
    /// Decode and validation failures answer with an error-status reply and
    /// never tear down the serving loop.
    pub fn handle_wire(&self, request: WireRequest) -> WireReply {
        let command = match Command::try_from(request) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Rejected malformed request");
                return WireReply::from(Reply::Error(e.to_string()));
            }
        };
        WireReply::from(self.apply(&command))
    }

    /// Apply one command, folding failures into an error reply so local and
    /// remote callers observe identical behavior.
    pub fn apply(&self, command: &Command) -> Reply {
        debug!(command = %command, "Applying command");
        match self.execute(command) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(command = %command, error = %e, "Command failed");
                Reply::Error(e.to_string())
            }
        }
    }

    fn execute(&self, command: &Command) -> Result<Reply, ReplicationError> {
        match command {
            Command::MakeDir { path } => {
                let full = path::resolve_under(&self.root, path)?;
                self.fs.make_dirs(&full)?;
                Ok(Reply::Ok)
            }
            Command::WriteFile { path, content } => {
                let full = path::resolve_under(&self.root, path)?;
                if self.fs.exists(&full) {
                    if self.fs.is_dir(&full) {
                        // A directory occupying the file's path loses.
                        self.fs.remove_dir(&full)?;
                    } else if self.fs.read_file(&full)? == *content {
                        debug!(path = %path, "Content already matches, skipping write");
                        return Ok(Reply::Ok);
                    }
                }
                if let Some(parent) = full.parent() {
                    if !self.fs.exists(parent) {
                        self.fs.make_dirs(parent)?;
                    }
                }
                self.fs.write_file(&full, content)?;
                Ok(Reply::Ok)
            }
            Command::Remove { path } => {
                let full = path::resolve_under(&self.root, path)?;
                if self.fs.exists(&full) {
                    if self.fs.is_dir(&full) {
                        self.fs.remove_dir(&full)?;
                    } else {
                        self.fs.remove_file(&full)?;
                    }
                }
                Ok(Reply::Ok)
            }
            Command::GetDirStructure => {
                let snapshot = snapshot::capture(self.fs.as_ref(), &self.root)?;
                Ok(Reply::Structure(snapshot))
            }
        }
    }
}
