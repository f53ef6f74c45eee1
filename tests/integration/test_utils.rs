//! Shared test utilities for integration tests
//!
//! Builds in-memory source/target pairs wired through a loopback channel,
//! with a recording wrapper that captures every issued mutation command.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tether::channel::{CommandChannel, LoopbackChannel};
use tether::command::{Command, Reply};
use tether::error::ChannelError;
use tether::fs::{FileSystem, MemoryFs};
use tether::snapshot;
use tether::target::CommandInterpreter;

/// Channel wrapper recording the mutation commands that pass through it.
/// Snapshot queries are read-only and are not recorded.
pub struct RecordingChannel {
    inner: LoopbackChannel,
    log: Mutex<Vec<Command>>,
}

impl RecordingChannel {
    pub fn new(inner: LoopbackChannel) -> Self {
        Self {
            inner,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Mutation commands recorded so far, in issue order.
    pub fn mutations(&self) -> Vec<Command> {
        self.log.lock().clone()
    }

    /// Drain the recorded mutations, leaving the log empty.
    pub fn take_mutations(&self) -> Vec<Command> {
        std::mem::take(&mut *self.log.lock())
    }
}

impl CommandChannel for RecordingChannel {
    fn request(&self, command: Command) -> Result<Reply, ChannelError> {
        if command != Command::GetDirStructure {
            self.log.lock().push(command.clone());
        }
        self.inner.request(command)
    }
}

/// A shared in-memory filesystem with a `/src` source root, a `/dst` replica
/// root, and a recording loopback channel into the replica's interpreter.
pub fn mirror_pair() -> (Arc<MemoryFs>, Arc<RecordingChannel>) {
    let fs = Arc::new(MemoryFs::new());
    fs.make_dirs(Path::new("/src")).unwrap();
    fs.make_dirs(Path::new("/dst")).unwrap();
    let interpreter = CommandInterpreter::new(Arc::clone(&fs) as Arc<dyn FileSystem>, "/dst");
    let channel = Arc::new(RecordingChannel::new(LoopbackChannel::new(interpreter)));
    (fs, channel)
}

/// Assert that `/dst` is an exact mirror of `/src`.
pub fn assert_mirrored(fs: &MemoryFs) {
    let source = snapshot::capture(fs, Path::new("/src")).unwrap();
    let target = snapshot::capture(fs, Path::new("/dst")).unwrap();
    assert_eq!(source, target, "target does not mirror source");
}
