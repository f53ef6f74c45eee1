//! Startup tree reconciliation
//!
//! Brings an arbitrary, possibly stale target into exact correspondence with
//! the source without retransmitting unchanged files. The source tree is the
//! reference; the target's reported snapshot is compared level by level and
//! every mismatch becomes a mutation command. Two separate walks handle the
//! two directions: a source walk issues creates and overwrites, a snapshot
//! walk issues removals for entries the source no longer has.

use crate::channel::CommandChannel;
use crate::command::Command;
use crate::error::ReplicationError;
use crate::fs::FileSystem;
use crate::path;
use crate::snapshot::{Snapshot, SnapshotNode};
use std::path::Path;
use tracing::{debug, info};

/// Counters describing one reconciliation run.
///
/// `commands_issued` counts mutation commands only; the snapshot query is
/// read-only. A second run against an unchanged source reports zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub dirs_created: usize,
    pub files_written: usize,
    pub files_unchanged: usize,
    pub removed: usize,
    pub commands_issued: usize,
}

/// Receives the mutation commands a reconciliation walk produces.
trait CommandSink {
    fn emit(&mut self, command: Command) -> Result<(), ReplicationError>;
}

/// Sends each command over the channel and blocks for its acknowledgement.
struct SendSink<'a> {
    channel: &'a dyn CommandChannel,
}

impl CommandSink for SendSink<'_> {
    fn emit(&mut self, command: Command) -> Result<(), ReplicationError> {
        debug!(command = %command, "Issuing command");
        self.channel.request(command)?.into_ack()?;
        Ok(())
    }
}

/// Collects commands without sending them (dry run).
struct CollectSink {
    commands: Vec<Command>,
}

impl CommandSink for CollectSink {
    fn emit(&mut self, command: Command) -> Result<(), ReplicationError> {
        self.commands.push(command);
        Ok(())
    }
}

/// One-shot reconciliation of a target against the live source tree.
pub struct Reconciler<'a> {
    fs: &'a dyn FileSystem,
    root: &'a Path,
    channel: &'a dyn CommandChannel,
}

impl<'a> Reconciler<'a> {
    pub fn new(fs: &'a dyn FileSystem, root: &'a Path, channel: &'a dyn CommandChannel) -> Self {
        Self { fs, root, channel }
    }

    /// Fetch the target snapshot, issue the minimal command sequence that
    /// makes the target an exact mirror, and report what was done.
    pub fn run(&self) -> Result<ReconcileStats, ReplicationError> {
        let snapshot = self.fetch_snapshot()?;
        let mut sink = SendSink {
            channel: self.channel,
        };
        let stats = self.reconcile(&snapshot, &mut sink)?;
        info!(
            dirs_created = stats.dirs_created,
            files_written = stats.files_written,
            files_unchanged = stats.files_unchanged,
            removed = stats.removed,
            commands = stats.commands_issued,
            "Reconciliation complete"
        );
        Ok(stats)
    }

    /// Compute the command sequence a [`run`](Self::run) would issue, without
    /// sending any mutation. Still performs the read-only snapshot query.
    pub fn plan(&self) -> Result<Vec<Command>, ReplicationError> {
        let snapshot = self.fetch_snapshot()?;
        let mut sink = CollectSink {
            commands: Vec::new(),
        };
        self.reconcile(&snapshot, &mut sink)?;
        Ok(sink.commands)
    }

    fn fetch_snapshot(&self) -> Result<Snapshot, ReplicationError> {
        let reply = self.channel.request(Command::GetDirStructure)?;
        Ok(reply.into_structure()?)
    }

    fn reconcile(
        &self,
        snapshot: &Snapshot,
        sink: &mut dyn CommandSink,
    ) -> Result<ReconcileStats, ReplicationError> {
        let mut stats = ReconcileStats::default();
        self.sync_level(self.root, snapshot, sink, &mut stats)?;
        self.sweep_level(self.root, snapshot, sink, &mut stats)?;
        Ok(stats)
    }

    /// Depth-first walk of the live source, issuing creates and overwrites
    /// for anything the snapshot lacks or holds differently.
    fn sync_level(
        &self,
        dir: &Path,
        level: &Snapshot,
        sink: &mut dyn CommandSink,
        stats: &mut ReconcileStats,
    ) -> Result<(), ReplicationError> {
        for name in self.fs.list_dir(dir)? {
            let abs = dir.join(&name);
            let rel = match path::to_wire(self.root, &abs) {
                Some(rel) => rel,
                None => continue,
            };
            let existing = level.get(&name);

            if self.fs.is_dir(&abs) {
                if !matches!(existing, Some(SnapshotNode::Directory(_))) {
                    // A file may occupy the directory's name; clear it first.
                    sink.emit(Command::Remove { path: rel.clone() })?;
                    sink.emit(Command::MakeDir { path: rel })?;
                    stats.dirs_created += 1;
                    stats.commands_issued += 2;
                }
                let empty = Snapshot::new();
                let children = existing.and_then(|node| node.as_dir()).unwrap_or(&empty);
                self.sync_level(&abs, children, sink, stats)?;
            } else {
                let content = self.fs.read_file(&abs)?;
                match existing {
                    Some(SnapshotNode::File(current)) if *current == content => {
                        stats.files_unchanged += 1;
                    }
                    _ => {
                        sink.emit(Command::WriteFile { path: rel, content })?;
                        stats.files_written += 1;
                        stats.commands_issued += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk of the target snapshot, removing entries the source no longer
    /// has. Entries that still exist and are snapshot directories are swept
    /// recursively: the snapshot and the live source were read at different
    /// times, so stale descendants may hide under a surviving parent.
    fn sweep_level(
        &self,
        dir: &Path,
        level: &Snapshot,
        sink: &mut dyn CommandSink,
        stats: &mut ReconcileStats,
    ) -> Result<(), ReplicationError> {
        for (name, node) in level {
            let abs = dir.join(name);
            let rel = match path::to_wire(self.root, &abs) {
                Some(rel) => rel,
                None => continue,
            };
            if !self.fs.exists(&abs) {
                sink.emit(Command::Remove { path: rel })?;
                stats.removed += 1;
                stats.commands_issued += 1;
            } else if let SnapshotNode::Directory(children) = node {
                self.sweep_level(&abs, children, sink, stats)?;
            }
        }
        Ok(())
    }
}
