//! Source-side replication
//!
//! [`SourceReplicator`] owns a replication session: startup reconciliation,
//! recursive watch registration with initial population, and the live
//! propagation loop that turns filesystem change notifications into mutation
//! commands.
//!
//! Change notifications arrive on whatever thread the watch mechanism uses;
//! the callback only enqueues them into a bounded queue, and one propagation
//! loop consumes that queue. That single consumer is the serialization point:
//! a removal is never processed while a population of the same subtree is in
//! flight, and per-path command order equals source event order.

pub mod reconcile;
pub mod watch;

pub use reconcile::{ReconcileStats, Reconciler};
pub use watch::WatchRegistry;

use crate::channel::CommandChannel;
use crate::command::Command;
use crate::config::ReplicationConfig;
use crate::error::ReplicationError;
use crate::fs::{FileSystem, FsEvent, FsEventKind, WatchCallback};
use crate::path;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared flag for stopping a running propagation loop from another thread.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// The source side of a replication session.
pub struct SourceReplicator {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    channel: Arc<dyn CommandChannel>,
    registry: WatchRegistry,
    events_tx: SyncSender<FsEvent>,
    events_rx: Receiver<FsEvent>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl SourceReplicator {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        channel: Arc<dyn CommandChannel>,
        config: &ReplicationConfig,
    ) -> Self {
        let (events_tx, events_rx) = std::sync::mpsc::sync_channel(config.event_queue_capacity);
        Self {
            fs,
            root: root.into(),
            channel,
            registry: WatchRegistry::new(),
            events_tx,
            events_rx,
            running: Arc::new(AtomicBool::new(false)),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    /// Reconcile the target against the source, then recursively watch and
    /// populate the whole tree. Any filesystem or channel error aborts
    /// startup; nothing is retried.
    pub fn start(&self) -> Result<ReconcileStats, ReplicationError> {
        info!(root = %self.root.display(), "Starting replication session");
        let stats = Reconciler::new(self.fs.as_ref(), &self.root, self.channel.as_ref()).run()?;
        let root = self.root.clone();
        self.populate(&root)?;
        info!(watched_dirs = self.registry.len(), "Watches established");
        Ok(stats)
    }

    /// Consume queued change events until [`StopHandle::stop`] is called.
    ///
    /// A filesystem or channel error aborts the loop; replication stops until
    /// a restart performs a fresh full reconciliation.
    pub fn run(&self) -> Result<(), ReplicationError> {
        self.running.store(true, Ordering::SeqCst);
        info!("Propagation loop running");
        while self.running.load(Ordering::SeqCst) {
            match self.events_rx.recv_timeout(self.poll_interval) {
                Ok(event) => self.handle_event(event)?,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ReplicationError::EventQueue(
                        "event queue disconnected".to_string(),
                    ));
                }
            }
        }
        info!("Propagation loop stopped");
        Ok(())
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Process every event currently queued and return how many were handled.
    /// One-shot alternative to [`run`](Self::run), used by tests and by
    /// callers that drive the loop themselves.
    pub fn drain_pending(&self) -> Result<usize, ReplicationError> {
        let mut handled = 0;
        loop {
            match self.events_rx.try_recv() {
                Ok(event) => {
                    self.handle_event(event)?;
                    handled += 1;
                }
                Err(TryRecvError::Empty) => return Ok(handled),
                Err(TryRecvError::Disconnected) => {
                    return Err(ReplicationError::EventQueue(
                        "event queue disconnected".to_string(),
                    ));
                }
            }
        }
    }

    fn enqueue_callback(&self) -> WatchCallback {
        let tx = self.events_tx.clone();
        Arc::new(move |event| {
            // Blocks when the queue is full; the watch thread waits for the
            // propagation loop rather than dropping events.
            if tx.send(event).is_err() {
                warn!("Dropping change event, replicator is gone");
            }
        })
    }

    /// Watch `dir`, announce it to the target, and recurse over its entries.
    ///
    /// Files are re-sent and directories re-announced even when the
    /// reconciler just matched them; the target applies idempotently, and one
    /// recursive pass both populates and registers every watch. The same
    /// path runs for directories that appear while live.
    fn populate(&self, dir: &Path) -> Result<(), ReplicationError> {
        self.fs.watch_dir(dir, self.enqueue_callback())?;
        self.registry.register(dir);

        if dir != self.root {
            if let Some(rel) = path::to_wire(&self.root, dir) {
                self.issue(Command::MakeDir { path: rel })?;
            }
        }

        for name in self.fs.list_dir(dir)? {
            let abs = dir.join(&name);
            if self.fs.is_dir(&abs) {
                self.populate(&abs)?;
            } else {
                let rel = match path::to_wire(&self.root, &abs) {
                    Some(rel) => rel,
                    None => continue,
                };
                let content = self.fs.read_file(&abs)?;
                self.issue(Command::WriteFile { path: rel, content })?;
            }
        }
        Ok(())
    }

    fn handle_event(&self, event: FsEvent) -> Result<(), ReplicationError> {
        let rel = match path::to_wire(&self.root, &event.path) {
            Some(rel) if !rel.is_empty() => rel,
            _ => {
                debug!(path = %event.path.display(), "Ignoring event outside replication root");
                return Ok(());
            }
        };
        debug!(kind = ?event.kind, path = %rel, "Handling change event");

        match event.kind {
            FsEventKind::Added => {
                if self.fs.is_dir(&event.path) {
                    self.populate(&event.path)?;
                } else {
                    let content = self.fs.read_file(&event.path)?;
                    self.issue(Command::WriteFile { path: rel, content })?;
                }
            }
            FsEventKind::Removed => {
                // Tear down the subtree's watches before the target acts.
                for dir in self.registry.unregister_prefix(&event.path) {
                    self.fs.unwatch_dir(&dir)?;
                }
                self.issue(Command::Remove { path: rel })?;
            }
            FsEventKind::Modified => {
                if self.fs.is_dir(&event.path) {
                    debug!(path = %rel, "Ignoring modification event on directory");
                } else {
                    let content = self.fs.read_file(&event.path)?;
                    self.issue(Command::WriteFile { path: rel, content })?;
                }
            }
        }
        Ok(())
    }

    fn issue(&self, command: Command) -> Result<(), ReplicationError> {
        debug!(command = %command, "Issuing command");
        self.channel.request(command)?.into_ack()?;
        Ok(())
    }
}
