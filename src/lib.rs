//! Tether: one-way, near-real-time directory tree replication
//!
//! A source node keeps a remote target directory byte-for-byte identical to
//! its own tree: a full reconciliation at startup brings an arbitrary,
//! possibly stale target into exact correspondence without retransmitting
//! unchanged files, and a change-driven propagation loop mirrors every
//! filesystem mutation afterwards. Commands travel over a synchronous
//! request/response channel and are applied idempotently on the target.

pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod path;
pub mod snapshot;
pub mod source;
pub mod target;
