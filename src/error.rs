//! Error types for the Tether replication system.

use std::path::PathBuf;
use thiserror::Error;

/// Filesystem capability errors
///
/// Raised by [`crate::fs::FileSystem`] operations and propagated unchanged to
/// the caller of the operation that triggered them. The source side never
/// swallows these: a partially applied reconciliation cannot be resumed, so
/// the session aborts and a restart performs a fresh full reconciliation.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Is a directory: {0}")]
    IsADirectory(PathBuf),

    #[error("File is not valid UTF-8: {0}")]
    NonUtf8(PathBuf),

    #[error("Watch registration failed: {0}")]
    Watch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Command channel errors
///
/// Transport failures and malformed replies. Fatal to the current
/// replication session; the design specifies no retry.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode message: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    #[error("Remote error reply: {0}")]
    Remote(String),

    #[error("Channel disconnected")]
    Disconnected,
}

/// Request decode and validation errors on the target side
///
/// These never abort the serving loop: the interpreter answers with an
/// error-status reply and continues serving subsequent commands.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("Command {0:?} requires a data payload")]
    MissingData(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Source-session errors
///
/// Umbrella for everything that can abort startup reconciliation or the live
/// propagation loop.
#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Event queue error: {0}")]
    EventQueue(String),
}

/// Configuration load or validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
