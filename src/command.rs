//! Replication commands
//!
//! The command model the source issues against a target replica, plus the
//! wire envelopes both sides exchange. Requests name one of four commands
//! and carry a root-relative `/`-separated path; replies carry a status,
//! an optional message, and an optional snapshot payload.

use crate::error::{ChannelError, ProtocolError};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CMD_MAKEDIR: &str = "makedir";
pub const CMD_WRITEFILE: &str = "writefile";
pub const CMD_REMOVE: &str = "remove";
pub const CMD_GET_DIR_STRUCTURE: &str = "get_dir_structure";

pub const STATUS_OK: &str = "ok";
pub const STATUS_ERROR: &str = "error";

/// A single replication command.
///
/// Mutations are idempotent on the target: re-applying a command to a
/// replica already in the commanded state changes nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a directory (and any missing parents).
    MakeDir { path: String },
    /// Write full file content, replacing whatever occupies the path.
    WriteFile { path: String, content: String },
    /// Remove a file or directory subtree; absent paths are a no-op.
    Remove { path: String },
    /// Query the target's current tree as a [`Snapshot`].
    GetDirStructure,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::MakeDir { path } => write!(f, "{} {}", CMD_MAKEDIR, path),
            Command::WriteFile { path, content } => {
                write!(f, "{} {} ({} bytes)", CMD_WRITEFILE, path, content.len())
            }
            Command::Remove { path } => write!(f, "{} {}", CMD_REMOVE, path),
            Command::GetDirStructure => write!(f, "{}", CMD_GET_DIR_STRUCTURE),
        }
    }
}

/// What the target said about a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Structure(Snapshot),
    Error(String),
}

impl Reply {
    /// Interpret this reply as acknowledgement of a mutation.
    pub fn into_ack(self) -> Result<(), ChannelError> {
        match self {
            Reply::Ok | Reply::Structure(_) => Ok(()),
            Reply::Error(message) => Err(ChannelError::Remote(message)),
        }
    }

    /// Interpret this reply as the answer to a snapshot query.
    pub fn into_structure(self) -> Result<Snapshot, ChannelError> {
        match self {
            Reply::Structure(snapshot) => Ok(snapshot),
            Reply::Ok => Err(ChannelError::MalformedReply(
                "snapshot reply carried no data".to_string(),
            )),
            Reply::Error(message) => Err(ChannelError::Remote(message)),
        }
    }
}

/// Request envelope as it travels on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireRequest {
    pub command: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl From<&Command> for WireRequest {
    fn from(command: &Command) -> Self {
        match command {
            Command::MakeDir { path } => WireRequest {
                command: CMD_MAKEDIR.to_string(),
                path: path.clone(),
                data: None,
            },
            Command::WriteFile { path, content } => WireRequest {
                command: CMD_WRITEFILE.to_string(),
                path: path.clone(),
                data: Some(content.clone()),
            },
            Command::Remove { path } => WireRequest {
                command: CMD_REMOVE.to_string(),
                path: path.clone(),
                data: None,
            },
            Command::GetDirStructure => WireRequest {
                command: CMD_GET_DIR_STRUCTURE.to_string(),
                path: String::new(),
                data: None,
            },
        }
    }
}

impl TryFrom<WireRequest> for Command {
    type Error = ProtocolError;

    fn try_from(request: WireRequest) -> Result<Self, ProtocolError> {
        match request.command.as_str() {
            CMD_MAKEDIR => Ok(Command::MakeDir { path: request.path }),
            CMD_WRITEFILE => {
                let content = request
                    .data
                    .ok_or_else(|| ProtocolError::MissingData(CMD_WRITEFILE.to_string()))?;
                Ok(Command::WriteFile {
                    path: request.path,
                    content,
                })
            }
            CMD_REMOVE => Ok(Command::Remove { path: request.path }),
            CMD_GET_DIR_STRUCTURE => Ok(Command::GetDirStructure),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Reply envelope as it travels on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireReply {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Snapshot>,
}

impl From<Reply> for WireReply {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Ok => WireReply {
                status: STATUS_OK.to_string(),
                message: None,
                data: None,
            },
            Reply::Structure(snapshot) => WireReply {
                status: STATUS_OK.to_string(),
                message: None,
                data: Some(snapshot),
            },
            Reply::Error(message) => WireReply {
                status: STATUS_ERROR.to_string(),
                message: Some(message),
                data: None,
            },
        }
    }
}

impl TryFrom<WireReply> for Reply {
    type Error = ChannelError;

    fn try_from(reply: WireReply) -> Result<Self, ChannelError> {
        match reply.status.as_str() {
            STATUS_OK => match reply.data {
                Some(snapshot) => Ok(Reply::Structure(snapshot)),
                None => Ok(Reply::Ok),
            },
            STATUS_ERROR => Ok(Reply::Error(reply.message.unwrap_or_else(|| {
                "unspecified remote error".to_string()
            }))),
            other => Err(ChannelError::MalformedReply(format!(
                "unknown reply status {:?}",
                other
            ))),
        }
    }
}
