//! Command channel
//!
//! Synchronous request/response transport between the source replicator and
//! the target interpreter. Two implementations: an in-process loopback for
//! tests and single-process mirrors, and a TCP client speaking
//! newline-delimited JSON, with the matching target-side serving loop.
//!
//! Every call blocks until the reply arrives; the channel preserves order on
//! its single logical connection, which is what gives the target per-path
//! command ordering.

use crate::command::{Command, Reply, WireReply, WireRequest};
use crate::target::CommandInterpreter;
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info, warn};

use crate::error::ChannelError;

/// Blocking request/response transport to a target interpreter.
pub trait CommandChannel: Send + Sync {
    /// Send one command and block until its reply arrives.
    fn request(&self, command: Command) -> Result<Reply, ChannelError>;
}

/// In-process channel wrapping a [`CommandInterpreter`] directly.
///
/// An internal lock serializes application, matching the one-command-at-a-time
/// contract of the remote serving loop.
pub struct LoopbackChannel {
    interpreter: Mutex<CommandInterpreter>,
}

impl LoopbackChannel {
    pub fn new(interpreter: CommandInterpreter) -> Self {
        Self {
            interpreter: Mutex::new(interpreter),
        }
    }
}

impl CommandChannel for LoopbackChannel {
    fn request(&self, command: Command) -> Result<Reply, ChannelError> {
        Ok(self.interpreter.lock().apply(&command))
    }
}

struct TcpConnection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// TCP client channel: one connection, one JSON request or reply per line.
pub struct TcpChannel {
    connection: Mutex<TcpConnection>,
}

impl TcpChannel {
    /// Connect to a serving target.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ChannelError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            connection: Mutex::new(TcpConnection {
                reader,
                writer: stream,
            }),
        })
    }
}

impl CommandChannel for TcpChannel {
    fn request(&self, command: Command) -> Result<Reply, ChannelError> {
        let mut connection = self.connection.lock();

        let mut encoded = serde_json::to_string(&WireRequest::from(&command))?;
        encoded.push('\n');
        connection.writer.write_all(encoded.as_bytes())?;
        connection.writer.flush()?;

        let mut line = String::new();
        if connection.reader.read_line(&mut line)? == 0 {
            return Err(ChannelError::Disconnected);
        }
        let wire: WireReply = serde_json::from_str(line.trim_end())?;
        Reply::try_from(wire)
    }
}

/// Target-side serving loop.
///
/// Accepts connections serially and applies one command fully before reading
/// the next. A failing or malformed command gets an error reply and the
/// connection lives on; an I/O error ends that connection and the loop keeps
/// accepting.
pub fn serve(listener: TcpListener, interpreter: &CommandInterpreter) -> Result<(), ChannelError> {
    info!(addr = %listener.local_addr()?, root = %interpreter.root().display(), "Serving replica");
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                info!(peer = %peer, "Source connected");
                if let Err(e) = serve_connection(stream, interpreter) {
                    warn!(peer = %peer, error = %e, "Connection ended with error");
                } else {
                    info!(peer = %peer, "Source disconnected");
                }
            }
            Err(e) => warn!(error = %e, "Failed to accept connection"),
        }
    }
    Ok(())
}

/// Serve one connection until the peer hangs up.
pub fn serve_connection(
    stream: TcpStream,
    interpreter: &CommandInterpreter,
) -> Result<(), ChannelError> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<WireRequest>(trimmed) {
            Ok(request) => interpreter.handle_wire(request),
            Err(e) => {
                debug!(error = %e, "Rejected undecodable request line");
                WireReply::from(Reply::Error(format!("malformed request: {}", e)))
            }
        };

        let mut encoded = serde_json::to_string(&reply)?;
        encoded.push('\n');
        writer.write_all(encoded.as_bytes())?;
        writer.flush()?;
    }
}
