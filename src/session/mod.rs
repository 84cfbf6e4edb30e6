//! Client sessions and their result values.
//!
//! A session is one client's execution of the fixed request/reply loop
//! over one transport:
//! - `Stream`: one TCP connection, newline-framed request lines
//! - `Datagram`: one UDP socket, bare payload datagrams
//!
//! Sessions report their outcome as explicit values (`SessionReport` /
//! `SessionError`) consumed by the pool for logging only; failures are
//! always session-local.

pub mod tcp;
pub mod udp;

use std::time::Duration;

/// Number of request/reply rounds every session runs
pub const ROUNDS: usize = 4;

/// Reply buffer size; a longer reply is only partially consumed
pub const REPLY_BUFFER_SIZE: usize = 1024;

/// Pacing delay applied after each round
pub const PACING_DELAY: Duration = Duration::from_millis(100);

/// Transport kind for a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stream,
    Datagram,
}

/// One client session: identity, target endpoint, transport kind.
///
/// The session exclusively owns its socket for its whole lifetime; the
/// handle is a local of the running task and is released on every exit
/// path, including cancellation.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub transport: Transport,
}

impl ClientSession {
    /// Create a stream (TCP) session
    pub fn stream(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            transport: Transport::Stream,
        }
    }

    /// Create a datagram (UDP) session
    pub fn datagram(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            transport: Transport::Datagram,
        }
    }

    /// Run the session to completion on the current task.
    pub async fn run(self) -> Result<SessionReport, SessionError> {
        match self.transport {
            Transport::Stream => tcp::run(self).await,
            Transport::Datagram => udp::run(self).await,
        }
    }
}

/// Build the request payload for one round.
///
/// Derived solely from the client name and the round ordinal, so
/// repeated runs produce identical request sequences.
pub fn request_payload(name: &str, round: usize) -> String {
    format!("{} - Log request: {}", name, round)
}

/// A single reply as read off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Zero-length read; a valid empty reply, not an error
    Empty,
    /// Reply bytes decoded as text
    Text(String),
}

/// Outcome of a session that ran all its rounds
#[derive(Debug)]
pub struct SessionReport {
    pub name: String,
    pub rounds: usize,
    pub replies: Vec<Reply>,
}

impl SessionReport {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rounds: 0,
            replies: Vec::with_capacity(ROUNDS),
        }
    }
}

/// Session-local failures. Aborts the remaining rounds of the failing
/// session only; never surfaced to other sessions.
#[derive(Debug)]
pub enum SessionError {
    /// Could not open the socket or reach the target
    Connect(std::io::Error),
    /// Target address resolution produced nothing usable
    Resolve(String),
    /// Write/send failed mid-loop
    Send { round: usize, source: std::io::Error },
    /// Read/receive failed mid-loop
    Recv { round: usize, source: std::io::Error },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Connect(e) => write!(f, "Failed to open socket: {}", e),
            SessionError::Resolve(reason) => write!(f, "Failed to resolve target: {}", reason),
            SessionError::Send { round, source } => {
                write!(f, "Send failed in round {}: {}", round, source)
            }
            SessionError::Recv { round, source } => {
                write!(f, "Receive failed in round {}: {}", round, source)
            }
        }
    }
}

impl std::error::Error for SessionError {}
