use std::time::Duration;

use crate::ntrip::ConnectionMode;

/// Error that possible during sentence parsing
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParserError {
    #[error("empty sentence")]
    Empty,
    #[error("sentence does not start with '$'")]
    MissingStartDelimiter,
    #[error("sentence too short, got {len} bytes")]
    TooShort { len: usize },
    #[error("sentence has no checksum delimiter")]
    MissingChecksum,
    #[error("checksum field is not two hex digits")]
    MalformedChecksum,
    #[error("Not valid sentence checksum, expect {expect:02X}, got {got:02X}")]
    InvalidChecksum { expect: u8, got: u8 },
    #[error("sentence is not valid ASCII")]
    InvalidEncoding,
    #[error("no line terminator within {len} bytes, buffer discarded")]
    BufferOverflow { len: usize },
}

/// Errors surfaced by the NTRIP correction client.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum NtripError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("already connected")]
    AlreadyConnected,
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,
    #[error("not connected")]
    NotConnected,
    #[error("connection attempt aborted")]
    Aborted,
    #[error("{mode} transport failed: {reason}")]
    Transport {
        mode: ConnectionMode,
        reason: String,
    },
    #[error("all transports failed: {}", join_failures(.0))]
    AllTransportsFailed(Vec<NtripError>),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("caster answered with status {status}: {line}")]
    Http { status: u16, line: String },
    #[error("correction stream ended")]
    StreamEnded,
    #[error("giving up after {attempts} reconnection attempts")]
    RetriesExhausted { attempts: u32 },
    #[error("client task has shut down")]
    ClientClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[cfg(feature = "websocket")]
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

fn join_failures(errors: &[NtripError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl NtripError {
    pub(crate) fn transport(mode: ConnectionMode, reason: impl ToString) -> Self {
        Self::Transport {
            mode,
            reason: reason.to_string(),
        }
    }

    /// Configuration problems are never retried.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub type Result<T, E = NtripError> = std::result::Result<T, E>;
