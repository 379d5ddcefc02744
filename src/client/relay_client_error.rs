use std::{fmt, io};

use crate::protocol::FrameError;

/// Errors surfaced by [`RelayClient`](crate::client::RelayClient).
#[derive(Debug)]
pub enum RelayClientError {
    Io(io::Error),
    WebSocket(tungstenite::Error),
    /// Upgrade refused or no usable welcome message.
    Handshake(String),
    Json(serde_json::Error),
    Frame(FrameError),
    /// Nothing arrived before the deadline.
    Timeout,
    Closed,
}

impl fmt::Display for RelayClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::WebSocket(e) => write!(f, "websocket error: {e}"),
            Self::Handshake(e) => write!(f, "handshake failed: {e}"),
            Self::Json(e) => write!(f, "bad control message: {e}"),
            Self::Frame(e) => write!(f, "protocol error: {e}"),
            Self::Timeout => write!(f, "timed out waiting for the relay"),
            Self::Closed => write!(f, "relay closed the connection"),
        }
    }
}

impl std::error::Error for RelayClientError {}

impl From<io::Error> for RelayClientError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<tungstenite::Error> for RelayClientError {
    fn from(e: tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::Io(io) if is_timeout(&io) => Self::Timeout,
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => Self::Closed,
            other => Self::WebSocket(other),
        }
    }
}

impl From<serde_json::Error> for RelayClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<FrameError> for RelayClientError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

pub(crate) fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
