use std::fmt;
use std::io;
use std::time::Duration;

use crate::protocol::FrameError;
use crate::relay::outbound::EnqueueError;

/// Why an inbound frame was not delivered. None of these close the
/// connection and none are reported back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    /// Malformed or too short (protocol violation).
    Protocol(FrameError),
    /// Acknowledgement from a peer that is not a consumer.
    NotFromConsumer,
    /// Command arrived while no consumer is connected (routing failure).
    NoConsumer,
    /// Destination queue at capacity (queue overflow).
    QueueFull,
    /// Destination is tearing down.
    QueueClosed,
    /// A frame type only the relay emits, e.g. a clock sync response.
    RelayOnlyFrame,
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol violation: {e}"),
            Self::NotFromConsumer => write!(f, "acknowledgement from non-consumer peer"),
            Self::NoConsumer => write!(f, "no consumer connected"),
            Self::QueueFull => write!(f, "destination queue full"),
            Self::QueueClosed => write!(f, "destination queue closed"),
            Self::RelayOnlyFrame => write!(f, "relay-only frame type received"),
        }
    }
}

impl std::error::Error for RouteError {}

impl From<FrameError> for RouteError {
    fn from(e: FrameError) -> Self {
        Self::Protocol(e)
    }
}

impl From<EnqueueError> for RouteError {
    fn from(e: EnqueueError) -> Self {
        match e {
            EnqueueError::Full => Self::QueueFull,
            EnqueueError::Closed => Self::QueueClosed,
        }
    }
}

/// Connection-fatal failures. The peer is torn down; nothing is retried.
#[derive(Debug)]
pub enum TransportError {
    Io(io::Error),
    WebSocket(tungstenite::Error),
    Handshake(String),
    InactivityTimeout(Duration),
    /// The peer sent a WebSocket Close frame.
    ClosedByPeer,
    Encode(serde_json::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::WebSocket(e) => write!(f, "websocket error: {e}"),
            Self::Handshake(e) => write!(f, "handshake failed: {e}"),
            Self::InactivityTimeout(d) => write!(f, "no traffic for {}s", d.as_secs()),
            Self::ClosedByPeer => write!(f, "closed by peer"),
            Self::Encode(e) => write!(f, "failed to encode control message: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(e: tungstenite::Error) -> Self {
        Self::WebSocket(e)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encode(e)
    }
}
