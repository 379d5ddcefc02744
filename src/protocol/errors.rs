use std::fmt;

use crate::protocol::FrameType;

/// Reasons a binary frame is rejected before routing.
///
/// All of these are protocol violations: the frame is dropped and logged,
/// the connection stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    Empty,
    UnknownType(u8),
    TooShort {
        kind: FrameType,
        len: usize,
        min: usize,
    },
    UnexpectedType {
        expected: FrameType,
        actual: u8,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty frame"),
            Self::UnknownType(tag) => write!(f, "unknown frame type 0x{tag:02x}"),
            Self::TooShort { kind, len, min } => {
                write!(f, "{kind:?} frame too short: {len} bytes (expected {min})")
            }
            Self::UnexpectedType { expected, actual } => {
                write!(f, "expected {expected:?} frame, got type 0x{actual:02x}")
            }
        }
    }
}

impl std::error::Error for FrameError {}
