use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::constants::*;
use crate::protocol::frame_type::{FrameType, expect_frame};
use crate::protocol::FrameError;

/// Twist-style velocity: linear then angular, each x/y/z.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub linear: [f64; 3],
    pub angular: [f64; 3],
}

/// Velocity command as issued by a controller (65 bytes on the wire).
///
/// Layout: `[0]` tag, `[1,9)` id, `[9,17)` t1 controller send time,
/// `[17,65)` six `f64` velocity components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Command {
    pub id: u64,
    pub t1_controller_tx: u64,
    pub velocity: Velocity,
}

impl Command {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(COMMAND_SIZE);
        buf.put_u8(TAG_COMMAND);
        buf.put_u64_le(self.id);
        buf.put_u64_le(self.t1_controller_tx);
        for v in self.velocity.linear.iter().chain(self.velocity.angular.iter()) {
            buf.put_f64_le(*v);
        }
        buf.freeze()
    }

    /// Decodes the first 65 bytes; any relay suffix is ignored.
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        expect_frame(data, FrameType::Command)?;
        let f = |i: usize| LittleEndian::read_f64(&data[17 + 8 * i..25 + 8 * i]);
        Ok(Self {
            id: LittleEndian::read_u64(&data[1..9]),
            t1_controller_tx: LittleEndian::read_u64(&data[9..17]),
            velocity: Velocity {
                linear: [f(0), f(1), f(2)],
                angular: [f(3), f(4), f(5)],
            },
        })
    }
}

/// Command as delivered to the consumer: the controller's 65 bytes plus the
/// relay's receive (t2) and forward (t3) times.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RelayedCommand {
    pub command: Command,
    pub t2_relay_rx: u64,
    pub t3_relay_tx: u64,
}

impl RelayedCommand {
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        let command = Command::decode(data)?;
        if data.len() < RELAYED_COMMAND_SIZE {
            return Err(FrameError::TooShort {
                kind: FrameType::Command,
                len: data.len(),
                min: RELAYED_COMMAND_SIZE,
            });
        }
        Ok(Self {
            command,
            t2_relay_rx: LittleEndian::read_u64(&data[65..73]),
            t3_relay_tx: LittleEndian::read_u64(&data[73..81]),
        })
    }
}
