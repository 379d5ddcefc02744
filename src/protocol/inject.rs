//! Timestamp injection: the only place the relay rewrites frame bytes.
//!
//! Callers capture each timestamp immediately before the queue operation it
//! describes and pass it in; nothing here reads a clock.

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::constants::*;
use crate::protocol::{FrameError, FrameType};

fn leading(frame: &[u8], kind: FrameType) -> Result<&[u8], FrameError> {
    frame.get(..kind.min_len()).ok_or(FrameError::TooShort {
        kind,
        len: frame.len(),
        min: kind.min_len(),
    })
}

/// Builds the 81-byte consumer frame: the controller's 65 bytes unchanged,
/// then t2 (relay receive) and t3 (relay forward).
pub fn command_for_consumer(frame: &[u8], t2: u64, t3: u64) -> Result<Bytes, FrameError> {
    let original = leading(frame, FrameType::Command)?;
    let mut buf = BytesMut::with_capacity(RELAYED_COMMAND_SIZE);
    buf.put_slice(original);
    buf.put_u64_le(t2);
    buf.put_u64_le(t3);
    Ok(buf.freeze())
}

/// Builds the 77-byte controller frame: the consumer's 69 bytes with the
/// reserved slot overwritten by t4 (relay ack receive), then t5 (relay ack forward).
pub fn ack_for_controllers(frame: &[u8], t4: u64, t5: u64) -> Result<Bytes, FrameError> {
    let original = leading(frame, FrameType::Acknowledgement)?;
    let mut buf = BytesMut::with_capacity(RELAYED_ACK_SIZE);
    buf.put_slice(original);
    LittleEndian::write_u64(&mut buf[ACK_RELAY_RX_OFFSET..ACK_SIZE], t4);
    buf.put_u64_le(t5);
    Ok(buf.freeze())
}
