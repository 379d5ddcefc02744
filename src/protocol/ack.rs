use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::constants::*;
use crate::protocol::frame_type::{FrameType, expect_frame};
use crate::protocol::FrameError;

/// Acknowledgement produced by the consumer for one command.
///
/// Layout (69 bytes from the consumer):
/// - `[0]` tag
/// - `[1,9)` command id
/// - `[9,49)` five `u64` upstream timestamps: t1 controller send, t2 relay rx,
///   t3 relay tx, consumer receive, consumer ack
/// - `[49,61)` three `u32` consumer stage durations in µs: decode, process, encode
/// - `[61,69)` slot the relay fills with t4 (relay ack receive)
///
/// The relay appends `[69,77)` t5 (relay ack forward) before broadcasting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Acknowledgement {
    pub id: u64,
    pub t1_controller_tx: u64,
    pub t2_relay_rx: u64,
    pub t3_relay_tx: u64,
    pub consumer_rx: u64,
    pub consumer_ack: u64,
    pub decode_us: u32,
    pub process_us: u32,
    pub encode_us: u32,
    pub t4_relay_ack_rx: u64,
    /// Present only on the 77-byte form broadcast by the relay.
    pub t5_relay_ack_tx: Option<u64>,
}

impl Acknowledgement {
    /// Encodes the 69-byte consumer form. `t5_relay_ack_tx` is not written.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ACK_SIZE);
        buf.put_u8(TAG_ACK);
        buf.put_u64_le(self.id);
        buf.put_u64_le(self.t1_controller_tx);
        buf.put_u64_le(self.t2_relay_rx);
        buf.put_u64_le(self.t3_relay_tx);
        buf.put_u64_le(self.consumer_rx);
        buf.put_u64_le(self.consumer_ack);
        buf.put_u32_le(self.decode_us);
        buf.put_u32_le(self.process_us);
        buf.put_u32_le(self.encode_us);
        buf.put_u64_le(self.t4_relay_ack_rx);
        buf.freeze()
    }

    /// Decodes either the 69-byte consumer form or the 77-byte relayed form.
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        expect_frame(data, FrameType::Acknowledgement)?;
        let u64_at = |off: usize| LittleEndian::read_u64(&data[off..off + 8]);
        let u32_at = |off: usize| LittleEndian::read_u32(&data[off..off + 4]);

        let t5_relay_ack_tx = (data.len() >= RELAYED_ACK_SIZE).then(|| u64_at(ACK_SIZE));

        Ok(Self {
            id: u64_at(1),
            t1_controller_tx: u64_at(9),
            t2_relay_rx: u64_at(17),
            t3_relay_tx: u64_at(25),
            consumer_rx: u64_at(33),
            consumer_ack: u64_at(41),
            decode_us: u32_at(49),
            process_us: u32_at(53),
            encode_us: u32_at(57),
            t4_relay_ack_rx: u64_at(ACK_RELAY_RX_OFFSET),
            t5_relay_ack_tx,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    fn sample() -> Acknowledgement {
        Acknowledgement {
            id: 12345,
            t1_controller_tx: 1000,
            t2_relay_rx: 1005,
            t3_relay_tx: 1006,
            consumer_rx: 1010,
            consumer_ack: 1015,
            decode_us: 50,
            process_us: 100,
            encode_us: 30,
            t4_relay_ack_rx: 0,
            t5_relay_ack_tx: None,
        }
    }

    #[test]
    fn consumer_form_has_wire_layout() {
        let bytes = sample().encode();
        assert_eq!(bytes.len(), ACK_SIZE);
        assert_eq!(bytes[0], TAG_ACK);
        assert_eq!(LittleEndian::read_u64(&bytes[1..9]), 12345);
        assert_eq!(LittleEndian::read_u64(&bytes[41..49]), 1015);
        assert_eq!(LittleEndian::read_u32(&bytes[49..53]), 50);
        assert_eq!(LittleEndian::read_u32(&bytes[57..61]), 30);
        assert_eq!(&bytes[61..69], &[0u8; 8]);
    }

    #[test]
    fn decode_reads_relay_suffix_when_present() {
        let mut wire = sample().encode().to_vec();
        LittleEndian::write_u64(&mut wire[61..69], 1020);
        wire.extend_from_slice(&1021u64.to_le_bytes());

        let ack = Acknowledgement::decode(&wire).unwrap();
        assert_eq!(ack.t4_relay_ack_rx, 1020);
        assert_eq!(ack.t5_relay_ack_tx, Some(1021));
        assert_eq!(ack.process_us, 100);

        let plain = Acknowledgement::decode(&sample().encode()).unwrap();
        assert_eq!(plain, sample());
    }

    #[test]
    fn decode_rejects_short_frames() {
        let bytes = sample().encode();
        assert!(matches!(
            Acknowledgement::decode(&bytes[..ACK_SIZE - 1]),
            Err(FrameError::TooShort { .. })
        ));
    }
}
