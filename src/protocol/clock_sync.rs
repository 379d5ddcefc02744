use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::constants::*;
use crate::protocol::frame_type::{FrameType, expect_frame};
use crate::protocol::FrameError;

/// `[0]` tag, `[1,9)` t1 requester send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSyncRequest {
    pub t1: u64,
}

impl ClockSyncRequest {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(CLOCK_SYNC_REQUEST_SIZE);
        buf.put_u8(TAG_CLOCK_SYNC_REQUEST);
        buf.put_u64_le(self.t1);
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        expect_frame(data, FrameType::ClockSyncRequest)?;
        Ok(Self {
            t1: LittleEndian::read_u64(&data[1..9]),
        })
    }
}

/// `[0]` tag, `[1,9)` t1 echoed, `[9,17)` t2 relay receive, `[17,25)` t3 relay send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSyncResponse {
    pub t1: u64,
    pub t2: u64,
    pub t3: u64,
}

impl ClockSyncResponse {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(CLOCK_SYNC_RESPONSE_SIZE);
        buf.put_u8(TAG_CLOCK_SYNC_RESPONSE);
        buf.put_u64_le(self.t1);
        buf.put_u64_le(self.t2);
        buf.put_u64_le(self.t3);
        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        expect_frame(data, FrameType::ClockSyncResponse)?;
        Ok(Self {
            t1: LittleEndian::read_u64(&data[1..9]),
            t2: LittleEndian::read_u64(&data[9..17]),
            t3: LittleEndian::read_u64(&data[17..25]),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn request_and_response_sizes() {
        assert_eq!(ClockSyncRequest { t1: 1 }.encode().len(), CLOCK_SYNC_REQUEST_SIZE);
        let resp = ClockSyncResponse { t1: 1000, t2: 1005, t3: 1006 };
        let wire = resp.encode();
        assert_eq!(wire.len(), CLOCK_SYNC_RESPONSE_SIZE);
        assert_eq!(wire[0], TAG_CLOCK_SYNC_RESPONSE);
        assert_eq!(ClockSyncResponse::decode(&wire).unwrap(), resp);
    }

    #[test]
    fn response_decode_rejects_request_frame() {
        let req = ClockSyncRequest { t1: 99 }.encode();
        assert!(ClockSyncResponse::decode(&req).is_err());
        assert_eq!(ClockSyncRequest::decode(&req).unwrap().t1, 99);
    }
}
