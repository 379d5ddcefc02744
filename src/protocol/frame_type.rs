use crate::protocol::constants::*;
use crate::protocol::FrameError;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum FrameType {
    Command = TAG_COMMAND,
    Acknowledgement = TAG_ACK,
    ClockSyncRequest = TAG_CLOCK_SYNC_REQUEST,
    ClockSyncResponse = TAG_CLOCK_SYNC_RESPONSE,
}

impl FrameType {
    pub fn from_u8(v: u8) -> Result<FrameType, FrameError> {
        use FrameType::*;
        match v {
            TAG_COMMAND => Ok(Command),
            TAG_ACK => Ok(Acknowledgement),
            TAG_CLOCK_SYNC_REQUEST => Ok(ClockSyncRequest),
            TAG_CLOCK_SYNC_RESPONSE => Ok(ClockSyncResponse),
            other => Err(FrameError::UnknownType(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Minimum length of an inbound frame of this type.
    pub fn min_len(self) -> usize {
        match self {
            FrameType::Command => COMMAND_SIZE,
            FrameType::Acknowledgement => ACK_SIZE,
            FrameType::ClockSyncRequest => CLOCK_SYNC_REQUEST_SIZE,
            FrameType::ClockSyncResponse => CLOCK_SYNC_RESPONSE_SIZE,
        }
    }
}

/// Reads the type tag and enforces the type's minimum length.
///
/// Longer frames are accepted; only the leading `min_len` bytes are meaningful.
pub fn classify(data: &[u8]) -> Result<FrameType, FrameError> {
    let tag = *data.first().ok_or(FrameError::Empty)?;
    let kind = FrameType::from_u8(tag)?;
    let min = kind.min_len();
    if data.len() < min {
        return Err(FrameError::TooShort {
            kind,
            len: data.len(),
            min,
        });
    }
    Ok(kind)
}

/// Shared guard for typed decoders: the tag must match and the frame must be long enough.
pub(crate) fn expect_frame(data: &[u8], expected: FrameType) -> Result<(), FrameError> {
    let tag = *data.first().ok_or(FrameError::Empty)?;
    if tag != expected.as_u8() {
        return Err(FrameError::UnexpectedType {
            expected,
            actual: tag,
        });
    }
    if data.len() < expected.min_len() {
        return Err(FrameError::TooShort {
            kind: expected,
            len: data.len(),
            min: expected.min_len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_accepts_minimum_and_longer_frames() {
        let mut cmd = vec![0u8; COMMAND_SIZE];
        cmd[0] = TAG_COMMAND;
        assert_eq!(classify(&cmd), Ok(FrameType::Command));
        cmd.push(0xff);
        assert_eq!(classify(&cmd), Ok(FrameType::Command));
    }

    #[test]
    fn classify_rejects_empty_unknown_and_short() {
        assert_eq!(classify(&[]), Err(FrameError::Empty));
        assert_eq!(classify(&[0x7f, 1, 2]), Err(FrameError::UnknownType(0x7f)));
        assert_eq!(
            classify(&[TAG_ACK; 68]),
            Err(FrameError::TooShort {
                kind: FrameType::Acknowledgement,
                len: 68,
                min: ACK_SIZE
            })
        );
        assert_eq!(
            classify(&[TAG_CLOCK_SYNC_REQUEST]),
            Err(FrameError::TooShort {
                kind: FrameType::ClockSyncRequest,
                len: 1,
                min: CLOCK_SYNC_REQUEST_SIZE
            })
        );
    }

    #[test]
    fn expect_frame_checks_tag_first() {
        let req = [TAG_CLOCK_SYNC_REQUEST, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(expect_frame(&req, FrameType::ClockSyncRequest).is_ok());
        assert_eq!(
            expect_frame(&req, FrameType::Command),
            Err(FrameError::UnexpectedType {
                expected: FrameType::Command,
                actual: TAG_CLOCK_SYNC_REQUEST
            })
        );
    }
}
