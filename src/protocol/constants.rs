/// Wire constants: type tags, frame sizes and the relay-owned field offsets.
///
/// Timestamps are `u64` milliseconds since the Unix epoch; consumer stage
/// durations are `u32` microseconds.
pub const TAG_COMMAND: u8 = 0x01;
pub const TAG_ACK: u8 = 0x02;
pub const TAG_CLOCK_SYNC_REQUEST: u8 = 0x03;
pub const TAG_CLOCK_SYNC_RESPONSE: u8 = 0x04;

/// Command as sent by a controller.
pub const COMMAND_SIZE: usize = 65;
/// Command with relay t2/t3 appended, as delivered to the consumer.
pub const RELAYED_COMMAND_SIZE: usize = 81;
/// Acknowledgement as sent by the consumer.
pub const ACK_SIZE: usize = 69;
/// Acknowledgement with t4 filled in and t5 appended, as broadcast to controllers.
pub const RELAYED_ACK_SIZE: usize = 77;
pub const CLOCK_SYNC_REQUEST_SIZE: usize = 9;
pub const CLOCK_SYNC_RESPONSE_SIZE: usize = 25;

/// Reserved 8-byte slot in the acknowledgement that the relay overwrites with t4.
pub const ACK_RELAY_RX_OFFSET: usize = 61;
