//! Binary wire protocol spoken between controllers, the relay and the consumer.
//!
//! All frames are little-endian and fixed-layout; byte 0 is the type tag.
//!
//! | Frame             | Direction          | Size |
//! |-------------------|--------------------|------|
//! | Command           | controller → relay | 65   |
//! | Command           | relay → consumer   | 81   |
//! | Acknowledgement   | consumer → relay   | 69   |
//! | Acknowledgement   | relay → controller | 77   |
//! | ClockSyncRequest  | peer → relay       | 9    |
//! | ClockSyncResponse | relay → peer       | 25   |

pub mod ack;
pub mod clock_sync;
pub mod command;
pub mod constants;
pub mod control;
pub mod errors;
pub mod frame_type;
pub mod inject;

pub use ack::Acknowledgement;
pub use clock_sync::{ClockSyncRequest, ClockSyncResponse};
pub use command::{Command, RelayedCommand, Velocity};
pub use constants::*;
pub use control::ControlMessage;
pub use errors::FrameError;
pub use frame_type::{FrameType, classify};
