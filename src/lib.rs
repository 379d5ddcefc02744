//! Teleop relay: a WebSocket hub between robot controllers and a single
//! consumer.
//!
//! Controllers send fixed-layout binary commands, the relay stamps them with
//! its receive and send times and forwards them to the consumer; the
//! consumer's acknowledgements are stamped again and fanned out to every
//! controller. Peers can also measure their clock offset to the relay.
//!
//! It provides two binaries:
//! - `relay_server`: the relay itself.
//! - `relay_probe`: a command-line client that connects and measures clock offset.

/// Blocking client for the relay protocol.
pub mod client;
/// Offset estimation between a peer and the relay clock.
pub mod clock_sync;
/// Handles configuration loading and management.
pub mod config;
/// Logging utilities for the relay.
pub mod log;
/// Binary frame formats and timestamp injection.
pub mod protocol;
/// Peer registry, routing and per-connection threads.
pub mod relay;
