//! Relay core: peers, routing, fan-out and per-connection threads.

pub mod broadcast;
pub mod clock;
pub mod connection;
pub mod errors;
pub mod handshake;
pub mod outbound;
pub mod peer;
pub mod registry;
pub mod router;
pub mod server;

pub use broadcast::{BroadcastDispatcher, BroadcastReport};
pub use clock::{Clock, SystemClock, now_millis};
pub use errors::{RouteError, TransportError};
pub use outbound::{EnqueueError, Outbound, OutboundQueue, OutboundReceiver, outbound_queue};
pub use peer::{Peer, PeerId, PeerRole};
pub use registry::{PeerRegistry, RegistryStatus};
pub use router::{Delivery, FrameRouter};
pub use server::RelayServer;
