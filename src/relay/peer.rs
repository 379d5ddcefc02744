use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::relay::outbound::{EnqueueError, Outbound, OutboundQueue};

/// Opaque peer identifier, rendered as `peer_<nanos>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

static LAST_PEER_ID: AtomicU64 = AtomicU64::new(0);

impl PeerId {
    /// Time-derived id: nanoseconds since the Unix epoch, bumped so ids are
    /// strictly increasing within the process.
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let prev = LAST_PEER_ID
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        PeerId(now.max(prev + 1))
    }

    pub fn from_raw(raw: u64) -> Self {
        PeerId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    /// Issues commands, receives acknowledgements. Any number may connect.
    Controller,
    /// Executes commands and produces acknowledgements. Only the most
    /// recently connected one is addressable.
    Consumer,
}

impl PeerRole {
    /// Maps the `type` query parameter of the upgrade request to a role.
    /// Anything unrecognised, including no hint at all, is a controller.
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint.map(str::trim) {
            Some(h) if h.eq_ignore_ascii_case("consumer") || h.eq_ignore_ascii_case("python") => {
                PeerRole::Consumer
            }
            _ => PeerRole::Controller,
        }
    }

    /// Value sent in the `type` query parameter by [`RelayClient`](crate::client::RelayClient).
    pub fn as_hint(self) -> &'static str {
        match self {
            PeerRole::Controller => "controller",
            PeerRole::Consumer => "consumer",
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_hint())
    }
}

/// A connected peer as seen by the registry and the router.
///
/// The peer's socket is owned by its connection thread; everything else
/// reaches the peer only through its bounded outbound queue.
#[derive(Debug)]
pub struct Peer {
    id: PeerId,
    role: PeerRole,
    outbound: OutboundQueue,
}

impl Peer {
    pub fn new(id: PeerId, role: PeerRole, outbound: OutboundQueue) -> Self {
        Self { id, role, outbound }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    /// Non-blocking enqueue of a binary frame.
    pub fn try_send(&self, frame: Bytes) -> Result<(), EnqueueError> {
        self.outbound.try_push(Outbound::Frame(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn generated_ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| thread::spawn(|| (0..500).map(|_| PeerId::generate()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap_or_default() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn id_renders_with_prefix() {
        assert_eq!(PeerId::from_raw(17).to_string(), "peer_17");
    }

    #[test]
    fn role_hint_defaults_to_controller() {
        assert_eq!(PeerRole::from_hint(None), PeerRole::Controller);
        assert_eq!(PeerRole::from_hint(Some("")), PeerRole::Controller);
        assert_eq!(PeerRole::from_hint(Some("web")), PeerRole::Controller);
        assert_eq!(PeerRole::from_hint(Some("python")), PeerRole::Consumer);
        assert_eq!(PeerRole::from_hint(Some("Consumer")), PeerRole::Consumer);
    }
}
