use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::relay::peer::{Peer, PeerId, PeerRole};

/// Snapshot of registry occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStatus {
    pub total_peers: usize,
    pub controllers: usize,
    pub consumer_connected: bool,
}

impl fmt::Display for RegistryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} controllers={} consumer={}",
            self.total_peers,
            self.controllers,
            if self.consumer_connected { "yes" } else { "no" }
        )
    }
}

#[derive(Debug, Default)]
struct Inner {
    peers: HashMap<PeerId, Arc<Peer>>,
    controllers: HashMap<PeerId, Arc<Peer>>,
    /// Addressable consumer. Last one added wins.
    consumer: Option<Arc<Peer>>,
}

/// Thread-safe store of connected peers.
///
/// Written by connection threads on connect/disconnect, read by every routed
/// frame, hence the readers-writer lock. A panic while holding the lock
/// cannot leave the maps half-updated (each operation mutates under one
/// guard), so a poisoned lock is simply recovered.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    inner: RwLock<Inner>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `peer`. A consumer replaces the addressable consumer and the
    /// previous one is returned; it stays registered and its connection is
    /// left alone.
    pub fn add(&self, peer: Arc<Peer>) -> Option<Arc<Peer>> {
        let mut inner = self.write();
        inner.peers.insert(peer.id(), peer.clone());
        match peer.role() {
            PeerRole::Controller => {
                inner.controllers.insert(peer.id(), peer);
                None
            }
            PeerRole::Consumer => inner.consumer.replace(peer),
        }
    }

    /// Removes the peer. The consumer slot is cleared only if it still points
    /// at this very peer, so a superseded consumer leaving does not unset its
    /// successor.
    pub fn remove(&self, id: PeerId) -> Option<Arc<Peer>> {
        let mut inner = self.write();
        let removed = inner.peers.remove(&id);
        inner.controllers.remove(&id);
        if inner.consumer.as_ref().is_some_and(|c| c.id() == id) {
            inner.consumer = None;
        }
        removed
    }

    pub fn consumer(&self) -> Option<Arc<Peer>> {
        self.read().consumer.clone()
    }

    /// Snapshot of the controllers; the lock is released before the caller
    /// touches any queue.
    pub fn controllers(&self) -> Vec<Arc<Peer>> {
        self.read().controllers.values().cloned().collect()
    }

    pub fn get(&self, id: PeerId) -> Option<Arc<Peer>> {
        self.read().peers.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self) -> RegistryStatus {
        let inner = self.read();
        RegistryStatus {
            total_peers: inner.peers.len(),
            controllers: inner.controllers.len(),
            consumer_connected: inner.consumer.is_some(),
        }
    }
}
