use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::time::Duration;

use bytes::Bytes;

/// Items consumed by a peer's writer thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Binary frame to transmit.
    Frame(Bytes),
    /// Reply to a liveness probe the peer sent us.
    Pong(Bytes),
    /// Send a close frame and stop the writer.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// Queue at capacity; the item was dropped.
    Full,
    /// Writer is gone; the item was dropped.
    Closed,
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "outbound queue full"),
            Self::Closed => write!(f, "outbound queue closed"),
        }
    }
}

impl std::error::Error for EnqueueError {}

/// Producer side of a peer's bounded FIFO outbound queue.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: SyncSender<Outbound>,
}

/// Consumer side, owned by the writer thread.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: Receiver<Outbound>,
}

/// Creates a bounded queue holding at most `capacity` items.
pub fn outbound_queue(capacity: usize) -> (OutboundQueue, OutboundReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (OutboundQueue { tx }, OutboundReceiver { rx })
}

impl OutboundQueue {
    /// Never blocks: a full queue drops the new item.
    pub fn try_push(&self, item: Outbound) -> Result<(), EnqueueError> {
        self.tx.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Disconnected(_) => EnqueueError::Closed,
        })
    }

    /// Blocking push of [`Outbound::Close`], used only during teardown so the
    /// close request is not lost behind a full queue. Returns `false` when the
    /// writer already exited.
    pub fn push_close(&self) -> bool {
        self.tx.send(Outbound::Close).is_ok()
    }
}

impl OutboundReceiver {
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Outbound, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<Outbound, TryRecvError> {
        self.rx.try_recv()
    }

    /// Drains everything currently queued without blocking.
    pub fn drain(&self) -> Vec<Outbound> {
        self.rx.try_iter().collect()
    }
}
