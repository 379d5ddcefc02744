use std::sync::Arc;

use bytes::Bytes;

use crate::log::log_sink::LogSink;
use crate::relay::outbound::EnqueueError;
use crate::relay::registry::PeerRegistry;
use crate::{sink_debug, sink_warn};

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Controllers whose queue was full.
    pub dropped: usize,
    /// Controllers whose writer already exited.
    pub closed: usize,
}

/// Fans a frame out to every registered controller.
///
/// Each enqueue is independent and non-blocking: one saturated controller
/// loses the frame, the others still get it, and the caller never waits.
pub struct BroadcastDispatcher {
    registry: Arc<PeerRegistry>,
    log: Arc<dyn LogSink>,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<PeerRegistry>, log: Arc<dyn LogSink>) -> Self {
        Self { registry, log }
    }

    pub fn dispatch(&self, frame: Bytes) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for controller in self.registry.controllers() {
            match controller.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(EnqueueError::Full) => {
                    report.dropped += 1;
                    sink_warn!(
                        self.log,
                        "controller {} queue full, dropping ack ({} bytes)",
                        controller.id(),
                        frame.len()
                    );
                }
                Err(EnqueueError::Closed) => {
                    report.closed += 1;
                    sink_debug!(
                        self.log,
                        "controller {} is closing, skipping ack",
                        controller.id()
                    );
                }
            }
        }

        report
    }
}
