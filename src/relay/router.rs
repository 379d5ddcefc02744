use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::clock_sync;
use crate::log::NoopLogSink;
use crate::log::log_sink::LogSink;
use crate::protocol::{ClockSyncRequest, FrameType, classify, inject};
use crate::relay::broadcast::{BroadcastDispatcher, BroadcastReport};
use crate::relay::clock::{Clock, SystemClock};
use crate::relay::errors::RouteError;
use crate::relay::peer::{Peer, PeerId, PeerRole};
use crate::relay::registry::PeerRegistry;
use crate::{sink_debug, sink_trace};

/// What happened to a successfully routed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    ForwardedToConsumer {
        consumer: PeerId,
        command_id: u64,
        t2: u64,
        t3: u64,
    },
    Broadcast {
        command_id: u64,
        t4: u64,
        t5: u64,
        report: BroadcastReport,
    },
    ClockSyncReplied {
        t1: u64,
        t2: u64,
        t3: u64,
    },
}

/// Classifies inbound binary frames and sends them on.
///
/// One `route` call per inbound frame, made by the sender's reader thread,
/// so a peer's frames are handled in receipt order. The router holds no
/// per-frame state; everything shared goes through the registry and the
/// peers' outbound queues.
pub struct FrameRouter {
    registry: Arc<PeerRegistry>,
    broadcast: BroadcastDispatcher,
    clock: Arc<dyn Clock>,
    log: Arc<dyn LogSink>,
}

impl FrameRouter {
    pub fn new(registry: Arc<PeerRegistry>) -> Self {
        Self::with_log_and_clock(registry, Arc::new(NoopLogSink), Arc::new(SystemClock))
    }

    pub fn with_log(registry: Arc<PeerRegistry>, log: Arc<dyn LogSink>) -> Self {
        Self::with_log_and_clock(registry, log, Arc::new(SystemClock))
    }

    /// Fully explicit constructor: custom logger + custom clock.
    pub fn with_log_and_clock(
        registry: Arc<PeerRegistry>,
        log: Arc<dyn LogSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            broadcast: BroadcastDispatcher::new(registry.clone(), log.clone()),
            registry,
            clock,
            log,
        }
    }

    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Main entrypoint: route one binary frame received from `from`.
    pub fn route(&self, from: &Peer, frame: &[u8]) -> Result<Delivery, RouteError> {
        // Receive time of this frame: t2 for commands and clock sync, t4 for acks.
        let rx_time = self.clock.now_ms();

        match classify(frame)? {
            FrameType::Command => self.handle_command(frame, rx_time),
            FrameType::Acknowledgement => self.handle_ack(from, frame, rx_time),
            FrameType::ClockSyncRequest => self.handle_clock_sync(from, frame, rx_time),
            FrameType::ClockSyncResponse => Err(RouteError::RelayOnlyFrame),
        }
    }

    fn handle_command(&self, frame: &[u8], t2: u64) -> Result<Delivery, RouteError> {
        let consumer = self.registry.consumer().ok_or(RouteError::NoConsumer)?;

        let t3 = self.clock.now_ms();
        let extended = inject::command_for_consumer(frame, t2, t3)?;
        consumer.try_send(extended)?;

        let command_id = frame_id(frame);
        sink_trace!(
            self.log,
            "-> consumer {}: command #{} (t2={}, t3={})",
            consumer.id(),
            command_id,
            t2,
            t3
        );
        Ok(Delivery::ForwardedToConsumer {
            consumer: consumer.id(),
            command_id,
            t2,
            t3,
        })
    }

    fn handle_ack(&self, from: &Peer, frame: &[u8], t4: u64) -> Result<Delivery, RouteError> {
        if from.role() != PeerRole::Consumer {
            return Err(RouteError::NotFromConsumer);
        }

        let t5 = self.clock.now_ms();
        let extended = inject::ack_for_controllers(frame, t4, t5)?;
        let report = self.broadcast.dispatch(extended);

        let command_id = frame_id(frame);
        sink_trace!(
            self.log,
            "<- controllers: ack #{} to {} peers, {} dropped (t4={}, t5={})",
            command_id,
            report.delivered,
            report.dropped,
            t4,
            t5
        );
        Ok(Delivery::Broadcast {
            command_id,
            t4,
            t5,
            report,
        })
    }

    fn handle_clock_sync(&self, from: &Peer, frame: &[u8], t2: u64) -> Result<Delivery, RouteError> {
        let request = ClockSyncRequest::decode(frame)?;

        let t3 = self.clock.now_ms();
        let response = clock_sync::respond(request, t2, t3);
        from.try_send(response.encode())?;

        sink_debug!(
            self.log,
            "clock sync for {}: t1={} t2={} t3={}",
            from.id(),
            request.t1,
            t2,
            t3
        );
        Ok(Delivery::ClockSyncReplied {
            t1: request.t1,
            t2,
            t3,
        })
    }
}

/// Command id at `[1,9)`; shared by commands and acknowledgements.
fn frame_id(frame: &[u8]) -> u64 {
    frame
        .get(1..9)
        .map(LittleEndian::read_u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::protocol::*;
    use crate::relay::outbound::{Outbound, OutboundReceiver, outbound_queue};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Advances by one millisecond on every read.
    struct StepClock(AtomicU64);

    impl Clock for StepClock {
        fn now_ms(&self) -> u64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }
    }

    struct Fixture {
        registry: Arc<PeerRegistry>,
        router: FrameRouter,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = Arc::new(PeerRegistry::new());
            let router = FrameRouter::with_log_and_clock(
                registry.clone(),
                Arc::new(NoopLogSink),
                Arc::new(StepClock(AtomicU64::new(5_000))),
            );
            Self { registry, router }
        }

        fn connect(&self, raw: u64, role: PeerRole, cap: usize) -> (Arc<Peer>, OutboundReceiver) {
            let (q, rx) = outbound_queue(cap);
            let peer = Arc::new(Peer::new(PeerId::from_raw(raw), role, q));
            self.registry.add(peer.clone());
            (peer, rx)
        }
    }

    fn frames(rx: &OutboundReceiver) -> Vec<Bytes> {
        rx.drain()
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Frame(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    fn command(id: u64) -> Bytes {
        Command {
            id,
            t1_controller_tx: 1000,
            velocity: Velocity {
                linear: [0.0, 0.5, 0.0],
                angular: [0.0, 0.0, -0.5],
            },
        }
        .encode()
    }

    #[test]
    fn command_is_extended_and_forwarded_to_consumer() {
        let fx = Fixture::new();
        let (ctrl, ctrl_rx) = fx.connect(1, PeerRole::Controller, 8);
        let (_cons, cons_rx) = fx.connect(2, PeerRole::Consumer, 8);

        let cmd = command(7);
        let delivery = fx.router.route(&ctrl, &cmd).unwrap();
        assert!(matches!(
            delivery,
            Delivery::ForwardedToConsumer { command_id: 7, .. }
        ));

        let out = frames(&cons_rx);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), RELAYED_COMMAND_SIZE);
        assert_eq!(&out[0][..COMMAND_SIZE], &cmd[..]);

        let relayed = RelayedCommand::decode(&out[0]).unwrap();
        assert!(relayed.t2_relay_rx <= relayed.t3_relay_tx);
        // Nothing echoed back to the sender.
        assert!(ctrl_rx.drain().is_empty());
    }

    #[test]
    fn random_commands_keep_their_prefix() {
        use rand::Rng;
        let fx = Fixture::new();
        let (ctrl, _ctrl_rx) = fx.connect(1, PeerRole::Controller, 64);
        let (_cons, cons_rx) = fx.connect(2, PeerRole::Consumer, 64);
        let mut rng = rand::thread_rng();

        for _ in 0..32 {
            let mut frame = vec![0u8; COMMAND_SIZE];
            rng.fill(&mut frame[1..]);
            frame[0] = TAG_COMMAND;
            fx.router.route(&ctrl, &frame).unwrap();

            let out = frames(&cons_rx);
            assert_eq!(out.len(), 1);
            assert_eq!(&out[0][..COMMAND_SIZE], &frame[..]);
            let relayed = RelayedCommand::decode(&out[0]).unwrap();
            assert!(relayed.t2_relay_rx < relayed.t3_relay_tx);
        }
    }

    #[test]
    fn command_without_consumer_is_dropped() {
        let fx = Fixture::new();
        let (ctrl, ctrl_rx) = fx.connect(1, PeerRole::Controller, 8);
        let (_other, other_rx) = fx.connect(3, PeerRole::Controller, 8);

        assert_eq!(fx.router.route(&ctrl, &command(1)), Err(RouteError::NoConsumer));
        assert!(ctrl_rx.drain().is_empty());
        assert!(other_rx.drain().is_empty());
    }

    #[test]
    fn latest_consumer_receives_commands() {
        let fx = Fixture::new();
        let (ctrl, _ctrl_rx) = fx.connect(1, PeerRole::Controller, 8);
        let (_old, old_rx) = fx.connect(2, PeerRole::Consumer, 8);
        let (_new, new_rx) = fx.connect(3, PeerRole::Consumer, 8);

        fx.router.route(&ctrl, &command(1)).unwrap();
        assert!(frames(&old_rx).is_empty());
        assert_eq!(frames(&new_rx).len(), 1);
    }

    #[test]
    fn full_consumer_queue_reports_overflow() {
        let fx = Fixture::new();
        let (ctrl, _ctrl_rx) = fx.connect(1, PeerRole::Controller, 8);
        let (_cons, cons_rx) = fx.connect(2, PeerRole::Consumer, 1);

        fx.router.route(&ctrl, &command(1)).unwrap();
        assert_eq!(fx.router.route(&ctrl, &command(2)), Err(RouteError::QueueFull));
        let kept = frames(&cons_rx);
        assert_eq!(kept.len(), 1);
        assert_eq!(Command::decode(&kept[0]).unwrap().id, 1);
    }

    #[test]
    fn ack_from_consumer_is_stamped_and_broadcast_to_controllers_only() {
        let fx = Fixture::new();
        let (_c1, c1_rx) = fx.connect(1, PeerRole::Controller, 8);
        let (_c2, c2_rx) = fx.connect(2, PeerRole::Controller, 8);
        let (cons, cons_rx) = fx.connect(3, PeerRole::Consumer, 8);

        let ack = Acknowledgement {
            id: 7,
            t1_controller_tx: 1000,
            consumer_ack: 1015,
            decode_us: 12,
            ..Default::default()
        }
        .encode();

        let delivery = fx.router.route(&cons, &ack).unwrap();
        match delivery {
            Delivery::Broadcast { command_id, t4, t5, report } => {
                assert_eq!(command_id, 7);
                assert!(t4 <= t5);
                assert_eq!(report.delivered, 2);
            }
            other => panic!("expected broadcast, got {other:?}"),
        }

        for rx in [&c1_rx, &c2_rx] {
            let out = frames(rx);
            assert_eq!(out.len(), 1);
            assert_eq!(out[0].len(), RELAYED_ACK_SIZE);
            assert_eq!(&out[0][..ACK_RELAY_RX_OFFSET], &ack[..ACK_RELAY_RX_OFFSET]);
            let decoded = Acknowledgement::decode(&out[0]).unwrap();
            assert!(decoded.t4_relay_ack_rx <= decoded.t5_relay_ack_tx.unwrap());
            assert_eq!(decoded.decode_us, 12);
        }
        assert!(cons_rx.drain().is_empty());
    }

    #[test]
    fn ack_from_controller_is_ignored() {
        let fx = Fixture::new();
        let (c1, c1_rx) = fx.connect(1, PeerRole::Controller, 8);
        let (_c2, c2_rx) = fx.connect(2, PeerRole::Controller, 8);

        let ack = Acknowledgement::default().encode();
        assert_eq!(fx.router.route(&c1, &ack), Err(RouteError::NotFromConsumer));
        assert!(c1_rx.drain().is_empty());
        assert!(c2_rx.drain().is_empty());
    }

    #[test]
    fn clock_sync_reply_goes_to_requester_only() {
        let fx = Fixture::new();
        let (c1, c1_rx) = fx.connect(1, PeerRole::Controller, 8);
        let (_c2, c2_rx) = fx.connect(2, PeerRole::Controller, 8);
        let (_k, k_rx) = fx.connect(3, PeerRole::Consumer, 8);

        let req = ClockSyncRequest { t1: 100 }.encode();
        let delivery = fx.router.route(&c1, &req).unwrap();
        assert!(matches!(delivery, Delivery::ClockSyncReplied { t1: 100, .. }));

        let out = frames(&c1_rx);
        assert_eq!(out.len(), 1);
        let resp = ClockSyncResponse::decode(&out[0]).unwrap();
        assert_eq!(resp.t1, 100);
        assert!(resp.t2 <= resp.t3);
        assert!(c2_rx.drain().is_empty());
        assert!(k_rx.drain().is_empty());
    }

    #[test]
    fn malformed_frames_are_rejected_without_side_effects() {
        let fx = Fixture::new();
        let (ctrl, ctrl_rx) = fx.connect(1, PeerRole::Controller, 8);
        let (cons, cons_rx) = fx.connect(2, PeerRole::Consumer, 8);
        let before = fx.registry.status();

        let cases: Vec<(&Peer, Vec<u8>)> = vec![
            (&*ctrl, vec![]),
            (&*ctrl, vec![TAG_COMMAND; COMMAND_SIZE - 1]),
            (&*cons, vec![TAG_ACK; ACK_SIZE - 1]),
            (&*ctrl, vec![TAG_CLOCK_SYNC_REQUEST; 4]),
            (&*ctrl, vec![0x99, 1, 2, 3]),
        ];
        for (peer, frame) in cases {
            let err = fx.router.route(peer, &frame).unwrap_err();
            assert!(matches!(err, RouteError::Protocol(_)), "got {err:?}");
        }

        let resp = ClockSyncResponse { t1: 1, t2: 2, t3: 3 }.encode();
        assert_eq!(fx.router.route(&ctrl, &resp), Err(RouteError::RelayOnlyFrame));

        assert_eq!(fx.registry.status(), before);
        assert!(ctrl_rx.drain().is_empty());
        assert!(cons_rx.drain().is_empty());
    }
}
