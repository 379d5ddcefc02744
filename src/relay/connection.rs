use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};

use crate::config::RelayConfig;
use crate::log::log_sink::LogSink;
use crate::protocol::ControlMessage;
use crate::relay::errors::{RouteError, TransportError};
use crate::relay::handshake::{self, ReaderStream};
use crate::relay::outbound::{Outbound, OutboundReceiver, outbound_queue};
use crate::relay::peer::{Peer, PeerId};
use crate::relay::registry::PeerRegistry;
use crate::relay::router::FrameRouter;
use crate::{sink_debug, sink_info, sink_trace, sink_warn};

/// Shared state every connection thread needs.
#[derive(Clone)]
pub struct ConnectionContext {
    pub config: Arc<RelayConfig>,
    pub registry: Arc<PeerRegistry>,
    pub router: Arc<FrameRouter>,
    pub log: Arc<dyn LogSink>,
}

/// Runs one peer from upgrade to teardown on the calling thread.
///
/// The calling thread becomes the peer's Reader; a Writer thread is spawned
/// for the outbound queue. Returns once both are done and the peer is gone
/// from the registry.
pub fn serve_connection(stream: TcpStream, ctx: &ConnectionContext) -> Result<(), TransportError> {
    let remote = stream
        .peer_addr()
        .map_or_else(|_| "<unknown>".to_owned(), |a| a.to_string());

    let accepted = handshake::accept(stream, &ctx.config.ws_path, ctx.config.handshake_timeout)?;
    let mut reader = accepted.socket;

    let socket = reader.get_ref().inner().try_clone()?;
    configure_socket(&socket, &ctx.config)?;
    reader.get_mut().mute_writes();
    let mut writer = WebSocket::from_raw_socket(socket.try_clone()?, Role::Server, None);

    let (queue, rx) = outbound_queue(ctx.config.queue_capacity);
    let peer = Arc::new(Peer::new(PeerId::generate(), accepted.role, queue));
    let id = peer.id();

    if let Some(previous) = ctx.registry.add(peer.clone()) {
        sink_info!(
            ctx.log,
            "consumer {} superseded by {} (old connection left open)",
            previous.id(),
            id
        );
    }
    sink_info!(
        ctx.log,
        "peer {} connected from {} as {} ({})",
        id,
        remote,
        peer.role(),
        ctx.registry.status()
    );

    let closed = Arc::new(AtomicBool::new(false));

    let writer_thread = send_welcome(&mut writer, id).and_then(|()| {
        let closed = closed.clone();
        let log = ctx.log.clone();
        let keepalive = ctx.config.keepalive;
        thread::Builder::new()
            .name(format!("writer-{id}"))
            .spawn(move || run_writer(writer, rx, keepalive, &closed, log.as_ref(), id))
            .map_err(TransportError::from)
    });

    let exit = match writer_thread {
        Ok(handle) => Some((run_reader(&mut reader, &peer, ctx, &closed), handle)),
        Err(e) => {
            sink_warn!(ctx.log, "peer {} could not be started: {}", id, e);
            None
        }
    };

    // Teardown.
    closed.store(true, Ordering::Release);
    let result = match exit {
        Some((exit, handle)) => {
            // A peer-initiated close still gets the writer's close reply.
            if !matches!(exit, Err(TransportError::ClosedByPeer)) {
                let _ = socket.shutdown(Shutdown::Both);
            }
            ctx.registry.remove(id);
            peer.outbound().push_close();
            let _ = handle.join();
            exit
        }
        None => {
            ctx.registry.remove(id);
            Ok(())
        }
    };
    let _ = socket.shutdown(Shutdown::Both);

    match &result {
        Ok(()) | Err(TransportError::ClosedByPeer) => {
            sink_info!(ctx.log, "peer {} disconnected ({})", id, ctx.registry.status());
        }
        Err(e) => {
            sink_warn!(ctx.log, "peer {} dropped: {} ({})", id, e, ctx.registry.status());
        }
    }
    result
}

/// Replaces the handshake timeouts with the steady-state ones: reads poll at
/// `read_poll`, writes block for as long as the peer needs.
fn configure_socket(socket: &TcpStream, config: &RelayConfig) -> io::Result<()> {
    socket.set_read_timeout(Some(config.read_poll))?;
    socket.set_write_timeout(None)
}

fn send_welcome(writer: &mut WebSocket<TcpStream>, id: PeerId) -> Result<(), TransportError> {
    let welcome = ControlMessage::Welcome {
        peer_id: id.to_string(),
    }
    .to_json()?;
    writer.send(Message::text(welcome))?;
    Ok(())
}

/// Reads until the peer closes, the transport fails, the inactivity deadline
/// passes, or the writer raises `closed`.
///
/// Inbound traffic of any kind (frames, pings, pongs) pushes the deadline
/// back. `Ok(())` means the writer ended the connection.
fn run_reader(
    ws: &mut WebSocket<ReaderStream>,
    peer: &Peer,
    ctx: &ConnectionContext,
    closed: &AtomicBool,
) -> Result<(), TransportError> {
    let inactivity = ctx.config.inactivity_timeout;
    let mut last_seen = Instant::now();

    loop {
        if closed.load(Ordering::Acquire) {
            return Ok(());
        }

        match ws.read() {
            Ok(Message::Binary(frame)) => {
                last_seen = Instant::now();
                match ctx.router.route(peer, &frame) {
                    Ok(delivery) => sink_trace!(ctx.log, "peer {}: {:?}", peer.id(), delivery),
                    Err(e) => log_drop(ctx.log.as_ref(), peer.id(), frame.len(), &e),
                }
            }
            Ok(Message::Ping(payload)) => {
                last_seen = Instant::now();
                queue_pong(peer, payload, ctx.log.as_ref());
            }
            Ok(Message::Pong(_)) => last_seen = Instant::now(),
            Ok(Message::Text(text)) => {
                last_seen = Instant::now();
                sink_debug!(ctx.log, "peer {}: ignoring text message ({} bytes)", peer.id(), text.len());
            }
            Ok(Message::Close(_)) => return Err(TransportError::ClosedByPeer),
            Ok(Message::Frame(_)) => {}
            Err(tungstenite::Error::Io(e)) if is_poll_timeout(&e) => {
                if last_seen.elapsed() >= inactivity {
                    return Err(TransportError::InactivityTimeout(inactivity));
                }
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Err(TransportError::ClosedByPeer);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Drains the outbound queue into the socket and pings every `keepalive`,
/// whether or not frames are flowing. On a send failure it raises `closed`
/// and shuts the socket down so the reader wakes up.
fn run_writer(
    mut ws: WebSocket<TcpStream>,
    rx: OutboundReceiver,
    keepalive: Duration,
    closed: &AtomicBool,
    log: &dyn LogSink,
    id: PeerId,
) {
    let mut pings = PingSchedule::new(Instant::now(), keepalive);

    loop {
        let now = Instant::now();
        let msg = if pings.due(now) {
            pings.advance(now);
            sink_trace!(log, "peer {}: keepalive ping", id);
            Message::Ping(Bytes::new())
        } else {
            match rx.recv_timeout(pings.wait(now)) {
                Ok(Outbound::Frame(frame)) => Message::Binary(frame),
                Ok(Outbound::Pong(payload)) => Message::Pong(payload),
                Ok(Outbound::Close) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = ws.close(None);
                    let _ = ws.flush();
                    break;
                }
                Err(RecvTimeoutError::Timeout) => continue,
            }
        };

        if let Err(e) = ws.send(msg) {
            if !closed.load(Ordering::Acquire) {
                sink_warn!(log, "peer {}: write failed: {}", id, e);
            }
            closed.store(true, Ordering::Release);
            let _ = ws.get_ref().shutdown(Shutdown::Both);
            break;
        }
    }
}

/// Fixed-rate keepalive deadline, independent of data traffic.
#[derive(Debug, Clone, Copy)]
struct PingSchedule {
    next: Instant,
    every: Duration,
}

impl PingSchedule {
    fn new(start: Instant, every: Duration) -> Self {
        Self {
            next: start + every,
            every,
        }
    }

    fn due(&self, now: Instant) -> bool {
        now >= self.next
    }

    /// Time left until the next ping.
    fn wait(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }

    /// Schedules the next ping one period out. A writer that fell behind
    /// skips the missed slots instead of pinging in a burst.
    fn advance(&mut self, now: Instant) {
        self.next += self.every;
        if self.next <= now {
            self.next = now + self.every;
        }
    }
}

/// Pong goes through the writer; a full queue skips this one.
fn queue_pong(peer: &Peer, payload: Bytes, log: &dyn LogSink) -> bool {
    match peer.outbound().try_push(Outbound::Pong(payload)) {
        Ok(()) => true,
        Err(e) => {
            sink_debug!(log, "peer {}: pong not queued: {}", peer.id(), e);
            false
        }
    }
}

fn is_poll_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Overflow and missing-consumer drops are operator-visible; the rest is
/// expected noise from misbehaving peers.
fn log_drop(log: &dyn LogSink, id: PeerId, len: usize, err: &RouteError) {
    match err {
        RouteError::NoConsumer | RouteError::QueueFull => {
            sink_warn!(log, "peer {}: dropped {}-byte frame: {}", id, len, err);
        }
        _ => {
            sink_debug!(log, "peer {}: dropped {}-byte frame: {}", id, len, err);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::log_level::LogLevel;
    use crate::relay::outbound::outbound_queue;
    use crate::relay::peer::PeerRole;
    use std::net::TcpListener;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CaptureSink(Mutex<Vec<(LogLevel, String)>>);

    impl LogSink for CaptureSink {
        fn log(&self, level: LogLevel, msg: &str, _target: &'static str) {
            self.0.lock().unwrap().push((level, msg.to_owned()));
        }
    }

    #[test]
    fn pong_dropped_on_full_queue_is_reported() {
        let (q, rx) = outbound_queue(1);
        let peer = Peer::new(PeerId::from_raw(5), PeerRole::Controller, q);
        let sink = CaptureSink::default();

        assert!(queue_pong(&peer, Bytes::from_static(b"a"), &sink));
        assert!(!queue_pong(&peer, Bytes::from_static(b"b"), &sink));
        assert_eq!(rx.drain(), vec![Outbound::Pong(Bytes::from_static(b"a"))]);

        #[cfg(feature = "log-debug")]
        {
            let lines = sink.0.lock().unwrap();
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].0, LogLevel::Debug);
            assert!(lines[0].1.contains("pong not queued"));
        }
    }

    #[test]
    fn pings_stay_on_schedule_under_constant_traffic() {
        let start = Instant::now();
        let every = Duration::from_millis(300);
        let mut pings = PingSchedule::new(start, every);

        // A frame every 50ms never postpones the ping.
        let mut sent = 0;
        for step in 1..=20u32 {
            let now = start + Duration::from_millis(50) * step;
            if pings.due(now) {
                pings.advance(now);
                sent += 1;
            }
            assert!(pings.wait(now) <= every);
        }
        assert_eq!(sent, 3);
    }

    #[test]
    fn late_writer_does_not_burst_pings() {
        let start = Instant::now();
        let every = Duration::from_millis(100);
        let mut pings = PingSchedule::new(start, every);

        let late = start + Duration::from_millis(550);
        assert!(pings.due(late));
        pings.advance(late);
        assert!(!pings.due(late));
        assert_eq!(pings.wait(late), every);
    }

    #[test]
    fn steady_state_socket_has_no_write_deadline() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        // As left behind by the handshake.
        server_side.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        server_side.set_write_timeout(Some(Duration::from_secs(10))).unwrap();

        let config = RelayConfig {
            read_poll: Duration::from_millis(40),
            ..RelayConfig::default()
        };
        configure_socket(&server_side, &config).unwrap();

        assert_eq!(server_side.write_timeout().unwrap(), None);
        assert_eq!(server_side.read_timeout().unwrap(), Some(Duration::from_millis(40)));
        drop(client);
    }
}
