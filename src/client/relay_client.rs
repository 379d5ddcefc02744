use std::collections::VecDeque;
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::HandshakeError;
use tungstenite::{Message, WebSocket};

use crate::client::relay_client_error::RelayClientError;
use crate::clock_sync::{ClockSyncEstimator, SyncSample};
use crate::protocol::{
    Acknowledgement, ClockSyncRequest, ClockSyncResponse, Command, ControlMessage, FrameType,
    classify,
};
use crate::relay::clock::now_millis;
use crate::relay::handshake::ROLE_QUERY_KEY;
use crate::relay::peer::PeerRole;

/// Blocking relay client used by the probe binary and the end-to-end tests.
///
/// One thread drives it; reads and writes share the socket. Frames that
/// arrive while a clock sync exchange is waiting for its response are kept
/// and handed out by later [`recv_frame`](Self::recv_frame) calls.
pub struct RelayClient {
    ws: WebSocket<TcpStream>,
    peer_id: String,
    role: PeerRole,
    pending: VecDeque<Bytes>,
    estimator: ClockSyncEstimator,
}

impl RelayClient {
    /// Connects to `url` (e.g. `ws://127.0.0.1:8080/ws/data`), announcing
    /// `role`, and waits up to `timeout` for the welcome message.
    pub fn connect(url: &str, role: PeerRole, timeout: Duration) -> Result<Self, RelayClientError> {
        let url = with_role(url, role);
        let request = url.as_str().into_client_request()?;

        let host = request
            .uri()
            .host()
            .ok_or_else(|| RelayClientError::Handshake(format!("no host in {url}")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_owned();
        let port = request.uri().port_u16().unwrap_or(80);

        let stream = TcpStream::connect((host.as_str(), port))?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let (ws, _response) = tungstenite::client(request, stream).map_err(|e| match e {
            HandshakeError::Interrupted(_) => RelayClientError::Timeout,
            HandshakeError::Failure(e) => RelayClientError::Handshake(e.to_string()),
        })?;

        let mut client = Self {
            ws,
            peer_id: String::new(),
            role,
            pending: VecDeque::new(),
            estimator: ClockSyncEstimator::new(),
        };
        client.peer_id = client.read_welcome(timeout)?;
        Ok(client)
    }

    /// Id the relay assigned to this connection.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn role(&self) -> PeerRole {
        self.role
    }

    pub fn estimator(&self) -> &ClockSyncEstimator {
        &self.estimator
    }

    pub fn send_command(&mut self, command: &Command) -> Result<(), RelayClientError> {
        self.send_raw(command.encode())
    }

    pub fn send_ack(&mut self, ack: &Acknowledgement) -> Result<(), RelayClientError> {
        self.send_raw(ack.encode())
    }

    /// Sends arbitrary bytes as one binary message, malformed or not.
    pub fn send_raw(&mut self, frame: Bytes) -> Result<(), RelayClientError> {
        self.ws.send(Message::Binary(frame))?;
        Ok(())
    }

    /// Next binary frame, or [`RelayClientError::Timeout`] after `timeout`.
    pub fn recv_frame(&mut self, timeout: Duration) -> Result<Bytes, RelayClientError> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(frame);
        }
        self.read_binary(Instant::now() + timeout)
    }

    /// One request/response exchange; the sample is also fed to the estimator.
    pub fn sync_clock_once(&mut self, timeout: Duration) -> Result<SyncSample, RelayClientError> {
        let t1 = now_millis();
        self.send_raw(ClockSyncRequest { t1 }.encode())?;

        let deadline = Instant::now() + timeout;
        loop {
            let frame = self.read_binary(deadline)?;
            if classify(&frame) == Ok(FrameType::ClockSyncResponse) {
                let response = ClockSyncResponse::decode(&frame)?;
                if response.t1 == t1 {
                    let sample = SyncSample::from_response(&response, now_millis());
                    self.estimator.record(sample);
                    return Ok(sample);
                }
                // Stale response to an earlier, timed-out request.
                continue;
            }
            self.pending.push_back(frame);
        }
    }

    /// Runs `samples` exchanges, `interval` apart.
    pub fn sync_clock(
        &mut self,
        samples: usize,
        interval: Duration,
        timeout: Duration,
    ) -> Result<&ClockSyncEstimator, RelayClientError> {
        for i in 0..samples {
            if i > 0 {
                thread::sleep(interval);
            }
            self.sync_clock_once(timeout)?;
        }
        Ok(&self.estimator)
    }

    /// Sends a close frame and waits briefly for the relay's reply.
    pub fn close(mut self) -> Result<(), RelayClientError> {
        self.ws.close(None)?;
        let deadline = Instant::now() + Duration::from_secs(1);
        loop {
            match self.read_message(deadline) {
                Ok(_) => continue,
                Err(RelayClientError::Closed | RelayClientError::Timeout) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    fn read_welcome(&mut self, timeout: Duration) -> Result<String, RelayClientError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.read_message(deadline)? {
                Message::Text(text) => {
                    let ControlMessage::Welcome { peer_id } = ControlMessage::from_json(&text)?;
                    return Ok(peer_id);
                }
                Message::Binary(frame) => self.pending.push_back(frame),
                _ => {}
            }
        }
    }

    fn read_binary(&mut self, deadline: Instant) -> Result<Bytes, RelayClientError> {
        loop {
            if let Message::Binary(frame) = self.read_message(deadline)? {
                return Ok(frame);
            }
        }
    }

    fn read_message(&mut self, deadline: Instant) -> Result<Message, RelayClientError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(RelayClientError::Timeout);
        }
        self.ws.get_ref().set_read_timeout(Some(remaining))?;

        match self.ws.read()? {
            Message::Close(_) => Err(RelayClientError::Closed),
            other => Ok(other),
        }
    }
}

/// Appends the role query parameter to `url`.
fn with_role(url: &str, role: PeerRole) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{ROLE_QUERY_KEY}={}", role.as_hint())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_is_appended_to_query() {
        assert_eq!(
            with_role("ws://h:1/ws/data", PeerRole::Consumer),
            "ws://h:1/ws/data?type=consumer"
        );
        assert_eq!(
            with_role("ws://h:1/ws/data?x=1", PeerRole::Controller),
            "ws://h:1/ws/data?x=1&type=controller"
        );
    }
}
