use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tungstenite::handshake::HandshakeError;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::{WebSocket, accept_hdr};

use crate::relay::errors::TransportError;
use crate::relay::peer::PeerRole;

/// Query parameter carrying the role hint, e.g. `/ws/data?type=consumer`.
pub const ROLE_QUERY_KEY: &str = "type";

/// Read half of a peer socket.
///
/// The handshake needs to write its HTTP response through this stream; after
/// that every write is swallowed, so control replies the protocol layer
/// queues on the read side (pongs, close echoes) never interleave with the
/// writer thread's frames. The writer sends those itself.
#[derive(Debug)]
pub struct ReaderStream {
    inner: TcpStream,
    writes_muted: bool,
}

impl ReaderStream {
    pub fn new(inner: TcpStream) -> Self {
        Self {
            inner,
            writes_muted: false,
        }
    }

    pub fn mute_writes(&mut self) {
        self.writes_muted = true;
    }

    pub fn inner(&self) -> &TcpStream {
        &self.inner
    }
}

impl Read for ReaderStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for ReaderStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.writes_muted {
            return Ok(buf.len());
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.writes_muted {
            return Ok(());
        }
        self.inner.flush()
    }
}

/// A completed upgrade.
#[derive(Debug)]
pub struct Accepted {
    pub socket: WebSocket<ReaderStream>,
    pub role: PeerRole,
}

/// Runs the server side of the WebSocket upgrade on `stream`.
///
/// Requests for any path other than `ws_path` get a 404. The role comes from
/// the `type` query parameter. `timeout` bounds every socket read and write
/// of the handshake; the caller resets the timeouts afterwards.
pub fn accept(stream: TcpStream, ws_path: &str, timeout: Duration) -> Result<Accepted, TransportError> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    let mut role_hint: Option<String> = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        if req.uri().path() != ws_path {
            let mut not_found = ErrorResponse::new(Some(format!("no endpoint at {}", req.uri().path())));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            return Err(not_found);
        }
        role_hint = query_param(req.uri().query(), ROLE_QUERY_KEY).map(str::to_owned);
        Ok(resp)
    };

    let socket = accept_hdr(ReaderStream::new(stream), callback).map_err(|e| match e {
        HandshakeError::Interrupted(_) => {
            TransportError::Handshake(format!("no upgrade request within {}s", timeout.as_secs()))
        }
        HandshakeError::Failure(e) => TransportError::Handshake(e.to_string()),
    })?;

    Ok(Accepted {
        socket,
        role: PeerRole::from_hint(role_hint.as_deref()),
    })
}

/// Value of `key` in a `k=v&k2=v2` query string. Values are used verbatim.
pub fn query_param<'a>(query: Option<&'a str>, key: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}
