use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use crate::config::RelayConfig;
use crate::log::NoopLogSink;
use crate::log::log_sink::LogSink;
use crate::relay::connection::{ConnectionContext, serve_connection};
use crate::relay::registry::PeerRegistry;
use crate::relay::router::FrameRouter;
use crate::{sink_debug, sink_info, sink_warn};

/// Top-level runtime object for the relay.
///
/// Binding is separate from [`run`](Self::run) so callers can bind to port 0
/// and learn the real address before the accept loop starts.
pub struct RelayServer {
    listener: TcpListener,
    ctx: ConnectionContext,
}

impl RelayServer {
    pub fn bind(config: RelayConfig, log: Arc<dyn LogSink>) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        let registry = Arc::new(PeerRegistry::new());
        let router = Arc::new(FrameRouter::with_log(registry.clone(), log.clone()));

        Ok(Self {
            listener,
            ctx: ConnectionContext {
                config: Arc::new(config),
                registry,
                router,
                log,
            },
        })
    }

    /// Convenience: bind with a `NoopLogSink`.
    pub fn bind_no_log(config: RelayConfig) -> io::Result<Self> {
        Self::bind(config, Arc::new(NoopLogSink))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.ctx.config
    }

    /// Live view of connected peers; stays valid while the server runs.
    pub fn registry(&self) -> Arc<PeerRegistry> {
        self.ctx.registry.clone()
    }

    /// Blocking accept loop: one thread per connection.
    ///
    /// Accept errors are logged and skipped; the loop only ends if the
    /// listener itself goes away.
    pub fn run(self) -> io::Result<()> {
        let Self { listener, ctx } = self;

        sink_info!(
            ctx.log,
            "relay listening on {} (path {})",
            listener.local_addr()?,
            ctx.config.ws_path
        );

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    sink_warn!(ctx.log, "incoming TCP accept failed: {:?} (continuing to accept)", e);
                    continue;
                }
            };
            let _ = stream.set_nodelay(true);

            let conn_ctx = ctx.clone();
            let spawned = thread::Builder::new()
                .name("relay-conn".into())
                .spawn(move || {
                    if let Err(e) = serve_connection(stream, &conn_ctx) {
                        sink_debug!(conn_ctx.log, "connection ended: {}", e);
                    }
                });

            if let Err(e) = spawned {
                sink_warn!(ctx.log, "failed to spawn connection thread: {:?}", e);
            }
        }

        Ok(())
    }

    /// Runs the accept loop on a background thread.
    pub fn spawn(self) -> io::Result<thread::JoinHandle<io::Result<()>>> {
        thread::Builder::new()
            .name("relay-accept".into())
            .spawn(move || self.run())
    }
}
