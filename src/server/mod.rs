//! Multiplexing server
//!
//! Accepts connections on a single port and runs each one in its own task.
//! Every task sniffs its protocol and hands the stream to the SOCKS5 relay or
//! the file service; one slow or failing connection never blocks another.

mod dispatcher;
mod socket;
mod stats;

pub use dispatcher::{sniff, Dispatcher, SniffResult};
pub use socket::SocketOpts;
pub use stats::{ActiveConnection, ConnectionStats};

use crate::config::Config;
use crate::error::NovaLinkError;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A bound listener ready to serve
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    socket_opts: SocketOpts,
    stats: Arc<ConnectionStats>,
}

impl Server {
    /// Validate `config` and bind the listening socket
    pub async fn bind(config: Config) -> Result<Self> {
        config.validate().map_err(NovaLinkError::Config)?;

        let stats = Arc::new(ConnectionStats::new());
        let dispatcher = Dispatcher::new(&config, Arc::clone(&stats));
        dispatcher.validate()?;

        let addr = config.server.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("Listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            dispatcher: Arc::new(dispatcher),
            socket_opts: SocketOpts::from_tcp_config(&config.server.tcp),
            stats,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared connection counters
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Accept connections until shutdown is signalled
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_connection(stream, peer),
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
            }
        }

        info!(
            "Server stopped after {} connections ({} still active)",
            self.stats.total(),
            self.stats.active()
        );
        Ok(())
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let guard = self.stats.open();
        debug!("Accepted {} ({} active)", peer, guard.active());

        if let Err(e) = self.socket_opts.apply(&stream) {
            warn!("Failed to set socket options for {}: {}", peer, e);
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = dispatcher.dispatch(stream, peer).await {
                error!("Connection from {} failed: {:#}", peer, e);
            }
            debug!("Connection from {} closed", peer);
        });
    }
}

/// Bind according to `config` and serve until shutdown
pub async fn run_server(config: Config, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    Server::bind(config).await?.run(shutdown_rx).await
}
