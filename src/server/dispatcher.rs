//! Connection dispatcher
//!
//! Decides which protocol a fresh connection speaks by peeking at its first
//! byte, then hands the connection to the matching service.
//!
//! The decision is a timing heuristic. A file client waits silently for the
//! server's welcome, so silence for the whole sniff window means "file
//! client". A SOCKS5 client whose greeting arrives later than the window is
//! misclassified, as is a file client that speaks first; widen or narrow
//! `sniff_timeout_ms` to trade greeting latency against that risk.

use super::stats::ConnectionStats;
use crate::config::Config;
use crate::error::NovaLinkError;
use crate::protocol::consts::SOCKS5_VERSION;
use crate::services::{FileServiceHandler, ServiceHandler, Socks5ServiceHandler};
use anyhow::{Context, Result};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Protocol a connection was classified as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SniffResult {
    /// First byte was the SOCKS5 version tag
    Socks5,
    /// Silence, or any other first byte
    FileProtocol,
}

impl SniffResult {
    /// Classify from the first byte seen within the window, if any
    pub fn classify(first_byte: Option<u8>) -> Self {
        match first_byte {
            Some(SOCKS5_VERSION) => SniffResult::Socks5,
            _ => SniffResult::FileProtocol,
        }
    }
}

impl fmt::Display for SniffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SniffResult::Socks5 => write!(f, "SOCKS5"),
            SniffResult::FileProtocol => write!(f, "file protocol"),
        }
    }
}

/// Peek at the first byte without consuming it
///
/// Returns `None` if the peer closed before sending anything.
pub async fn sniff(stream: &TcpStream, window: Duration) -> io::Result<Option<SniffResult>> {
    let mut first = [0u8; 1];
    match tokio::time::timeout(window, stream.peek(&mut first)).await {
        Err(_) => Ok(Some(SniffResult::classify(None))),
        Ok(Ok(0)) => Ok(None),
        Ok(Ok(_)) => Ok(Some(SniffResult::classify(Some(first[0])))),
        Ok(Err(e)) => Err(e),
    }
}

/// Routes classified connections to their service
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sniff_timeout: Duration,
    session_timeout: Option<Duration>,
    socks: Arc<dyn ServiceHandler>,
    files: Arc<dyn ServiceHandler>,
    stats: Arc<ConnectionStats>,
}

impl Dispatcher {
    /// Build the dispatcher and its services from configuration
    pub fn new(config: &Config, stats: Arc<ConnectionStats>) -> Self {
        Self::with_handlers(
            config.server.sniff_timeout(),
            config.server.session_timeout(),
            Arc::new(Socks5ServiceHandler::new(config.socks.clone())),
            Arc::new(FileServiceHandler::new(config.files.clone())),
            stats,
        )
    }

    /// Build a dispatcher around explicit handlers
    pub fn with_handlers(
        sniff_timeout: Duration,
        session_timeout: Option<Duration>,
        socks: Arc<dyn ServiceHandler>,
        files: Arc<dyn ServiceHandler>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        Self {
            sniff_timeout,
            session_timeout,
            socks,
            files,
            stats,
        }
    }

    /// Handler responsible for `protocol`
    pub fn handler_for(&self, protocol: SniffResult) -> &Arc<dyn ServiceHandler> {
        match protocol {
            SniffResult::Socks5 => &self.socks,
            SniffResult::FileProtocol => &self.files,
        }
    }

    /// Validate every handler
    pub fn validate(&self) -> Result<()> {
        self.socks.validate()?;
        self.files.validate()
    }

    /// Sniff `stream` and run the matching service to completion
    pub async fn dispatch(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let protocol = match sniff(&stream, self.sniff_timeout)
            .await
            .with_context(|| format!("Failed to sniff protocol from {}", peer))?
        {
            Some(protocol) => protocol,
            None => {
                debug!("{} closed before sending anything", peer);
                return Ok(());
            }
        };

        self.stats.record_dispatch(protocol);
        let handler = self.handler_for(protocol);
        info!("{} speaks {}, handing to {}", peer, protocol, handler.service_type());

        let session = handler.handle_tcp_stream(Box::new(stream));
        match self.session_timeout {
            Some(limit) => tokio::time::timeout(limit, session).await.map_err(|_| {
                NovaLinkError::Timeout(format!("session from {} exceeded {:?}", peer, limit))
            })?,
            None => session.await,
        }
    }
}
