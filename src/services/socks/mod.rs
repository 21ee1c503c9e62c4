//! SOCKS5 service module for Novalink
//!
//! Implements the server half of SOCKS5 for CONNECT requests and relays
//! the tunneled bytes between the client and the requested target.

mod handler;
mod tcp_relay;

pub use handler::handle_socks5_on_stream;
pub use tcp_relay::{connect_target, handle_tcp_connect, relay_tcp};

use crate::config::SocksConfig;
use crate::services::{ServiceHandler, StreamDyn};
use anyhow::Result;

/// SOCKS5 service handler implementing the [`ServiceHandler`] trait.
#[derive(Debug, Clone)]
pub struct Socks5ServiceHandler {
    config: SocksConfig,
}

impl Socks5ServiceHandler {
    /// Create a new SOCKS5 service handler with the given configuration.
    pub fn new(config: SocksConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the SOCKS5 configuration.
    pub fn config(&self) -> &SocksConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl ServiceHandler for Socks5ServiceHandler {
    fn service_type(&self) -> &str {
        "socks5"
    }

    async fn handle_tcp_stream(&self, stream: Box<dyn StreamDyn>) -> Result<()> {
        handle_socks5_on_stream(stream, &self.config).await
    }

    fn validate(&self) -> Result<()> {
        self.config.validate().map_err(|e| anyhow::anyhow!(e))
    }
}
