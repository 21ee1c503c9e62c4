//! Service module for Novalink
//!
//! Each protocol that can be spoken on the shared port lives under this
//! module and implements the [`ServiceHandler`] trait, so the dispatcher can
//! hand over a classified connection without knowing the protocol details.

pub mod files;
pub mod socks;

use anyhow::Result;
use std::fmt::Debug;
use tokio::io::{AsyncRead, AsyncWrite};

pub use files::FileServiceHandler;
pub use socks::Socks5ServiceHandler;

/// Trait that all service handlers must implement.
///
/// A handler owns the connection it is given for the rest of its life and
/// returns once the protocol has run to completion, the peer has gone away
/// or an error has ended the session.
#[async_trait::async_trait]
pub trait ServiceHandler: Send + Sync + Debug {
    /// Human-readable name of this service type (e.g., "socks5", "files").
    fn service_type(&self) -> &str;

    /// Run the service protocol on an accepted stream.
    ///
    /// Any bytes the dispatcher peeked at are still unread on the stream.
    async fn handle_tcp_stream(&self, stream: Box<dyn StreamDyn>) -> Result<()>;

    /// Validate the handler's configuration.
    ///
    /// Called once during startup. Default implementation always succeeds.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// A dynamic stream trait for service handlers.
///
/// Lets handlers accept sockets and in-memory test streams alike.
pub trait StreamDyn: AsyncRead + AsyncWrite + Unpin + Send + Debug {}

/// Blanket implementation: any type implementing the required traits is a StreamDyn.
impl<T: AsyncRead + AsyncWrite + Unpin + Send + Debug> StreamDyn for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilesConfig, SocksConfig};
    use std::sync::Arc;

    #[test]
    fn test_handlers_as_trait_objects() {
        let handlers: Vec<Arc<dyn ServiceHandler>> = vec![
            Arc::new(Socks5ServiceHandler::new(SocksConfig::default())),
            Arc::new(FileServiceHandler::new(FilesConfig::default())),
        ];
        let names: Vec<&str> = handlers.iter().map(|h| h.service_type()).collect();
        assert_eq!(names, vec!["socks5", "files"]);
        assert!(handlers.iter().all(|h| h.validate().is_ok()));
    }
}
