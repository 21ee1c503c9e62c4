//! # Novalink - Single-Port SOCKS5 Relay and File Server
//!
//! Novalink listens on one TCP port and serves two unrelated protocols on it.
//! Each new connection is sniffed: a SOCKS5 greeting is handed to an embedded
//! CONNECT-only relay, while a client that stays silent is greeted by a small
//! line-oriented file service that lists and streams files from a directory.
//!
//! ## Features
//!
//! - **Protocol Sniffing**: the first byte is peeked, never consumed
//! - **SOCKS5 CONNECT**: IPv4 and domain targets, no authentication
//! - **File Downloads**: catalog on connect, `GET_FILE` with ACK handshake
//! - **Isolation**: one task per connection, atomic connection accounting
//!
//! ## Usage
//!
//! ```rust,ignore
//! use novalink::config::load_config;
//! use novalink::server::run_server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("novalink.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_server(config, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Listener -> Dispatcher -> { SOCKS5 relay -> Target | File service }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod services;

// Re-export commonly used items
pub use client::{FileClient, Welcome};
pub use config::{load_config, Config};
pub use error::{FileProtocolError, NovaLinkError, Socks5Error};
pub use server::{run_server, Server};

/// Version of the Novalink library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
