//! Test utilities for Novalink
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use novalink::config::Config;
use novalink::server::{ConnectionStats, Server};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Welcome line sent by a default-configured server
pub const WELCOME: &[u8] = b"Welcome to ZetaStream VPN server!\n";

/// A server running on an ephemeral loopback port
pub struct TestServer {
    /// Address clients connect to
    pub addr: SocketAddr,
    /// Connection counters of the running server
    pub stats: Arc<ConnectionStats>,
    /// Directory served by the file service
    pub files: TempDir,
    shutdown_tx: broadcast::Sender<bool>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    /// Start a server serving `files`
    pub async fn start(files: TempDir) -> Self {
        Self::start_with(files, |_| {}).await
    }

    /// Start a server after letting `tweak` adjust its configuration
    pub async fn start_with<F: FnOnce(&mut Config)>(files: TempDir, tweak: F) -> Self {
        let mut config = Config::default();
        config.server.port = 0;
        config.server.sniff_timeout_ms = 200;
        config.files.dir = files.path().to_path_buf();
        tweak(&mut config);

        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let stats = server.stats();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(server.run(shutdown_rx));

        TestServer {
            addr,
            stats,
            files,
            shutdown_tx,
            handle,
        }
    }

    /// Signal shutdown and wait for the accept loop to stop
    pub async fn shutdown(self) {
        self.shutdown_tx.send(true).unwrap();
        self.handle.await.unwrap().unwrap();
    }

    /// Wait until no connection is active
    pub async fn wait_idle(&self) {
        wait_for(|| self.stats.active() == 0).await;
    }
}

/// Poll `condition` every 10ms for up to five seconds
pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within five seconds");
}

/// Temporary directory holding the given files
pub fn files_dir(files: &[(&str, &[u8])]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).unwrap();
    }
    dir
}

/// Deterministic test payload
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Start a TCP echo server, returning its address
pub async fn start_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Read exactly `len` bytes
pub async fn read_exactly(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.unwrap();
    buf
}

/// Read until the peer closes
pub async fn read_to_close(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("peer did not close")
        .unwrap();
    buf
}

/// Complete a SOCKS5 CONNECT handshake to `target`
pub async fn socks5_connect(server: SocketAddr, target: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(server).await.unwrap();
    stream.write_all(&socks5_mock::greeting()).await.unwrap();
    assert_eq!(read_exactly(&mut stream, 2).await, [0x05, 0x00]);

    stream
        .write_all(&socks5_mock::connect_addr(target))
        .await
        .unwrap();
    assert_eq!(
        read_exactly(&mut stream, 10).await,
        [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
    );
    stream
}

/// Mock SOCKS5 handshake data
pub mod socks5_mock {
    use novalink::protocol::consts::*;
    use std::net::SocketAddr;

    /// Create a no-auth method selection request
    pub fn greeting() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a request with an arbitrary command to an IPv4 address
    pub fn request_ipv4(cmd: u8, ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut req = vec![SOCKS5_VERSION, cmd, SOCKS5_RESERVED, SOCKS5_ADDR_TYPE_IPV4];
        req.extend_from_slice(&ip);
        req.extend_from_slice(&port.to_be_bytes());
        req
    }

    /// Create a connect command to an IPv4 socket address
    pub fn connect_addr(addr: SocketAddr) -> Vec<u8> {
        match addr {
            SocketAddr::V4(v4) => {
                request_ipv4(SOCKS5_CMD_TCP_CONNECT, v4.ip().octets(), v4.port())
            }
            SocketAddr::V6(_) => panic!("tests only use IPv4 targets"),
        }
    }

    /// Create a connect command to domain
    pub fn connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut req = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        req.extend_from_slice(domain.as_bytes());
        req.extend_from_slice(&port.to_be_bytes());
        req
    }
}
