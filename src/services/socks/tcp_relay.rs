//! TCP relay for SOCKS5 CONNECT command
//!
//! Handles TCP CONNECT requests by establishing a connection to the target
//! and relaying data bidirectionally.

use crate::config::SocksConfig;
use crate::error::Socks5ReplyCode;
use crate::protocol::socks::{encode_reply, TargetAddr};
use anyhow::{Context, Result};
use bytes::Bytes;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Handle TCP CONNECT command
///
/// This function:
/// 1. Establishes a TCP connection to the target
/// 2. Sends the reply (a failure code derived from the error if connecting failed)
/// 3. Forwards `pending`, the bytes the client sent behind its request
/// 4. Relays data bidirectionally between client and target
pub async fn handle_tcp_connect<S>(
    mut client_stream: S,
    target_addr: TargetAddr,
    pending: Bytes,
    config: &SocksConfig,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut target_stream = match connect_target(&target_addr, config.connect_timeout()).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to connect to {}: {}", target_addr, e);
            let reply = encode_reply(Socks5ReplyCode::from(&e));
            // The client may already be gone
            let _ = client_stream.write_all(&reply).await;
            let _ = client_stream.flush().await;
            return Err(e).with_context(|| format!("Failed to connect to {}", target_addr));
        }
    };

    client_stream
        .write_all(&encode_reply(Socks5ReplyCode::Succeeded))
        .await?;
    client_stream.flush().await?;

    info!("SOCKS5 tunnel established to {}", target_addr);

    if !pending.is_empty() {
        target_stream.write_all(&pending).await?;
    }

    relay_tcp(client_stream, target_stream).await
}

/// Open the upstream connection, resolving domain names first
pub async fn connect_target(target: &TargetAddr, timeout: Duration) -> io::Result<TcpStream> {
    let connect = async {
        match target {
            TargetAddr::Ipv4(addr) => TcpStream::connect(*addr).await,
            TargetAddr::Domain(domain, port) => TcpStream::connect((domain.as_str(), *port)).await,
        }
    };

    let stream = tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;

    debug!("Connected to target {}", target);
    Ok(stream)
}

/// Relay data bidirectionally between two streams
///
/// Copies in both directions concurrently and returns as soon as either
/// direction reaches EOF or fails; both streams are dropped on return.
pub async fn relay_tcp<A, B>(a: A, b: B) -> Result<()>
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);

    let a_to_b = tokio::io::copy(&mut a_read, &mut b_write);
    let b_to_a = tokio::io::copy(&mut b_read, &mut a_write);

    tokio::select! {
        result = a_to_b => {
            match result {
                Ok(bytes) => debug!("Client->target finished: {} bytes", bytes),
                Err(e) => debug!("Client->target error: {}", e),
            }
        }
        result = b_to_a => {
            match result {
                Ok(bytes) => debug!("Target->client finished: {} bytes", bytes),
                Err(e) => debug!("Target->client error: {}", e),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_relay_tcp_bidirectional() {
        let (mut client_a, server_a) = duplex(1024);
        let (mut client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(async move { relay_tcp(server_a, server_b).await });

        client_a.write_all(b"message A->B").await.unwrap();
        let mut buf_b = vec![0u8; 12];
        client_b.read_exact(&mut buf_b).await.unwrap();
        assert_eq!(&buf_b, b"message A->B");

        client_b.write_all(b"message B->A").await.unwrap();
        let mut buf_a = vec![0u8; 12];
        client_a.read_exact(&mut buf_a).await.unwrap();
        assert_eq!(&buf_a, b"message B->A");

        drop(client_a);
        drop(client_b);

        let result = tokio::time::timeout(Duration::from_secs(1), relay_handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_relay_tcp_large_data() {
        let (mut client_a, server_a) = duplex(65536);
        let (mut client_b, server_b) = duplex(65536);

        let relay_handle = tokio::spawn(async move { relay_tcp(server_a, server_b).await });

        let large_data: Vec<u8> = (0..50000u32).map(|i| (i % 251) as u8).collect();
        let expected = large_data.clone();
        let writer = tokio::spawn(async move {
            client_a.write_all(&large_data).await.unwrap();
            client_a
        });

        let mut received = vec![0u8; 50000];
        client_b.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);

        drop(writer.await.unwrap());
        drop(client_b);
        let _ = tokio::time::timeout(Duration::from_secs(1), relay_handle).await;
    }

    #[tokio::test]
    async fn test_relay_tcp_ends_when_one_side_closes() {
        let (client_a, server_a) = duplex(1024);
        let (_client_b, server_b) = duplex(1024);

        let relay_handle = tokio::spawn(async move { relay_tcp(server_a, server_b).await });

        // Only A goes away; B stays open
        drop(client_a);

        let result = tokio::time::timeout(Duration::from_secs(1), relay_handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_connect_target_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let target = TargetAddr::Ipv4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
        let err = connect_target(&target, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_connect_target_unresolvable_domain() {
        let target = TargetAddr::Domain("this-domain-does-not-exist-12345.invalid".to_string(), 80);
        assert!(connect_target(&target, Duration::from_secs(5)).await.is_err());
    }

    #[tokio::test]
    async fn test_handle_tcp_connect_unresolvable_domain() {
        let (client, _server) = duplex(1024);
        let target = TargetAddr::Domain("this-domain-does-not-exist-12345.invalid".to_string(), 80);
        let result =
            handle_tcp_connect(client, target, Bytes::new(), &SocksConfig { connect_timeout: 5 })
                .await;
        assert!(result.is_err());
    }
}
