//! Main SOCKS5 handler
//!
//! Drives a client through greeting, request and connect before handing the
//! connection to the relay.

use crate::config::SocksConfig;
use crate::error::Socks5Error;
use crate::protocol::consts::SOCKS5_AUTH_METHOD_NONE;
use crate::protocol::socks::{decode_greeting, decode_request, encode_method_selection};
use crate::protocol::Decoded;
use crate::services::socks::tcp_relay::handle_tcp_connect;
use anyhow::{bail, Context, Result};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Handle SOCKS5 protocol on a stream
///
/// # Protocol Flow
///
/// 1. Greeting: reply "version 5, no authentication"
/// 2. Request: CONNECT only, IPv4 or domain target
/// 3. Connect upstream and send the reply
/// 4. Relay until either side closes
///
/// Protocol violations end the session without a reply; the caller drops
/// the stream, which closes the connection.
pub async fn handle_socks5_on_stream<S>(mut stream: S, config: &SocksConfig) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut buf = BytesMut::with_capacity(512);

    let greeting = read_frame(&mut stream, &mut buf, decode_greeting)
        .await
        .with_context(|| "Failed to read SOCKS5 greeting")?;

    debug!("SOCKS5 greeting offering methods {:?}", greeting.methods);
    if !greeting.offers_no_auth() {
        debug!("Client did not offer no-auth; selecting it anyway");
    }

    stream
        .write_all(&encode_method_selection(SOCKS5_AUTH_METHOD_NONE))
        .await?;
    stream.flush().await?;

    let request = read_frame(&mut stream, &mut buf, decode_request)
        .await
        .with_context(|| "Failed to parse SOCKS5 request")?;

    info!("SOCKS5 CONNECT request to {}", request.target);

    handle_tcp_connect(stream, request.target, buf.freeze(), config).await
}

/// Read from `stream` until `decode` yields a frame
///
/// Whatever follows the frame stays in `buf`.
async fn read_frame<S, T, F>(stream: &mut S, buf: &mut BytesMut, decode: F) -> Result<T>
where
    S: AsyncRead + Unpin,
    F: Fn(&[u8]) -> Result<Decoded<T>, Socks5Error>,
{
    loop {
        if let Some((frame, used)) = decode(&buf[..])? {
            buf.advance(used);
            return Ok(frame);
        }
        if stream.read_buf(buf).await? == 0 {
            bail!("Connection closed during SOCKS5 handshake");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::socks::{encode_request, TargetAddr};
    use std::net::{Ipv4Addr, SocketAddrV4};
    use tokio::io::duplex;
    use tokio::net::TcpListener;

    fn test_config() -> SocksConfig {
        SocksConfig { connect_timeout: 2 }
    }

    #[tokio::test]
    async fn test_wrong_version_closes_without_reply() {
        // Any write would fail the mock
        let stream = tokio_test::io::Builder::new().read(&[0x04, 1, 0]).build();
        let err = handle_socks5_on_stream(stream, &test_config())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Unsupported SOCKS version: 4"));
    }

    #[tokio::test]
    async fn test_bind_rejected_without_reply() {
        let stream = tokio_test::io::Builder::new()
            .read(&[5, 1, 0])
            .write(&[5, 0])
            .read(&[5, 2, 0, 1, 127, 0, 0, 1, 0, 80])
            .build();
        let err = handle_socks5_on_stream(stream, &test_config())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Command not supported: 2"));
    }

    #[tokio::test]
    async fn test_ipv6_target_rejected() {
        let mut request = vec![5, 1, 0, 4];
        request.extend_from_slice(&[0u8; 18]);
        let stream = tokio_test::io::Builder::new()
            .read(&[5, 1, 0])
            .write(&[5, 0])
            .read(&request)
            .build();
        let err = handle_socks5_on_stream(stream, &test_config())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Address type not supported: 4"));
    }

    #[tokio::test]
    async fn test_eof_during_handshake() {
        let stream = tokio_test::io::Builder::new().read(&[5]).build();
        let err = handle_socks5_on_stream(stream, &test_config())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("closed during SOCKS5 handshake"));
    }

    #[tokio::test]
    async fn test_split_handshake_then_relay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target_addr = match listener.local_addr().unwrap() {
            std::net::SocketAddr::V4(addr) => addr,
            _ => unreachable!(),
        };
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            conn.read_exact(&mut buf).await.unwrap();
            conn.write_all(&buf).await.unwrap();
        });

        let (mut client, server) = duplex(1024);
        let session =
            tokio::spawn(async move { handle_socks5_on_stream(server, &test_config()).await });

        // Greeting split across two writes
        client.write_all(&[5]).await.unwrap();
        client.flush().await.unwrap();
        tokio::task::yield_now().await;
        client.write_all(&[1, 0]).await.unwrap();

        let mut selection = [0u8; 2];
        client.read_exact(&mut selection).await.unwrap();
        assert_eq!(selection, [5, 0]);

        // Request with payload pipelined behind it
        let mut request = encode_request(&TargetAddr::Ipv4(target_addr));
        request.extend_from_slice(b"hello");
        client.write_all(&request).await.unwrap();

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [5, 0, 0, 1, 0, 0, 0, 0, 0, 0]);

        let mut echoed = [0u8; 5];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"hello");

        drop(client);
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused_sends_failure_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (mut client, server) = duplex(1024);
        let session =
            tokio::spawn(async move { handle_socks5_on_stream(server, &test_config()).await });

        client.write_all(&[5, 1, 0]).await.unwrap();
        let mut selection = [0u8; 2];
        client.read_exact(&mut selection).await.unwrap();

        let target = TargetAddr::Ipv4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port));
        client.write_all(&encode_request(&target)).await.unwrap();

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[0], 5);
        assert_ne!(reply[1], 0);

        assert!(session.await.unwrap().is_err());
    }
}
