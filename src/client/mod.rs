//! File protocol client
//!
//! The client half of the file protocol: read the welcome and catalog, then
//! issue commands. Server replies carry no terminator, so a reply is taken
//! to be complete once the server has been quiet for a short window.

use crate::error::FileProtocolError;
use crate::protocol::consts::ACK_TOKEN;
use crate::protocol::file::{
    decode_file_list, decode_text, encode_get_file, split_line, ServerMessage,
};
use anyhow::{bail, Context, Result};
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

/// Default quiet window that ends a server reply
pub const DEFAULT_QUIET: Duration = Duration::from_millis(200);

/// What the server sends on connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
    /// Welcome line without its terminator
    pub message: String,
    /// Downloadable file names
    pub files: Vec<String>,
}

/// A connected file protocol client
#[derive(Debug)]
pub struct FileClient<S = TcpStream> {
    stream: S,
    buf: BytesMut,
    quiet: Duration,
}

impl FileClient<TcpStream> {
    /// Connect to a server and read its greeting
    pub async fn connect<A: ToSocketAddrs>(addr: A, quiet: Duration) -> Result<(Self, Welcome)> {
        let stream = TcpStream::connect(addr)
            .await
            .context("Failed to connect to file server")?;
        stream.set_nodelay(true)?;
        Self::handshake(stream, quiet).await
    }
}

impl<S> FileClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Read the greeting from an already connected stream
    pub async fn handshake(stream: S, quiet: Duration) -> Result<(Self, Welcome)> {
        let mut client = FileClient {
            stream,
            buf: BytesMut::with_capacity(4096),
            quiet,
        };

        let message = loop {
            if let Some(line) = split_line(&mut client.buf) {
                break line;
            }
            if client.stream.read_buf(&mut client.buf).await? == 0 {
                return Err(FileProtocolError::UnexpectedEof("welcome").into());
            }
        };

        let catalog = client.read_message("file list").await?;
        let files = decode_file_list(&catalog)?;
        debug!("Server offers {} files", files.len());

        Ok((client, Welcome { message, files }))
    }

    /// Download `name`
    ///
    /// Returns `None` if the server reports the file as missing.
    pub async fn fetch(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        self.send(&encode_get_file(name)).await?;

        let reply = self.read_message("file size").await?;
        let size = match ServerMessage::decode(&reply)? {
            ServerMessage::FileSize(size) => size,
            ServerMessage::NotFound => return Ok(None),
            ServerMessage::Echo(_) => {
                bail!(FileProtocolError::UnexpectedMessage(reply))
            }
        };
        let size = usize::try_from(size).context("File too large for this platform")?;

        self.send(ACK_TOKEN).await?;

        let mut data = Vec::with_capacity(size);
        let buffered = self.buf.len().min(size);
        data.extend_from_slice(&self.buf.split_to(buffered));

        while data.len() < size {
            let want = (size - data.len()).min(64 * 1024);
            let mut chunk = vec![0u8; want];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                bail!(
                    "Connection closed after {} of {} bytes of {}",
                    data.len(),
                    size,
                    name
                );
            }
            data.extend_from_slice(&chunk[..n]);
        }

        debug!("Downloaded {} ({} bytes)", name, size);
        Ok(Some(data))
    }

    /// Send a free-form command and return the server's echo
    pub async fn send_text(&mut self, text: &str) -> Result<String> {
        let mut line = text.as_bytes().to_vec();
        line.push(b'\n');
        self.send(&line).await?;

        let reply = self.read_message("echo").await?;
        match ServerMessage::decode(&reply)? {
            ServerMessage::Echo(echo) => Ok(echo),
            _ => bail!(FileProtocolError::UnexpectedMessage(reply)),
        }
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Wait for a reply, then keep reading until the server goes quiet
    async fn read_message(&mut self, what: &'static str) -> Result<String> {
        while self.buf.is_empty() {
            if self.stream.read_buf(&mut self.buf).await? == 0 {
                return Err(FileProtocolError::UnexpectedEof(what).into());
            }
        }

        loop {
            match tokio::time::timeout(self.quiet, self.stream.read_buf(&mut self.buf)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(e.into()),
            }
        }

        let bytes = self.buf.split();
        Ok(decode_text(&bytes))
    }
}
