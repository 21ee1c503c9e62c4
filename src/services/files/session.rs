//! File protocol session
//!
//! One session per connection: greeting and catalog, then a command loop
//! until the client goes away.
//!
//! Blank command lines are ignored and get no reply. A command longer than
//! `max_command_len` is cut at that length and the rest is read as the next
//! command, so a client can never make the session buffer more than that.

use super::catalog::{list_files, resolve_file};
use super::transfer::Transfer;
use crate::config::{AckMode, FilesConfig};
use crate::error::FileProtocolError;
use crate::protocol::consts::ACK_TOKEN;
use crate::protocol::file::{
    decode_text, encode_echo, encode_file_list, encode_file_size, encode_not_found,
    encode_welcome, split_line, FileCommand,
};
use anyhow::Result;
use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// State of one file client connection
pub struct FileSession<'a, S> {
    stream: S,
    buf: BytesMut,
    config: &'a FilesConfig,
}

impl<'a, S> FileSession<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an accepted stream
    pub fn new(stream: S, config: &'a FilesConfig) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(1024),
            config,
        }
    }

    /// Run the session to completion
    pub async fn run(mut self) -> Result<()> {
        self.send_greeting().await?;

        while let Some(line) = self.read_command().await? {
            if line.is_empty() {
                continue;
            }
            match FileCommand::parse(&line) {
                FileCommand::GetFile(name) => self.send_file(&name).await?,
                FileCommand::Text(text) => {
                    debug!("Echoing {:?}", text);
                    self.write_message(&encode_echo(&text)).await?;
                }
            }
        }

        debug!("File client disconnected");
        Ok(())
    }

    async fn send_greeting(&mut self) -> Result<()> {
        self.write_message(&encode_welcome(&self.config.welcome))
            .await?;

        let names = list_files(&self.config.dir).await;
        debug!("Sending catalog of {} files", names.len());
        self.write_message(&encode_file_list(&names)).await
    }

    /// Next command, or `None` once the client has closed
    ///
    /// A newline completes a command. Buffered bytes without one are taken
    /// as a whole command once the client has been quiet for the settle
    /// window, or when it closes.
    async fn read_command(&mut self) -> Result<Option<String>> {
        let limit = self.config.max_command_len;
        loop {
            let newline = self.buf.iter().take(limit.saturating_add(1)).position(|&b| b == b'\n');
            if newline.is_some() {
                return Ok(split_line(&mut self.buf));
            }
            if self.buf.len() > limit {
                warn!("Command exceeds {} bytes, splitting it", limit);
                let head = self.buf.split_to(limit);
                return Ok(Some(decode_text(&head)));
            }

            let settle = if self.buf.is_empty() {
                None
            } else {
                self.config.command_settle()
            };

            let n = match settle {
                Some(window) => {
                    match tokio::time::timeout(window, self.stream.read_buf(&mut self.buf)).await {
                        Ok(read) => read?,
                        Err(_) => return Ok(Some(self.take_buffered())),
                    }
                }
                None => self.stream.read_buf(&mut self.buf).await?,
            };

            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_buffered()));
            }
        }
    }

    fn take_buffered(&mut self) -> String {
        let bytes = self.buf.split();
        decode_text(&bytes)
    }

    async fn send_file(&mut self, name: &str) -> Result<()> {
        let Some(path) = resolve_file(&self.config.dir, name).await else {
            debug!("File not found: {:?}", name);
            return self.write_message(encode_not_found()).await;
        };

        let mut file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot open {:?}: {}", path, e);
                return self.write_message(encode_not_found()).await;
            }
        };
        let size = file.metadata().await?.len();

        self.write_message(&encode_file_size(size)).await?;

        match self.config.ack_mode {
            AckMode::Ack => self.await_ack().await?,
            AckMode::Delay => tokio::time::sleep(self.config.ack_delay()).await,
        }

        let mut transfer = Transfer::new(size, self.config.chunk_size);
        transfer.run(&mut file, &mut self.stream).await?;

        if transfer.is_complete() {
            info!("Sent {} ({} bytes)", name, transfer.size());
        } else {
            warn!(
                "{} shrank during transfer: sent {} of {} declared bytes",
                name,
                transfer.sent(),
                transfer.size()
            );
        }
        Ok(())
    }

    async fn await_ack(&mut self) -> Result<()> {
        while self.buf.len() < ACK_TOKEN.len() {
            if self.stream.read_buf(&mut self.buf).await? == 0 {
                return Err(FileProtocolError::UnexpectedEof("acknowledgment").into());
            }
        }

        let token = self.buf.split_to(ACK_TOKEN.len());
        if &token[..] != ACK_TOKEN {
            warn!("Expected ACK before streaming, got {:?}", token);
        }
        Ok(())
    }

    async fn write_message(&mut self, message: &[u8]) -> Result<()> {
        self.stream.write_all(message).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
