//! Chunked file transfer
//!
//! The size announced to the client is authoritative: the transfer stops
//! once that many bytes are out, or earlier if the source hits EOF.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// An in-progress file send
#[derive(Debug, Clone)]
pub struct Transfer {
    size: u64,
    sent: u64,
    chunk_size: usize,
}

impl Transfer {
    /// Start a transfer of `size` declared bytes
    pub fn new(size: u64, chunk_size: usize) -> Self {
        Self {
            size,
            sent: 0,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Declared size
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes sent so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Bytes still owed to the client
    pub fn remaining(&self) -> u64 {
        self.size - self.sent
    }

    /// Whether every declared byte has been sent
    pub fn is_complete(&self) -> bool {
        self.sent == self.size
    }

    /// Copy from `reader` to `writer` in chunks until done or EOF
    pub async fn run<R, W>(&mut self, reader: &mut R, writer: &mut W) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut chunk = vec![0u8; self.chunk_size];
        while self.remaining() > 0 {
            let want = self.remaining().min(chunk.len() as u64) as usize;
            let n = reader.read(&mut chunk[..want]).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&chunk[..n]).await?;
            self.sent += n as u64;
        }
        writer.flush().await?;
        Ok(self.sent)
    }
}
