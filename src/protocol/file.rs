//! File protocol framing
//!
//! Control tokens are ASCII. Client commands are newline-terminated lines;
//! server messages after the welcome line carry no terminator, matching
//! what deployed clients expect.

use super::consts::*;
use crate::error::FileProtocolError;
use bytes::BytesMut;

/// A command received from a file client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileCommand {
    /// `GET_FILE:<name>`
    GetFile(String),
    /// Anything else, echoed back
    Text(String),
}

impl FileCommand {
    /// Classify one command line
    pub fn parse(line: &str) -> Self {
        match line.strip_prefix(GET_FILE_PREFIX) {
            Some(name) => FileCommand::GetFile(name.to_string()),
            None => FileCommand::Text(line.to_string()),
        }
    }
}

/// Split one complete line off the front of `buf`
///
/// The terminator and a preceding `\r` are dropped. Returns `None` while no
/// newline has been buffered.
pub fn split_line(buf: &mut BytesMut) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let line = buf.split_to(pos + 1);
    Some(decode_text(&line[..pos]))
}

/// Decode command bytes, trimming a trailing `\r`
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Welcome line sent when a file client connects
pub fn encode_welcome(text: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len() + 1);
    buf.extend_from_slice(text.as_bytes());
    buf.push(b'\n');
    buf
}

/// `FILE_LIST\n` followed by newline-joined names
pub fn encode_file_list<S: AsRef<str>>(names: &[S]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(FILE_LIST.as_bytes());
    buf.push(b'\n');
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            buf.push(b'\n');
        }
        buf.extend_from_slice(name.as_ref().as_bytes());
    }
    buf
}

/// Parse a catalog message back into file names
pub fn decode_file_list(text: &str) -> Result<Vec<String>, FileProtocolError> {
    let body = text
        .strip_prefix(FILE_LIST)
        .ok_or_else(|| FileProtocolError::UnexpectedMessage(text.to_string()))?;
    Ok(body
        .split('\n')
        .map(|name| name.trim_end_matches('\r'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect())
}

/// `FILE_SIZE:<n>`
pub fn encode_file_size(size: u64) -> Vec<u8> {
    format!("{}{}", FILE_SIZE_PREFIX, size).into_bytes()
}

/// `FILE_NOT_FOUND`
pub fn encode_not_found() -> &'static [u8] {
    FILE_NOT_FOUND.as_bytes()
}

/// `Server received: <text>`
pub fn encode_echo(text: &str) -> Vec<u8> {
    format!("{}{}", ECHO_PREFIX, text).into_bytes()
}

/// `GET_FILE:<name>` with a line terminator
pub fn encode_get_file(name: &str) -> Vec<u8> {
    format!("{}{}\n", GET_FILE_PREFIX, name).into_bytes()
}

/// A message the server sends in reply to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Size header announcing a download of exactly this many bytes
    FileSize(u64),
    /// The requested file cannot be served
    NotFound,
    /// Echo of an unrecognized command
    Echo(String),
}

impl ServerMessage {
    /// Decode a reply message
    pub fn decode(text: &str) -> Result<Self, FileProtocolError> {
        if let Some(size) = text.strip_prefix(FILE_SIZE_PREFIX) {
            let size = size.trim();
            return size
                .parse()
                .map(ServerMessage::FileSize)
                .map_err(|_| FileProtocolError::MalformedSize(size.to_string()));
        }
        if text == FILE_NOT_FOUND {
            return Ok(ServerMessage::NotFound);
        }
        match text.strip_prefix(ECHO_PREFIX) {
            Some(echo) => Ok(ServerMessage::Echo(echo.to_string())),
            None => Err(FileProtocolError::UnexpectedMessage(text.to_string())),
        }
    }
}
