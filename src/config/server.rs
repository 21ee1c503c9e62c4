//! Server configuration types
//!
//! Defines the configuration structures for the Novalink server.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// File service configuration
    #[serde(default)]
    pub files: FilesConfig,

    /// SOCKS5 relay configuration
    #[serde(default)]
    pub socks: SocksConfig,
}

impl Config {
    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.files.validate()?;
        self.socks.validate()
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    10101
}

fn default_sniff_timeout_ms() -> u64 {
    500
}

/// Listener configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to bind (e.g., "0.0.0.0")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Port shared by both protocols
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long to wait for a first byte before assuming a file client
    #[serde(default = "default_sniff_timeout_ms")]
    pub sniff_timeout_ms: u64,

    /// Upper bound on a whole session in seconds (0 = unbounded)
    #[serde(default)]
    pub session_timeout: u64,

    /// Socket options for accepted connections
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            sniff_timeout_ms: default_sniff_timeout_ms(),
            session_timeout: 0,
            tcp: TcpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `bind_addr:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Sniff window as a duration
    pub fn sniff_timeout(&self) -> Duration {
        Duration::from_millis(self.sniff_timeout_ms)
    }

    /// Session cap, `None` when unbounded
    pub fn session_timeout(&self) -> Option<Duration> {
        (self.session_timeout > 0).then(|| Duration::from_secs(self.session_timeout))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.bind_addr.is_empty() {
            return Err("bind_addr must not be empty".to_string());
        }
        if self.sniff_timeout_ms == 0 {
            return Err("sniff_timeout_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

fn default_keepalive_secs() -> u64 {
    20
}

fn default_keepalive_interval() -> u64 {
    8
}

fn default_nodelay() -> bool {
    true
}

/// TCP socket options
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TcpConfig {
    /// Enable TCP_NODELAY
    #[serde(default = "default_nodelay")]
    pub nodelay: bool,

    /// TCP keepalive timeout in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            nodelay: default_nodelay(),
            keepalive_secs: default_keepalive_secs(),
            keepalive_interval: default_keepalive_interval(),
        }
    }
}

/// What the file service does between the size header and the file bytes
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckMode {
    /// Wait for the client's `ACK`
    #[default]
    #[serde(rename = "ack")]
    Ack,
    /// Sleep `ack_delay_ms` and send regardless
    #[serde(rename = "delay")]
    Delay,
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("zetastream_files")
}

fn default_welcome() -> String {
    "Welcome to ZetaStream VPN server!".to_string()
}

fn default_chunk_size() -> usize {
    4096
}

fn default_ack_delay_ms() -> u64 {
    100
}

fn default_command_settle_ms() -> u64 {
    100
}

fn default_max_command_len() -> usize {
    1024
}

/// File service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilesConfig {
    /// Directory whose regular files are served
    #[serde(default = "default_files_dir")]
    pub dir: PathBuf,

    /// Welcome line sent on connect
    #[serde(default = "default_welcome")]
    pub welcome: String,

    /// Bytes per write while streaming a file
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Flow control before streaming
    #[serde(default)]
    pub ack_mode: AckMode,

    /// Pause used by [`AckMode::Delay`]
    #[serde(default = "default_ack_delay_ms")]
    pub ack_delay_ms: u64,

    /// Quiet period after which an unterminated command is accepted
    /// (0 = commands must end with a newline)
    #[serde(default = "default_command_settle_ms")]
    pub command_settle_ms: u64,

    /// Longest command buffered before it is processed without a newline
    #[serde(default = "default_max_command_len")]
    pub max_command_len: usize,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            dir: default_files_dir(),
            welcome: default_welcome(),
            chunk_size: default_chunk_size(),
            ack_mode: AckMode::default(),
            ack_delay_ms: default_ack_delay_ms(),
            command_settle_ms: default_command_settle_ms(),
            max_command_len: default_max_command_len(),
        }
    }
}

impl FilesConfig {
    /// Settle window, `None` when newlines are required
    pub fn command_settle(&self) -> Option<Duration> {
        (self.command_settle_ms > 0).then(|| Duration::from_millis(self.command_settle_ms))
    }

    /// Pause used by [`AckMode::Delay`]
    pub fn ack_delay(&self) -> Duration {
        Duration::from_millis(self.ack_delay_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }
        if self.max_command_len == 0 {
            return Err("max_command_len must be greater than zero".to_string());
        }
        if self.welcome.contains('\n') {
            return Err("welcome must be a single line".to_string());
        }
        Ok(())
    }
}

fn default_connect_timeout() -> u64 {
    10
}

/// SOCKS5 relay configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SocksConfig {
    /// Timeout for the upstream connect in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl Default for SocksConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl SocksConfig {
    /// Upstream connect timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout == 0 {
            return Err("connect_timeout must be greater than zero".to_string());
        }
        Ok(())
    }
}
