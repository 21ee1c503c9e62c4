//! Wire constants
//!
//! SOCKS5 values follow RFC 1928; file protocol tokens are plain ASCII.

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;

// Commands
/// TCP CONNECT command
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;
/// TCP BIND command (rejected)
pub const SOCKS5_CMD_TCP_BIND: u8 = 0x02;
/// UDP ASSOCIATE command (rejected)
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address (rejected)
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

/// Length of a reply carrying an IPv4 bound address
pub const SOCKS5_IPV4_REPLY_LEN: usize = 10;

// File protocol tokens
/// Marker that opens the catalog message
pub const FILE_LIST: &str = "FILE_LIST";
/// Prefix of the size header sent before file bytes
pub const FILE_SIZE_PREFIX: &str = "FILE_SIZE:";
/// Reply for a name that cannot be served
pub const FILE_NOT_FOUND: &str = "FILE_NOT_FOUND";
/// Prefix of a download request
pub const GET_FILE_PREFIX: &str = "GET_FILE:";
/// Prefix of the echo reply for unrecognized commands
pub const ECHO_PREFIX: &str = "Server received: ";
/// Acknowledgment the client sends after a size header
pub const ACK_TOKEN: &[u8; 3] = b"ACK";
