//! SOCKS5 message framing
//!
//! RFC 1928 subset: no authentication, CONNECT only, IPv4 and domain-name
//! targets. IPv6 targets are refused at parse time.

use super::consts::*;
use super::Decoded;
use crate::error::{Socks5Error, Socks5ReplyCode};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Method-selection message sent by the client first
///
/// ```text
/// +----+----------+----------+
/// |VER | NMETHODS | METHODS  |
/// +----+----------+----------+
/// | 1  |    1     | 1 to 255 |
/// +----+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Authentication methods offered by the client
    pub methods: Vec<u8>,
}

impl Greeting {
    /// Whether the client offered the no-authentication method
    pub fn offers_no_auth(&self) -> bool {
        self.methods.contains(&SOCKS5_AUTH_METHOD_NONE)
    }
}

/// Decode a greeting from the front of `buf`
pub fn decode_greeting(buf: &[u8]) -> Result<Decoded<Greeting>, Socks5Error> {
    let Some(&version) = buf.first() else {
        return Ok(None);
    };
    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version));
    }
    let Some(&nmethods) = buf.get(1) else {
        return Ok(None);
    };

    let len = 2 + nmethods as usize;
    if buf.len() < len {
        return Ok(None);
    }

    let greeting = Greeting {
        methods: buf[2..len].to_vec(),
    };
    Ok(Some((greeting, len)))
}

/// Encode the server's method selection
pub fn encode_method_selection(method: u8) -> [u8; 2] {
    [SOCKS5_VERSION, method]
}

/// Destination of a CONNECT request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// IPv4 literal with port
    Ipv4(SocketAddrV4),
    /// Domain name with port, resolved at connect time
    Domain(String, u16),
}

impl TargetAddr {
    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ipv4(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// Serialize as `ATYP DST.ADDR DST.PORT`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        match self {
            TargetAddr::Ipv4(addr) => {
                bytes.push(SOCKS5_ADDR_TYPE_IPV4);
                bytes.extend_from_slice(&addr.ip().octets());
                bytes.extend_from_slice(&addr.port().to_be_bytes());
            }
            TargetAddr::Domain(domain, port) => {
                bytes.push(SOCKS5_ADDR_TYPE_DOMAIN);
                bytes.push(domain.len() as u8);
                bytes.extend_from_slice(domain.as_bytes());
                bytes.extend_from_slice(&port.to_be_bytes());
            }
        }
        bytes
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ipv4(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

/// A CONNECT request
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Where the client wants to go
    pub target: TargetAddr,
}

/// Decode a CONNECT request from the front of `buf`
///
/// Violations are reported as soon as the offending byte is buffered, so a
/// BIND request is refused without waiting for its address.
pub fn decode_request(buf: &[u8]) -> Result<Decoded<ConnectRequest>, Socks5Error> {
    if let Some(&version) = buf.first() {
        if version != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(version));
        }
    }
    if let Some(&command) = buf.get(1) {
        if command != SOCKS5_CMD_TCP_CONNECT {
            return Err(Socks5Error::CommandNotSupported(command));
        }
    }
    let Some(&addr_type) = buf.get(3) else {
        return Ok(None);
    };

    let (target, len) = match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let len = 4 + 4 + 2;
            if buf.len() < len {
                return Ok(None);
            }
            let ip = Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]);
            let port = u16::from_be_bytes([buf[8], buf[9]]);
            (TargetAddr::Ipv4(SocketAddrV4::new(ip, port)), len)
        }
        SOCKS5_ADDR_TYPE_DOMAIN => {
            let Some(&domain_len) = buf.get(4) else {
                return Ok(None);
            };
            if domain_len == 0 {
                return Err(Socks5Error::InvalidDomain(String::new()));
            }
            let end = 5 + domain_len as usize;
            let len = end + 2;
            if buf.len() < len {
                return Ok(None);
            }
            let raw = &buf[5..end];
            let domain = std::str::from_utf8(raw)
                .map_err(|_| Socks5Error::InvalidDomain(String::from_utf8_lossy(raw).into_owned()))?
                .to_string();
            let port = u16::from_be_bytes([buf[end], buf[end + 1]]);
            (TargetAddr::Domain(domain, port), len)
        }
        other => return Err(Socks5Error::AddressTypeNotSupported(other)),
    };

    Ok(Some((ConnectRequest { target }, len)))
}

/// Encode a CONNECT request for `target`
pub fn encode_request(target: &TargetAddr) -> Vec<u8> {
    let mut buf = vec![SOCKS5_VERSION, SOCKS5_CMD_TCP_CONNECT, SOCKS5_RESERVED];
    buf.extend_from_slice(&target.to_bytes());
    buf
}

/// Encode a reply with an all-zero IPv4 bound address
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// ```
pub fn encode_reply(code: Socks5ReplyCode) -> [u8; SOCKS5_IPV4_REPLY_LEN] {
    [
        SOCKS5_VERSION,
        code.into(),
        SOCKS5_RESERVED,
        SOCKS5_ADDR_TYPE_IPV4,
        0,
        0,
        0,
        0,
        0,
        0,
    ]
}
