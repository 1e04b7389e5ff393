//! Per-connection context captured at upgrade time.

use std::fmt;
use std::net::IpAddr;

/// Unique identifier for an open connection.
pub type ConnectionId = String;

/// Source information for one socket, carried alongside it for its whole
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    /// Unique connection identifier.
    pub id: ConnectionId,
    /// Source address as resolved by the gateway.
    pub address: String,
    /// When the socket was accepted (Unix timestamp).
    pub connected_at: u64,
}

impl ConnectionContext {
    /// Creates a context for a freshly accepted socket.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            address: address.into(),
            connected_at: nodestatus_types::unix_now(),
        }
    }

    /// Returns the address family the peer connected over.
    pub fn address_family(&self) -> AddressFamily {
        AddressFamily::classify(&self.address)
    }
}

/// Resolves the source address of an upgrade request.
///
/// The first entry of `X-Forwarded-For` wins when present and non-blank;
/// otherwise the transport peer address is used.
pub fn resolve_source_address(forwarded_for: Option<&str>, peer: IpAddr) -> String {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.to_string())
}

/// IP family of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Classifies a textual address.
    ///
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) count as IPv4. Anything
    /// that does not parse as an IPv4 address is reported as IPv6.
    pub fn classify(address: &str) -> Self {
        match address.trim().parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => AddressFamily::Ipv4,
            Ok(IpAddr::V6(v6)) if v6.to_ipv4_mapped().is_some() => AddressFamily::Ipv4,
            _ => AddressFamily::Ipv6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}
