//! Built-in protocols
//!
//! Protocols shipped with the crate, selectable by a well-known name. The
//! name to constructor mapping is a static table and never changes at
//! runtime.

mod flex;
mod http;
mod socks5;
mod tunnel;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::ProtocolHandler;
use crate::common::MuxError;

pub use flex::{is_flex, Flex};
pub use http::{is_http, Http};
pub use socks5::{is_socks5, Socks5};
pub use tunnel::{is_tunnel, Tunnel};

/// Name of the built-in HTTP protocol
pub const HTTP_NAME: &str = "http";
/// Name of the built-in SOCKS5 protocol
pub const SOCKS5_NAME: &str = "socks5";
/// Name of the built-in tunnel protocol
pub const TUNNEL_NAME: &str = "tunnel";
/// Name of the built-in flex protocol
pub const FLEX_NAME: &str = "flex";

/// Well-known protocol identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinProtocol {
    /// HTTP/1.x and HTTP/2 prior knowledge
    Http,
    /// SOCKS5 proxy handshake
    Socks5,
    /// TLS-framed tunnel
    Tunnel,
    /// Flex framing (three leading zero bytes)
    Flex,
}

type Constructor = fn(usize) -> Arc<dyn ProtocolHandler>;

/// Name, identifier and constructor of every built-in protocol
///
/// Indexed by the enum discriminant.
static BUILTINS: [(&str, BuiltinProtocol, Constructor); 4] = [
    (HTTP_NAME, BuiltinProtocol::Http, new_http),
    (SOCKS5_NAME, BuiltinProtocol::Socks5, new_socks5),
    (TUNNEL_NAME, BuiltinProtocol::Tunnel, new_tunnel),
    (FLEX_NAME, BuiltinProtocol::Flex, new_flex),
];

fn new_http(capacity: usize) -> Arc<dyn ProtocolHandler> {
    Arc::new(Http::new(capacity))
}

fn new_socks5(capacity: usize) -> Arc<dyn ProtocolHandler> {
    Arc::new(Socks5::new(capacity))
}

fn new_tunnel(capacity: usize) -> Arc<dyn ProtocolHandler> {
    Arc::new(Tunnel::new(capacity))
}

fn new_flex(capacity: usize) -> Arc<dyn ProtocolHandler> {
    Arc::new(Flex::new(capacity))
}

impl BuiltinProtocol {
    /// All built-in protocols, in table order
    pub fn all() -> impl Iterator<Item = BuiltinProtocol> {
        BUILTINS.iter().map(|(_, protocol, _)| *protocol)
    }

    /// Well-known name of the protocol
    pub fn name(self) -> &'static str {
        self.entry().0
    }

    /// Construct a fresh handler with a queue of `capacity` connections
    pub fn create(self, capacity: usize) -> Arc<dyn ProtocolHandler> {
        (self.entry().2)(capacity)
    }

    fn entry(self) -> &'static (&'static str, BuiltinProtocol, Constructor) {
        &BUILTINS[self as usize]
    }
}

impl fmt::Display for BuiltinProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltinProtocol {
    type Err = MuxError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BUILTINS
            .iter()
            .find(|(name, _, _)| *name == s)
            .map(|(_, protocol, _)| *protocol)
            .ok_or_else(|| MuxError::BuiltinNotFound(s.to_string()))
    }
}
