//! SOCKS5 protocol
//!
//! A SOCKS5 client greeting starts with the version byte `0x05` followed by
//! the number of authentication methods it offers.

use crate::protocol::{ListenerBase, ProtocolHandler};

use super::SOCKS5_NAME;

/// SOCKS protocol version 5
const SOCKS5_VERSION: u8 = 0x05;

/// Taste a SOCKS5 greeting
pub fn is_socks5(prefix: &[u8]) -> bool {
    matches!(prefix, [SOCKS5_VERSION, nmethods, _, ..] if *nmethods > 0)
}

/// SOCKS5 protocol handler
#[derive(Debug)]
pub struct Socks5 {
    base: ListenerBase,
}

impl Socks5 {
    /// Create a SOCKS5 handler with a queue of `capacity` connections
    pub fn new(capacity: usize) -> Self {
        Self {
            base: ListenerBase::new(SOCKS5_NAME, capacity),
        }
    }
}

impl ProtocolHandler for Socks5 {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn taste(&self, prefix: &[u8]) -> bool {
        is_socks5(prefix)
    }

    fn base(&self) -> &ListenerBase {
        &self.base
    }
}
