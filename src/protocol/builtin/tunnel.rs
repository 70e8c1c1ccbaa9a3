//! Tunnel protocol
//!
//! Tunnel clients open with a TLS handshake record. Only the record header
//! is inspected; the handshake itself belongs to the tunnel server.

use crate::protocol::{ListenerBase, ProtocolHandler};

use super::TUNNEL_NAME;

/// TLS handshake record content type
const HANDSHAKE_RECORD: u8 = 0x16;

/// Taste a TLS-framed tunnel prefix
pub fn is_tunnel(prefix: &[u8]) -> bool {
    // SSLv3 (3.0) up to TLS 1.3 (3.4)
    matches!(prefix, [HANDSHAKE_RECORD, 0x03, 0x00..=0x04, ..])
}

/// Tunnel protocol handler
#[derive(Debug)]
pub struct Tunnel {
    base: ListenerBase,
}

impl Tunnel {
    /// Create a tunnel handler with a queue of `capacity` connections
    pub fn new(capacity: usize) -> Self {
        Self {
            base: ListenerBase::new(TUNNEL_NAME, capacity),
        }
    }
}

impl ProtocolHandler for Tunnel {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn taste(&self, prefix: &[u8]) -> bool {
        is_tunnel(prefix)
    }

    fn base(&self) -> &ListenerBase {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_taste() {
        assert!(is_tunnel(&[0x16, 0x03, 0x01]));
        assert!(is_tunnel(&[0x16, 0x03, 0x03, 0x00, 0x31]));

        assert!(!is_tunnel(&[0x16, 0x03, 0x05]));
        assert!(!is_tunnel(&[0x17, 0x03, 0x03]));
        assert!(!is_tunnel(b"GET"));
        assert!(!is_tunnel(&[0x16, 0x03]));
    }
}
