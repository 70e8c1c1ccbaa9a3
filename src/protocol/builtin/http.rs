//! HTTP protocol
//!
//! Recognises HTTP/1.x request lines by the first three bytes of the
//! method, and the HTTP/2 prior-knowledge preface (`PRI * HTTP/2.0`).

use crate::protocol::{ListenerBase, ProtocolHandler};

use super::HTTP_NAME;

/// Three-byte prefixes of the request methods we accept
const METHOD_PREFIXES: [&[u8; 3]; 10] = [
    b"GET", b"HEA", b"POS", b"PUT", b"DEL", b"OPT", b"PAT", b"CON", b"TRA", b"PRI",
];

/// Taste an HTTP prefix
pub fn is_http(prefix: &[u8]) -> bool {
    match prefix.get(..3) {
        Some(head) => METHOD_PREFIXES.iter().any(|method| head == &method[..]),
        None => false,
    }
}

/// HTTP protocol handler
#[derive(Debug)]
pub struct Http {
    base: ListenerBase,
}

impl Http {
    /// Create an HTTP handler with a queue of `capacity` connections
    pub fn new(capacity: usize) -> Self {
        Self {
            base: ListenerBase::new(HTTP_NAME, capacity),
        }
    }
}

impl ProtocolHandler for Http {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn taste(&self, prefix: &[u8]) -> bool {
        is_http(prefix)
    }

    fn base(&self) -> &ListenerBase {
        &self.base
    }
}
