//! Flex protocol
//!
//! Flex frames start with three zero bytes.

use crate::protocol::{ListenerBase, ProtocolHandler};

use super::FLEX_NAME;

/// Taste a flex prefix
pub fn is_flex(prefix: &[u8]) -> bool {
    matches!(prefix, [0, 0, 0, ..])
}

/// Flex protocol handler
#[derive(Debug)]
pub struct Flex {
    base: ListenerBase,
}

impl Flex {
    /// Create a flex handler with a queue of `capacity` connections
    pub fn new(capacity: usize) -> Self {
        Self {
            base: ListenerBase::new(FLEX_NAME, capacity),
        }
    }
}

impl ProtocolHandler for Flex {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn taste(&self, prefix: &[u8]) -> bool {
        is_flex(prefix)
    }

    fn base(&self) -> &ListenerBase {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flex_taste() {
        assert!(is_flex(&[0, 0, 0]));
        assert!(is_flex(&[0, 0, 0, 9]));

        assert!(!is_flex(&[1, 0, 0]));
        assert!(!is_flex(&[0, 1, 0]));
        assert!(!is_flex(&[0, 0, 1]));
        assert!(!is_flex(&[0, 0]));
        assert!(!is_flex(&[]));
    }
}
