//! Ordered protocol registry
//!
//! Registration order is dispatch priority: when several handlers would
//! accept the same prefix, the one registered first wins. The name index
//! only enforces uniqueness and serves lookups.

use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;

use super::base::DEFAULT_QUEUE_CAPACITY;
use super::builtin::BuiltinProtocol;
use super::ProtocolHandler;
use crate::common::{MuxError, Result};

/// Name-unique, ordered collection of protocol handlers
pub struct ProtocolRegistry {
    handlers: Vec<Arc<dyn ProtocolHandler>>,
    by_name: HashMap<String, usize>,
    queue_capacity: usize,
}

impl ProtocolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create an empty registry whose built-in handlers buffer up to
    /// `queue_capacity` connections
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            handlers: Vec::new(),
            by_name: HashMap::new(),
            queue_capacity,
        }
    }

    /// Queue capacity used for built-in handlers registered afterwards
    pub fn set_queue_capacity(&mut self, queue_capacity: usize) {
        self.queue_capacity = queue_capacity;
    }

    /// Register a handler
    ///
    /// Fails with [`MuxError::DuplicateName`] if a handler with the same name
    /// is already registered; the registry is left unchanged in that case.
    pub fn register(&mut self, handler: Arc<dyn ProtocolHandler>) -> Result<()> {
        let name = handler.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(MuxError::DuplicateName(name));
        }

        debug!("Registered protocol {} at priority {}", name, self.handlers.len());
        self.by_name.insert(name, self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    /// Register built-in protocols by their well-known names
    ///
    /// Every name is processed; unknown or duplicate names are logged and
    /// returned together with their error.
    pub fn register_builtin<I, S>(&mut self, names: I) -> Vec<(String, MuxError)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let capacity = self.queue_capacity;
        let mut failures = Vec::new();

        for name in names {
            let name = name.as_ref();
            let result = name
                .parse::<BuiltinProtocol>()
                .and_then(|protocol| self.register(protocol.create(capacity)));

            if let Err(e) = result {
                warn!("Failed to register built-in protocol {}: {}", name, e);
                failures.push((name.to_string(), e));
            }
        }

        failures
    }

    /// Look up a handler by name
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn ProtocolHandler>> {
        self.by_name
            .get(name)
            .map(|&index| Arc::clone(&self.handlers[index]))
            .ok_or_else(|| MuxError::NotFound(name.to_string()))
    }

    /// First handler, in registration order, whose taste accepts `prefix`
    pub fn classify(&self, prefix: &[u8]) -> Option<&Arc<dyn ProtocolHandler>> {
        self.handlers.iter().find(|handler| handler.taste(prefix))
    }

    /// Handlers in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ProtocolHandler>> {
        self.handlers.iter()
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.names())
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PredicateProtocol;

    fn always(name: &str) -> Arc<dyn ProtocolHandler> {
        Arc::new(PredicateProtocol::new(name, 4, |_: &[u8]| true))
    }

    #[test]
    fn test_duplicate_name_leaves_registry_unchanged() {
        let mut registry = ProtocolRegistry::new();
        let first = always("any");
        registry.register(first.clone()).unwrap();

        let second = always("any");
        match registry.register(second) {
            Err(MuxError::DuplicateName(name)) => assert_eq!(name, "any"),
            other => panic!("Expected DuplicateName, got {:?}", other),
        }

        assert_eq!(registry.len(), 1);
        let found = registry.lookup("any").unwrap();
        assert!(Arc::ptr_eq(&found, &first));
    }

    #[test]
    fn test_classify_follows_registration_order() {
        let prefix = [0u8, 0, 0];

        let mut registry = ProtocolRegistry::new();
        registry.register_builtin(["flex"]);
        registry.register(always("any")).unwrap();
        assert_eq!(registry.classify(&prefix).unwrap().name(), "flex");

        let mut reversed = ProtocolRegistry::new();
        reversed.register(always("any")).unwrap();
        reversed.register_builtin(["flex"]);
        assert_eq!(reversed.classify(&prefix).unwrap().name(), "any");
    }

    #[test]
    fn test_classify_without_match() {
        let mut registry = ProtocolRegistry::new();
        registry.register_builtin(["flex", "socks5"]);
        assert!(registry.classify(&[0x7F, 0x7F, 0x7F]).is_none());
    }

    #[test]
    fn test_register_builtin_reports_failures_and_continues() {
        let mut registry = ProtocolRegistry::with_queue_capacity(8);
        let failures = registry.register_builtin(["http", "bogus", "http", "flex"]);

        assert_eq!(registry.names(), vec!["http", "flex"]);
        assert_eq!(failures.len(), 2);
        assert!(matches!(&failures[0], (name, MuxError::BuiltinNotFound(_)) if name == "bogus"));
        assert!(matches!(&failures[1], (name, MuxError::DuplicateName(_)) if name == "http"));
    }

    #[test]
    fn test_lookup_missing() {
        let registry = ProtocolRegistry::default();
        assert!(registry.is_empty());
        assert!(matches!(registry.lookup("nope"), Err(MuxError::NotFound(name)) if name == "nope"));
    }
}
