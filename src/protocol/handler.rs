//! Protocol handler interface
//!
//! A protocol handler is a listener-shaped object: the dispatcher feeds it
//! connections whose prefix it tastes, and a protocol-specific server pulls
//! them out with `accept`. Concrete protocols only supply a name and a
//! taste predicate; the queue plumbing comes from [`ListenerBase`].

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use super::base::{Connection, ListenerBase, Rejected};
use crate::common::{MuxError, Result};

/// Protocol handler trait
///
/// Implementors provide [`name`](Self::name), [`taste`](Self::taste) and
/// access to their [`ListenerBase`]. The listener operations delegate to the
/// base by default and can be overridden.
pub trait ProtocolHandler: Send + Sync {
    /// Unique protocol name
    fn name(&self) -> &str;

    /// Classify a connection by its leading bytes
    ///
    /// Must be pure and total: no I/O, no blocking, and no indexing past the
    /// end of `prefix`, which may be shorter than expected.
    fn taste(&self, prefix: &[u8]) -> bool;

    /// The queue-backed base this handler delegates to
    fn base(&self) -> &ListenerBase;

    /// Hand a classified connection to this handler
    ///
    /// Waits while the queue is full. On failure the connection is returned
    /// and the caller must close it.
    fn push_conn(&self, conn: Connection) -> BoxFuture<'_, std::result::Result<(), Rejected>> {
        self.base().push(conn).boxed()
    }

    /// Wait for the next connection adopted by this protocol
    fn accept(&self) -> BoxFuture<'_, Result<Connection>> {
        self.base().accept().boxed()
    }

    /// Close the handler and every connection still queued
    fn close(&self) -> BoxFuture<'_, ()> {
        self.base().close().boxed()
    }

    /// Address of the shared listening socket, once bound
    fn address(&self) -> Option<SocketAddr> {
        self.base().address()
    }

    /// Record the address of the shared listening socket
    fn bind_address(&self, addr: SocketAddr) {
        self.base().bind_address(addr)
    }
}

/// Listener-shaped handle for protocol-specific servers
///
/// Returned by [`Dispatcher::get_listener`](crate::server::Dispatcher::get_listener).
/// Cloning the handle shares the underlying queue.
#[derive(Clone)]
pub struct ProtocolListener {
    handler: Arc<dyn ProtocolHandler>,
}

impl ProtocolListener {
    /// Wrap a registered handler
    pub fn new(handler: Arc<dyn ProtocolHandler>) -> Self {
        Self { handler }
    }

    /// Protocol name
    pub fn name(&self) -> &str {
        self.handler.name()
    }

    /// Wait for the next connection
    pub async fn accept(&self) -> Result<Connection> {
        self.handler.accept().await
    }

    /// Close the handler
    pub async fn close(&self) {
        self.handler.close().await
    }

    /// Address of the shared listening socket
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.handler.address().ok_or_else(|| {
            MuxError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("listener for {} is not bound yet", self.handler.name()),
            ))
        })
    }

    /// The underlying handler
    pub fn handler(&self) -> &Arc<dyn ProtocolHandler> {
        &self.handler
    }
}

impl fmt::Debug for ProtocolListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolListener")
            .field("name", &self.handler.name())
            .field("address", &self.handler.address())
            .finish()
    }
}

/// Handler built from an externally supplied predicate
///
/// # Example
///
/// ```
/// use mix_listener::protocol::{PredicateProtocol, ProtocolHandler};
///
/// let redis = PredicateProtocol::new("redis", 16, |prefix: &[u8]| prefix.first() == Some(&b'*'));
/// assert!(redis.taste(b"*1\r"));
/// assert!(!redis.taste(b"GET"));
/// ```
pub struct PredicateProtocol<F> {
    base: ListenerBase,
    predicate: F,
}

impl<F> PredicateProtocol<F>
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    /// Create a handler named `name` with a queue of `capacity` connections
    pub fn new(name: impl Into<String>, capacity: usize, predicate: F) -> Self {
        Self {
            base: ListenerBase::new(name, capacity),
            predicate,
        }
    }
}

impl<F> ProtocolHandler for PredicateProtocol<F>
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        self.base.name()
    }

    fn taste(&self, prefix: &[u8]) -> bool {
        (self.predicate)(prefix)
    }

    fn base(&self) -> &ListenerBase {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_protocol() {
        let any = PredicateProtocol::new("any", 8, |_: &[u8]| true);
        assert_eq!(any.name(), "any");
        assert!(any.taste(&[]));
        assert!(any.taste(&[1, 2, 3]));
        assert_eq!(any.address(), None);
    }

    #[tokio::test]
    async fn test_listener_handle_shares_handler() {
        let handler: Arc<dyn ProtocolHandler> =
            Arc::new(PredicateProtocol::new("any", 8, |_: &[u8]| true));
        let listener = ProtocolListener::new(handler.clone());
        assert_eq!(listener.name(), "any");
        assert!(listener.local_addr().is_err());

        let addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();
        handler.bind_address(addr);
        assert_eq!(listener.local_addr().unwrap(), addr);

        listener.clone().close().await;
        assert!(handler.base().is_closed());
        assert!(matches!(listener.accept().await, Err(MuxError::Closed(_))));
    }
}
