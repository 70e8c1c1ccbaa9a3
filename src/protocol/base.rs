//! Queue-backed listener base
//!
//! [`ListenerBase`] is the default implementation object shared by every
//! protocol handler. The dispatcher pushes classified connections into it
//! and the protocol's own server pulls them out with `accept`, the same way
//! it would accept from a dedicated socket.

use log::{debug, trace};
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};

use crate::common::{MuxError, Result};
use crate::conn::PeekableConnection;

/// Connection type handed to protocol servers
pub type Connection = PeekableConnection<TcpStream>;

/// Default number of classified connections a handler buffers before
/// `push` starts waiting
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// A connection that could not be handed off
///
/// The connection is returned to the caller, who is responsible for
/// closing it.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Rejected {
    /// The connection that was not enqueued
    pub conn: Connection,
    /// Why the hand-off failed
    #[source]
    pub error: MuxError,
}

/// Bounded hand-off queue with listener semantics
pub struct ListenerBase {
    name: String,
    sender: mpsc::Sender<Connection>,
    receiver: Mutex<mpsc::Receiver<Connection>>,
    closed: watch::Sender<bool>,
    address: OnceCell<SocketAddr>,
}

impl ListenerBase {
    /// Create a base for the protocol `name` buffering up to `capacity`
    /// connections
    ///
    /// A zero capacity is raised to one.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (closed, _) = watch::channel(false);

        Self {
            name: name.into(),
            sender,
            receiver: Mutex::new(receiver),
            closed,
            address: OnceCell::new(),
        }
    }

    /// Protocol name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Number of connections waiting to be accepted
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Enqueue a classified connection
    ///
    /// Waits while the queue is full. Fails if the handler is closed before
    /// a slot frees up; the connection is then returned inside [`Rejected`].
    pub async fn push(&self, conn: Connection) -> std::result::Result<(), Rejected> {
        let permit = tokio::select! {
            biased;
            _ = self.wait_closed() => None,
            permit = self.sender.reserve() => permit.ok(),
        };

        let Some(permit) = permit else {
            return Err(Rejected {
                conn,
                error: self.closed_error(),
            });
        };
        permit.send(conn);

        // close() may have drained the queue between reserve and send
        if self.is_closed() {
            self.drain().await;
        }

        trace!("Queued connection for {} ({} pending)", self.name, self.pending());
        Ok(())
    }

    /// Wait for the next connection
    ///
    /// Fails with [`MuxError::Closed`] once the handler is closed.
    pub async fn accept(&self) -> Result<Connection> {
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let mut receiver = tokio::select! {
            biased;
            _ = self.wait_closed() => return Err(self.closed_error()),
            receiver = self.receiver.lock() => receiver,
        };

        tokio::select! {
            biased;
            _ = self.wait_closed() => Err(self.closed_error()),
            conn = receiver.recv() => conn.ok_or_else(|| self.closed_error()),
        }
    }

    /// Close the handler
    ///
    /// Wakes every waiting `push` and `accept` with an error and closes all
    /// connections still queued. Calling it again is a no-op.
    pub async fn close(&self) {
        let first = self.closed.send_if_modified(|closed| !std::mem::replace(closed, true));
        if first {
            debug!("Closing protocol listener {}", self.name);
        }

        self.drain().await;
    }

    /// Address of the shared listening socket, once bound
    pub fn address(&self) -> Option<SocketAddr> {
        self.address.get().copied()
    }

    /// Record the address of the shared listening socket
    ///
    /// Only the first call has an effect.
    pub fn bind_address(&self, addr: SocketAddr) {
        if self.address.set(addr).is_err() {
            trace!("Address of {} already bound, ignoring {}", self.name, addr);
        }
    }

    async fn wait_closed(&self) {
        let mut closed = self.closed.subscribe();
        // The sender lives in self, so this only returns once closed
        let _ = closed.wait_for(|closed| *closed).await;
    }

    async fn drain(&self) {
        let mut receiver = self.receiver.lock().await;
        receiver.close();

        let mut drained = 0usize;
        while let Ok(conn) = receiver.try_recv() {
            drained += 1;
            if let Err(e) = conn.close().await {
                trace!("Error closing queued connection for {}: {}", self.name, e);
            }
        }

        if drained > 0 {
            debug!("Closed {} queued connections of {}", drained, self.name);
        }
    }

    fn closed_error(&self) -> MuxError {
        MuxError::Closed(self.name.clone())
    }
}

impl std::fmt::Debug for ListenerBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerBase")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .field("address", &self.address())
            .finish()
    }
}
