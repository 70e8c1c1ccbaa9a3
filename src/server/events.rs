//! Dispatch events
//!
//! The dispatcher never logs per-connection outcomes directly; it reports
//! them to an [`EventSink`]. [`LogSink`] is the default, [`ChannelSink`]
//! lets embedders and tests observe outcomes programmatically.

use log::{debug, trace, warn};
use metrics::counter;
use std::net::SocketAddr;
use tokio::sync::mpsc;

use crate::common::MuxError;

/// Outcome of one step of a connection's classification
#[derive(Debug)]
pub enum DispatchEvent {
    /// A raw connection was accepted on the shared socket
    Accepted {
        /// Remote address
        peer: SocketAddr,
    },
    /// The connection was queued for a protocol
    Routed {
        /// Remote address
        peer: SocketAddr,
        /// Name of the adopting protocol
        protocol: String,
    },
    /// The sniff prefix could not be read; the connection was closed
    PeekFailed {
        /// Remote address
        peer: SocketAddr,
        /// Underlying peek error
        error: MuxError,
    },
    /// No protocol accepted the prefix; the connection was closed
    NoMatch {
        /// Remote address
        peer: SocketAddr,
        /// [`MuxError::NoMatch`] carrying the tasted prefix
        error: MuxError,
    },
    /// The matching protocol refused the connection; it was closed
    HandoffFailed {
        /// Remote address
        peer: SocketAddr,
        /// Name of the matching protocol
        protocol: String,
        /// Why the hand-off failed
        error: MuxError,
    },
}

impl DispatchEvent {
    /// Remote address the event is about
    pub fn peer(&self) -> SocketAddr {
        match self {
            DispatchEvent::Accepted { peer }
            | DispatchEvent::Routed { peer, .. }
            | DispatchEvent::PeekFailed { peer, .. }
            | DispatchEvent::NoMatch { peer, .. }
            | DispatchEvent::HandoffFailed { peer, .. } => *peer,
        }
    }

    /// Whether the connection was closed by the dispatcher
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DispatchEvent::PeekFailed { .. } | DispatchEvent::NoMatch { .. } | DispatchEvent::HandoffFailed { .. }
        )
    }
}

/// Receiver of dispatch events
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Report one event
    ///
    /// Called from classification tasks; must not block.
    fn report(&self, event: DispatchEvent);
}

/// Event sink writing to the `log` facade and `metrics` counters
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn report(&self, event: DispatchEvent) {
        match event {
            DispatchEvent::Accepted { peer } => {
                counter!("mix_listener.connections.accepted").increment(1);
                trace!("Accepted connection from {}", peer);
            }
            DispatchEvent::Routed { peer, protocol } => {
                debug!("Connection from {} routed to {}", peer, protocol);
                counter!("mix_listener.connections.routed", "protocol" => protocol).increment(1);
            }
            DispatchEvent::PeekFailed { peer, error } => {
                warn!("Peek failed for connection from {}: {}", peer, error);
                counter!("mix_listener.connections.rejected", "reason" => "peek").increment(1);
            }
            DispatchEvent::NoMatch { peer, error } => {
                warn!("Rejected connection from {}: {}", peer, error);
                counter!("mix_listener.connections.rejected", "reason" => "no_match").increment(1);
            }
            DispatchEvent::HandoffFailed { peer, protocol, error } => {
                warn!("Failed to hand connection from {} to {}: {}", peer, protocol, error);
                counter!("mix_listener.connections.rejected", "reason" => "closed").increment(1);
            }
        }
    }
}

/// Event sink forwarding every event into a channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<DispatchEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DispatchEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn report(&self, event: DispatchEvent) {
        // Nobody listening any more is not the dispatcher's problem
        let _ = self.sender.send(event);
    }
}
