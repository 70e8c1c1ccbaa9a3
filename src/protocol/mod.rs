//! Protocol handlers and registry
//!
//! This module defines how protocols are recognised and how classified
//! connections reach the protocol-specific servers:
//!
//! - [`ProtocolHandler`]: name, taste predicate and listener operations
//! - [`ListenerBase`]: the default queue-backed implementation
//! - [`ProtocolRegistry`]: ordered, name-unique set of handlers
//! - [`builtin`]: protocols selectable by well-known name

mod base;
pub mod builtin;
mod handler;
mod registry;

pub use base::{Connection, ListenerBase, Rejected, DEFAULT_QUEUE_CAPACITY};
pub use builtin::BuiltinProtocol;
pub use handler::{PredicateProtocol, ProtocolHandler, ProtocolListener};
pub use registry::ProtocolRegistry;

/// Number of leading bytes inspected to classify a connection
pub const SNIFF_LEN: usize = 3;
