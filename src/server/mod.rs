//! Dispatch server module
//!
//! This module binds the shared socket, classifies accepted connections and
//! routes them to protocol handlers.

mod dispatcher;
pub mod events;
mod network;

pub use dispatcher::Dispatcher;
pub use events::{ChannelSink, DispatchEvent, EventSink, LogSink};
pub use network::Network;
