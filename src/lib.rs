//! Mix Listener: several wire protocols on one listening socket
//!
//! For every accepted connection the dispatcher peeks a short prefix
//! without consuming it, asks the registered protocols in registration
//! order whether they recognise it, and hands the connection to the first
//! one that does. Each protocol exposes a listener-shaped handle, so an
//! existing protocol server can `accept` from it as if it owned a socket.
//! The peeked bytes are replayed on the first reads.
//!
//! # Main Features
//!
//! - Non-destructive peeking of the leading bytes
//! - Deterministic first-match dispatch in registration order
//! - Bounded per-protocol hand-off queues with listener semantics
//! - Built-in HTTP, SOCKS5, TLS tunnel and flex recognisers
//! - Pluggable event sink for per-connection outcomes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mix_listener::{Dispatcher, Network, Result};
//! use mix_listener::protocol::PredicateProtocol;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let dispatcher = Dispatcher::new(Network::Tcp, "0.0.0.0:8080");
//!     dispatcher.register_builtin(["flex", "http"]);
//!
//!     // Anything starting with '*' is a RESP request
//!     dispatcher.register(Arc::new(PredicateProtocol::new("redis", 64, |prefix: &[u8]| {
//!         prefix.first() == Some(&b'*')
//!     })))?;
//!
//!     let redis = dispatcher.get_listener("redis")?;
//!     tokio::spawn(async move {
//!         while let Ok(conn) = redis.accept().await {
//!             // serve RESP on `conn`
//!             drop(conn);
//!         }
//!     });
//!
//!     dispatcher.run().await
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod conn;
pub mod protocol;
pub mod relay;
pub mod server;

// Re-export commonly used structures and functions for convenience
pub use common::{parse_socket_addr, MuxError, Result};
pub use conn::PeekableConnection;
pub use protocol::{BuiltinProtocol, ProtocolHandler, ProtocolListener, ProtocolRegistry};
pub use server::{Dispatcher, Network};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
