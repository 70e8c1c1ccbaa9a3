//! Error handling module
//!
//! This module defines the error types and result type aliases used in the application.

use thiserror::Error;
use std::io;

/// Mix listener error type
#[derive(Error, Debug)]
pub enum MuxError {
    /// A protocol with the same name is already registered
    #[error("Protocol already registered: {0}")]
    DuplicateName(String),

    /// Unknown built-in protocol requested
    #[error("Built-in protocol not found: {0}")]
    BuiltinNotFound(String),

    /// Lookup of a registered protocol failed
    #[error("Protocol not found: {0}")]
    NotFound(String),

    /// Reading the sniff prefix failed
    #[error("Peek error: {0}")]
    Peek(#[source] io::Error),

    /// No registered protocol claimed the connection
    #[error("No protocol matched prefix {prefix:02X?}")]
    NoMatch {
        /// The peeked prefix
        prefix: Vec<u8>,
    },

    /// Accepting on the shared socket failed
    #[error("Accept error: {0}")]
    Accept(#[source] io::Error),

    /// Operation on a closed protocol handler
    #[error("Protocol listener closed: {0}")]
    Closed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias
///
/// This is a `Result` type alias that uses our custom `MuxError`.
pub type Result<T> = std::result::Result<T, MuxError>;
