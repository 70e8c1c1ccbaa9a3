//! Connection wrappers
//!
//! Accepted connections are wrapped in a [`PeekableConnection`] so the
//! dispatcher can inspect their first bytes and replay them to whichever
//! protocol adopts the connection.

mod peekable;

pub use peekable::PeekableConnection;
