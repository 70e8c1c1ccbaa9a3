//! Default configuration values
//!
//! Single source of truth for defaults, used both by serde when a field is
//! missing and by `MuxConfig::default()`.

use crate::protocol::builtin::{FLEX_NAME, HTTP_NAME, SOCKS5_NAME, TUNNEL_NAME};
use crate::protocol::DEFAULT_QUEUE_CAPACITY;
use crate::server::Network;

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "MIX_LISTENER_";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "mix-listener.json";

/// Default listen address as string
pub const LISTEN_STR: &str = "0.0.0.0:8080";

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Default listen address
pub fn listen() -> String {
    LISTEN_STR.to_string()
}

/// Default transport
pub fn network() -> Network {
    Network::Tcp
}

/// Default protocols: every built-in, HTTP first
pub fn protocols() -> Vec<String> {
    [HTTP_NAME, SOCKS5_NAME, TUNNEL_NAME, FLEX_NAME]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Default per-protocol hand-off queue capacity
pub fn queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

/// Default deadline for the sniff prefix in milliseconds
pub fn peek_timeout_ms() -> u64 {
    10_000
}

/// Default listen backlog
pub fn backlog() -> u32 {
    1024
}

/// Default upstream connection timeout in seconds
pub fn connect_timeout() -> u64 {
    30
}

/// Default log level
pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}
