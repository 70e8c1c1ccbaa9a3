//! Configuration module
//!
//! [`MuxConfig`] holds everything needed to run a dispatcher from the
//! command line. Values are layered, lowest priority first:
//!
//! 1. Default values
//! 2. JSON configuration file
//! 3. Environment variables (`MIX_LISTENER_*`)
//! 4. Command line arguments

pub mod builder;
pub mod defaults;
pub mod source;
pub mod validator;

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::common::{MuxError, Result};
use crate::server::Network;

pub use builder::ConfigBuilder;
pub use defaults::{DEFAULT_CONFIG_FILE, ENV_PREFIX};
pub use source::{ConfigSource, ValueSource};
pub use validator::{normalize_log_level, validate_config};

/// Runtime configuration of the mix listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxConfig {
    /// Address of the shared listening socket
    #[serde(default = "defaults::listen")]
    pub listen: String,

    /// Transport kind used to bind `listen`
    #[serde(default = "defaults::network")]
    pub network: Network,

    /// Built-in protocols to register, in dispatch priority order
    #[serde(default = "defaults::protocols")]
    pub protocols: Vec<String>,

    /// Upstream address per protocol name
    #[serde(default)]
    pub routes: BTreeMap<String, String>,

    /// Connections each protocol buffers before classification waits
    #[serde(default = "defaults::queue_capacity")]
    pub queue_capacity: usize,

    /// Deadline for the sniff prefix in milliseconds (0 waits forever)
    #[serde(default = "defaults::peek_timeout_ms")]
    pub peek_timeout_ms: u64,

    /// Maximum number of connections classified concurrently (unbounded if unset)
    #[serde(default)]
    pub max_pending: Option<usize>,

    /// Listen backlog
    #[serde(default = "defaults::backlog")]
    pub backlog: u32,

    /// Upstream connection timeout in seconds
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout: u64,

    /// Log level
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            listen: defaults::listen(),
            network: defaults::network(),
            protocols: defaults::protocols(),
            routes: BTreeMap::new(),
            queue_capacity: defaults::queue_capacity(),
            peek_timeout_ms: defaults::peek_timeout_ms(),
            max_pending: None,
            backlog: defaults::backlog(),
            connect_timeout: defaults::connect_timeout(),
            log_level: defaults::log_level(),
        }
    }
}

impl MuxConfig {
    /// Peek deadline, `None` when disabled
    pub fn peek_timeout(&self) -> Option<Duration> {
        match self.peek_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Upstream connection timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Apply the values set in `overrides`
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            listen,
            network,
            protocols,
            routes,
            queue_capacity,
            peek_timeout_ms,
            max_pending,
            backlog,
            connect_timeout,
            log_level,
        } = overrides;

        if let Some(listen) = listen {
            self.listen = listen;
        }
        if let Some(network) = network {
            self.network = network;
        }
        if let Some(protocols) = protocols {
            self.protocols = protocols;
        }
        if let Some(routes) = routes {
            // Routes merge per protocol rather than replacing the whole table
            self.routes.extend(routes);
        }
        if let Some(queue_capacity) = queue_capacity {
            self.queue_capacity = queue_capacity;
        }
        if let Some(peek_timeout_ms) = peek_timeout_ms {
            self.peek_timeout_ms = peek_timeout_ms;
        }
        if let Some(max_pending) = max_pending {
            self.max_pending = Some(max_pending);
        }
        if let Some(backlog) = backlog {
            self.backlog = backlog;
        }
        if let Some(connect_timeout) = connect_timeout {
            self.connect_timeout = connect_timeout;
        }
        if let Some(log_level) = log_level {
            self.log_level = log_level;
        }
    }

    /// Log the effective configuration at debug level
    pub fn log(&self) {
        debug!("  listen: {} ({})", self.listen, self.network);
        debug!("  protocols: {}", self.protocols.join(", "));
        for (protocol, upstream) in &self.routes {
            debug!("  route: {} -> {}", protocol, upstream);
        }
        debug!("  queue_capacity: {}", self.queue_capacity);
        debug!("  peek_timeout_ms: {}", self.peek_timeout_ms);
        debug!("  max_pending: {:?}", self.max_pending);
        debug!("  backlog: {}", self.backlog);
        debug!("  connect_timeout: {}s", self.connect_timeout);
        debug!("  log_level: {}", self.log_level);
    }
}

/// Partial configuration produced by a single source
///
/// Every field is optional; unset fields leave the lower-priority value in
/// place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    /// See [`MuxConfig::listen`]
    pub listen: Option<String>,
    /// See [`MuxConfig::network`]
    pub network: Option<Network>,
    /// See [`MuxConfig::protocols`]
    pub protocols: Option<Vec<String>>,
    /// See [`MuxConfig::routes`]
    pub routes: Option<BTreeMap<String, String>>,
    /// See [`MuxConfig::queue_capacity`]
    pub queue_capacity: Option<usize>,
    /// See [`MuxConfig::peek_timeout_ms`]
    pub peek_timeout_ms: Option<u64>,
    /// See [`MuxConfig::max_pending`]
    pub max_pending: Option<usize>,
    /// See [`MuxConfig::backlog`]
    pub backlog: Option<u32>,
    /// See [`MuxConfig::connect_timeout`]
    pub connect_timeout: Option<u64>,
    /// See [`MuxConfig::log_level`]
    pub log_level: Option<String>,
}

/// Parse a `protocol=host:port` route specification
pub fn parse_route(spec: &str) -> Result<(String, String)> {
    match spec.split_once('=') {
        Some((protocol, upstream)) if !protocol.trim().is_empty() && !upstream.trim().is_empty() => {
            Ok((protocol.trim().to_string(), upstream.trim().to_string()))
        }
        _ => Err(MuxError::Config(format!(
            "Invalid route '{}': expected protocol=host:port",
            spec
        ))),
    }
}

/// Split a comma separated protocol list, dropping empty entries
pub fn parse_protocol_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
