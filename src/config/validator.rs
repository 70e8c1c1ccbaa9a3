//! Configuration validator
//!
//! This module provides functionality for validating configuration.

use log::warn;
use std::collections::HashSet;

use super::MuxConfig;
use crate::common::{parse_socket_addr, MuxError, Result, DEFAULT_LOG_LEVEL};
use crate::protocol::BuiltinProtocol;

/// Validate the configuration
pub fn validate_config(config: &MuxConfig) -> Result<()> {
    validate_network_settings(config)?;
    validate_protocol_settings(config)?;
    validate_general_settings(config)?;
    Ok(())
}

/// Replace an unknown log level with the default
pub fn normalize_log_level(config: &mut MuxConfig) {
    if config.log_level.parse::<log::LevelFilter>().is_err() {
        let fallback = DEFAULT_LOG_LEVEL.as_str().to_lowercase();
        warn!("Invalid log level: {}. Using default: {}", config.log_level, fallback);
        config.log_level = fallback;
    }
}

/// Validate network settings
fn validate_network_settings(config: &MuxConfig) -> Result<()> {
    let listen = parse_socket_addr(&config.listen)?;
    config.network.check_addr(listen)?;

    if config.backlog == 0 {
        return Err(invalid("backlog", "Backlog must be greater than 0"));
    }

    Ok(())
}

/// Validate protocols and routes
fn validate_protocol_settings(config: &MuxConfig) -> Result<()> {
    if config.protocols.is_empty() {
        return Err(invalid("protocols", "At least one protocol must be enabled"));
    }

    let mut seen = HashSet::new();
    for name in &config.protocols {
        name.parse::<BuiltinProtocol>()?;
        if !seen.insert(name.as_str()) {
            return Err(invalid("protocols", &format!("Protocol {} is listed twice", name)));
        }
    }

    for (protocol, upstream) in &config.routes {
        if !seen.contains(protocol.as_str()) {
            return Err(invalid(
                "routes",
                &format!("Route for {} but the protocol is not enabled", protocol),
            ));
        }
        parse_socket_addr(upstream)?;
    }

    Ok(())
}

/// Validate general settings
fn validate_general_settings(config: &MuxConfig) -> Result<()> {
    if config.queue_capacity == 0 {
        return Err(invalid("queue_capacity", "Queue capacity must be greater than 0"));
    }

    if config.max_pending == Some(0) {
        return Err(invalid("max_pending", "Max pending must be greater than 0 when set"));
    }

    if config.connect_timeout == 0 {
        return Err(invalid("connect_timeout", "Connection timeout must be greater than 0"));
    }

    Ok(())
}

fn invalid(field: &str, message: &str) -> MuxError {
    MuxError::Config(format!("Invalid value for '{}': {}", field, message))
}
