//! Logging helpers
//!
//! Thin wrapper around `env_logger` used by the binary.

use log::LevelFilter;

/// Level used when none is configured or the configured one is invalid
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Initialize the global logger
///
/// `RUST_LOG` takes precedence over `level` when it is set. Without it the
/// level can be changed later with [`set_log_level`], so the logger can be
/// installed before the configuration is loaded.
///
/// # Parameters
///
/// * `level` - Initial log level
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", LevelFilter::Trace.as_str());

    // A second initialization (e.g. from tests) is not an error worth failing on
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();

    set_log_level(level);
}

/// Change the active log level
///
/// Ignored when `RUST_LOG` is set.
pub fn set_log_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(parse_log_level(level));
    }
}

/// Parse a log level name, falling back to [`DEFAULT_LOG_LEVEL`]
pub fn parse_log_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(DEFAULT_LOG_LEVEL)
}
