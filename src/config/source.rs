//! Configuration sources
//!
//! Each source produces a [`ConfigOverrides`]; the builder applies them in
//! order of increasing priority.

use log::{debug, warn};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{parse_protocol_list, parse_route, ConfigOverrides};
use crate::common::{MuxError, Result};
use crate::server::Network;

/// Source of a configuration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueSource {
    /// Default value
    Default,
    /// From configuration file
    File,
    /// From environment variable
    Environment,
    /// From command line argument
    CommandLine,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::Default => write!(f, "default"),
            ValueSource::File => write!(f, "file"),
            ValueSource::Environment => write!(f, "environment"),
            ValueSource::CommandLine => write!(f, "command line"),
        }
    }
}

/// Configuration source trait
pub trait ConfigSource {
    /// Load the values this source sets
    fn load(&self) -> Result<ConfigOverrides>;

    /// Get the source type
    fn source_type(&self) -> ValueSource;
}

/// Default configuration source
///
/// Sets nothing; defaults come from `MuxConfig::default()`.
pub struct DefaultSource;

impl ConfigSource for DefaultSource {
    fn load(&self) -> Result<ConfigOverrides> {
        Ok(ConfigOverrides::default())
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::Default
    }
}

/// JSON file configuration source
pub struct FileSource {
    path: PathBuf,
    required: bool,
}

impl FileSource {
    /// Source that fails if the file does not exist
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required: true,
        }
    }

    /// Source that is skipped if the file does not exist
    pub fn optional<P: AsRef<Path>>(path: P) -> Self {
        Self {
            required: false,
            ..Self::new(path)
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<ConfigOverrides> {
        let path_display = self.path.display();

        if !self.path.exists() {
            if self.required {
                return Err(MuxError::Config(format!("Configuration file not found: {}", path_display)));
            }
            warn!("Configuration file not found: {}", path_display);
            return Ok(ConfigOverrides::default());
        }

        debug!("Loading configuration from file: {}", path_display);
        let content = fs::read_to_string(&self.path)
            .map_err(|e| MuxError::Config(format!("Failed to read config file {}: {}", path_display, e)))?;

        serde_json::from_str(&content)
            .map_err(|e| MuxError::Config(format!("Failed to parse JSON config file {}: {}", path_display, e)))
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::File
    }
}

/// Environment variable configuration source
///
/// Reads `<PREFIX>LISTEN`, `<PREFIX>NETWORK`, `<PREFIX>PROTOCOLS` (comma
/// separated), `<PREFIX>ROUTES` (comma separated `protocol=host:port`),
/// `<PREFIX>QUEUE_CAPACITY`, `<PREFIX>PEEK_TIMEOUT_MS`, `<PREFIX>MAX_PENDING`,
/// `<PREFIX>BACKLOG`, `<PREFIX>CONNECT_TIMEOUT` and `<PREFIX>LOG_LEVEL`.
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    /// Create a new environment source
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    fn get(&self, name: &str) -> Option<String> {
        env::var(format!("{}{}", self.prefix, name)).ok()
    }

    fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(name)
            .map(|value| {
                value.trim().parse::<T>().map_err(|e| {
                    MuxError::Config(format!("Invalid value for {}{}: {}", self.prefix, name, e))
                })
            })
            .transpose()
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<ConfigOverrides> {
        debug!("Loading configuration from environment with prefix {}", self.prefix);

        let routes = match self.get("ROUTES") {
            Some(value) => Some(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|spec| !spec.is_empty())
                    .map(parse_route)
                    .collect::<Result<BTreeMap<_, _>>>()?,
            ),
            None => None,
        };

        Ok(ConfigOverrides {
            listen: self.get("LISTEN"),
            network: self.parse::<Network>("NETWORK")?,
            protocols: self.get("PROTOCOLS").map(|list| parse_protocol_list(&list)),
            routes,
            queue_capacity: self.parse("QUEUE_CAPACITY")?,
            peek_timeout_ms: self.parse("PEEK_TIMEOUT_MS")?,
            max_pending: self.parse("MAX_PENDING")?,
            backlog: self.parse("BACKLOG")?,
            connect_timeout: self.parse("CONNECT_TIMEOUT")?,
            log_level: self.get("LOG_LEVEL"),
        })
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::Environment
    }
}

/// Command line configuration source
///
/// The binary parses its arguments with clap and hands the result over as
/// overrides.
pub struct CliSource {
    overrides: ConfigOverrides,
}

impl CliSource {
    /// Create a new command line source
    pub fn new(overrides: ConfigOverrides) -> Self {
        Self { overrides }
    }
}

impl ConfigSource for CliSource {
    fn load(&self) -> Result<ConfigOverrides> {
        Ok(self.overrides.clone())
    }

    fn source_type(&self) -> ValueSource {
        ValueSource::CommandLine
    }
}
