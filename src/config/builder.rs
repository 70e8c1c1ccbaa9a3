//! Configuration builder
//!
//! This module provides a builder pattern for constructing configuration.

use log::debug;
use std::path::Path;

use super::source::{CliSource, ConfigSource, DefaultSource, EnvSource, FileSource};
use super::validator::{normalize_log_level, validate_config};
use super::{ConfigOverrides, MuxConfig};
use super::{DEFAULT_CONFIG_FILE, ENV_PREFIX};
use crate::common::Result;

/// Configuration builder
///
/// Provides a fluent API for building configuration from multiple sources.
/// Sources added later take priority.
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    validate: bool,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            validate: true,
        }
    }

    /// Add default source
    pub fn with_defaults(mut self) -> Self {
        debug!("Adding default configuration source");
        self.sources.push(Box::new(DefaultSource));
        self
    }

    /// Add a required file source
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        debug!("Adding file configuration source: {}", path.as_ref().display());
        self.sources.push(Box::new(FileSource::new(path)));
        self
    }

    /// Add a file source that is skipped when the file is missing
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        debug!("Adding optional file configuration source: {}", path.as_ref().display());
        self.sources.push(Box::new(FileSource::optional(path)));
        self
    }

    /// Add environment source
    pub fn with_env(mut self, prefix: &str) -> Self {
        debug!("Adding environment configuration source with prefix: {}", prefix);
        self.sources.push(Box::new(EnvSource::new(prefix)));
        self
    }

    /// Add command line source
    pub fn with_cli(mut self, overrides: ConfigOverrides) -> Self {
        debug!("Adding command line configuration source");
        self.sources.push(Box::new(CliSource::new(overrides)));
        self
    }

    /// Disable validation
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<MuxConfig> {
        let mut config = MuxConfig::default();

        debug!("Building configuration from {} sources", self.sources.len());

        // Apply sources in order (lowest to highest priority)
        for source in self.sources {
            debug!("Loading configuration from source: {}", source.source_type());
            config.apply(source.load()?);
        }
        normalize_log_level(&mut config);

        if self.validate {
            debug!("Validating configuration");
            validate_config(&config)?;
        }

        debug!("Final configuration:");
        config.log();

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
            .with_defaults()
            .with_optional_file(DEFAULT_CONFIG_FILE)
            .with_env(ENV_PREFIX)
    }
}
