//! Configuration
//!
//! Layered configuration for the replicator: built-in defaults, an optional
//! `tether.toml` file, and `TETHER_*` environment overrides, merged in that
//! order through the `config` crate builder. CLI flags override all of it in
//! the binary.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "tether.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TetherConfig {
    /// Replication tuning
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tuning knobs for a replication session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Capacity of the bounded change-event queue. The watch callback blocks
    /// when the queue is full.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    /// How often the propagation loop wakes to check its stop flag, in
    /// milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_event_queue_capacity() -> usize {
    1024
}

fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: default_event_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TetherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replication.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "replication.event_queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.replication.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "replication.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loader merging defaults, file, and environment sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with the full merge chain.
    ///
    /// Precedence, lowest to highest: built-in defaults, the config file
    /// (`path` when given, otherwise `tether.toml` in the working directory
    /// when present), then `TETHER_*` environment variables
    /// (e.g. `TETHER_REPLICATION__POLL_INTERVAL_MS=50`).
    pub fn load(path: Option<&Path>) -> Result<TetherConfig, ConfigError> {
        let mut builder = Config::builder()
            .set_default(
                "replication.event_queue_capacity",
                default_event_queue_capacity() as i64,
            )
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .set_default(
                "replication.poll_interval_ms",
                default_poll_interval_ms() as i64,
            )
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        match path {
            Some(explicit) => {
                let name = explicit
                    .to_str()
                    .ok_or_else(|| ConfigError::Load("config path is not UTF-8".to_string()))?;
                builder = builder.add_source(File::with_name(name).required(true));
            }
            None => {
                if Path::new(CONFIG_FILE_NAME).exists() {
                    builder = builder.add_source(File::with_name(CONFIG_FILE_NAME).required(false));
                }
            }
        }

        let config: TetherConfig = builder
            .add_source(Environment::with_prefix("TETHER").separator("__"))
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load a single TOML file without merging any other source.
    pub fn load_from_file(path: &Path) -> Result<TetherConfig, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let config: TetherConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
