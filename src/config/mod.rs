//! Application configuration.
//!
//! Loaded from YAML files and environment variables into a single Config.

mod engine;
mod stream;

pub use engine::{CheckpointConfig, CheckpointStoreType, EngineConfig, SourceConfig, TargetConfig};
pub use stream::{Direction, InitialCheckpoint, PushTopicConfig, StreamDefinition};

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "CDC_REPLICATOR_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "CDC_REPLICATOR";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "CDC_REPLICATOR_LOG";
/// Environment variable selecting the log format (`json` or text).
pub const LOG_FORMAT_ENV_VAR: &str = "CDC_REPLICATOR_LOG_FORMAT";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration for {stream}: {reason}")]
    Invalid { stream: String, reason: String },
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub checkpoint: CheckpointConfig,
    /// Write API of pull streams.
    pub target: TargetConfig,
    /// AWS clients.
    pub source: SourceConfig,
    pub streams: Vec<StreamDefinition>,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check the engine-wide sections.
    ///
    /// Stream definitions are validated one by one when they are started, so
    /// a bad definition only disables its own stream.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.empty_read_threshold == 0 {
            return Err(ConfigError::Invalid {
                stream: "engine".to_string(),
                reason: "empty_read_threshold must be at least 1".to_string(),
            });
        }
        if self.target.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid {
                stream: "target".to_string(),
                reason: "endpoint is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Definitions with `enabled: true`.
    pub fn enabled_streams(&self) -> impl Iterator<Item = &StreamDefinition> {
        self.streams.iter().filter(|s| s.enabled)
    }
}
