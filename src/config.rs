//! Configuration parsing and structures

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::Level;

use crate::logger::{default_logger, init_tracing, JsonLogger, Logger, TracingLogger};

/// Harness configuration, usually deserialized from YAML.
///
/// ```yaml
/// allow_exit: true
/// logging:
///   level: info
///   format: json
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarnessConfig {
    /// Abort the calling task on fail_now/skip_now instead of returning
    #[serde(default)]
    pub allow_exit: bool,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Where entries go
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines on stdout
    #[default]
    Json,
    /// Events on the active `tracing` subscriber
    Tracing,
}

impl LoggingConfig {
    /// Parse the configured level
    pub fn level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.level).map_err(|_| {
            ConfigError::ValidationError(format!("Unknown log level: {:?}", self.level))
        })
    }

    /// Build the logger this section describes
    pub fn build_logger(&self) -> Result<Arc<dyn Logger>, ConfigError> {
        let level = self.level()?;
        let logger: Arc<dyn Logger> = match self.format {
            LogFormat::Json if level == Level::INFO => default_logger(),
            LogFormat::Json => Arc::new(JsonLogger::stdout().with_min_level(level)),
            LogFormat::Tracing => {
                init_tracing(&self.level);
                Arc::new(TracingLogger)
            }
        };
        Ok(logger)
    }
}

impl HarnessConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: HarnessConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.level()?;
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
