use std::io;
use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for harness operations
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Failed to create temporary directory: {0}")]
    TempDir(#[source] io::Error),

    #[error("Invalid environment variable name: {0:?}")]
    InvalidEnvKey(String),

    #[error("Invalid value for environment variable {0}: contains NUL")]
    InvalidEnvValue(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;
