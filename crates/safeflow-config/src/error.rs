//! Error types for loading engine descriptions.

use std::path::PathBuf;

use safeflow_engine::EngineError;
use thiserror::Error;

/// Errors raised while loading or validating an engine description.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The extension is neither JSON nor YAML.
    #[error("unsupported description format: {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),

    /// Invalid JSON.
    #[error("invalid JSON description: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid YAML.
    #[error("invalid YAML description: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The description declares a schema this crate does not understand.
    #[error("unsupported schema version {found} (supported: {supported})")]
    UnsupportedSchema {
        /// Declared version.
        found: u8,
        /// Supported version.
        supported: u8,
    },

    /// The same signal id is declared twice.
    #[error("signal {0} is declared more than once")]
    DuplicateSignal(u8),

    /// Two signals share a name.
    #[error("signal name '{0}' is used more than once")]
    DuplicateSignalName(String),

    /// The description violates an engine invariant.
    #[error("invalid engine configuration: {0}")]
    Engine(#[from] EngineError),
}

impl ConfigError {
    /// Whether this is a content problem rather than an I/O failure.
    pub fn is_validation(&self) -> bool {
        !matches!(self, ConfigError::Io { .. })
    }
}

/// Result type for description handling.
pub type ConfigResult<T> = Result<T, ConfigError>;
