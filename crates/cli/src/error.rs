//! Error types for sfctl

use std::path::PathBuf;

use safeflow_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read event script {path}: {source}")]
    ScriptIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Event script line {line}: {source}")]
    ScriptLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Event script line {line}: unknown signal '{name}'")]
    UnknownSignal { line: usize, name: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Config(err) if err.is_validation() => 4,
            CliError::ScriptLine { .. }
            | CliError::UnknownSignal { .. }
            | CliError::ValidationError(_) => 4,
            _ => 1,
        }
    }
}
