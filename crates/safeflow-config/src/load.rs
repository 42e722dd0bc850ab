//! Reading descriptions from disk.

use std::path::Path;

use tracing::info;

use crate::description::EngineDescription;
use crate::error::{ConfigError, ConfigResult};

/// Serialization format of a description file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
}

impl Format {
    /// Format for a path, chosen by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    /// Parse `text` in this format.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Json`] or [`ConfigError::Yaml`].
    pub fn parse(self, text: &str) -> ConfigResult<EngineDescription> {
        match self {
            Format::Json => EngineDescription::from_json_str(text),
            Format::Yaml => EngineDescription::from_yaml_str(text),
        }
    }
}

/// Load a description, picking the parser from the file extension.
///
/// The description is parsed but not validated; call
/// [`EngineDescription::validate`] or build it.
///
/// # Errors
///
/// I/O, unknown extension or parse failures.
pub fn load_description(path: impl AsRef<Path>) -> ConfigResult<EngineDescription> {
    let path = path.as_ref();
    let format =
        Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let description = format.parse(&text)?;
    info!(
        path = %path.display(),
        ?format,
        signals = description.signals.len(),
        merges = description.merges.len(),
        monitors = description.fault_monitors.len(),
        "loaded engine description"
    );
    Ok(description)
}
