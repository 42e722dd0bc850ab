//! `sfctl validate`

use std::path::Path;

use anyhow::Result;
use safeflow_config::load_description;
use tracing::info;

use crate::error::CliError;
use crate::output;

/// Load and validate a description, then print its summary.
pub fn execute(path: &Path, json: bool) -> Result<()> {
    let description = load_description(path).map_err(CliError::from)?;
    description.validate().map_err(CliError::from)?;
    info!(path = %path.display(), "description valid");

    output::print_summary(description.name.as_deref(), &description.summary(), json);
    Ok(())
}
