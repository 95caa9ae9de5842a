//! Subcommand handlers.

pub mod config_cmd;
pub mod run;

use std::path::PathBuf;

use zigbridge_config::Config;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file selected by `--config`, or the platform default.
pub fn resolve_config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(zigbridge_config::config_path)
}

/// Load the resolved configuration. A missing file yields defaults.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = resolve_config_path(global);
    zigbridge_config::load_config_from(&path).map_err(|e| CliError::config(&path, e))
}
