//! CLI error types with miette diagnostics.

use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;

use zigbridge_config::ConfigError;
use zigbridge_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const SETTINGS: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Could not load configuration from {path}")]
    #[diagnostic(
        code(zigbridge::config),
        help(
            "Fix the file or the ZIGBRIDGE_* environment overrides.\n\
             Inspect the resolved values with: zigbridge config show"
        )
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(zigbridge::validation))]
    Validation { field: String, reason: String },

    // ── Settings document ────────────────────────────────────────────
    #[error("Could not open settings document {path}")]
    #[diagnostic(
        code(zigbridge::settings),
        help("Check that the file is valid YAML, or pass another one with --settings.")
    )]
    Settings {
        path: String,
        #[source]
        source: CoreError,
    },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Logging setup failed: {reason}")]
    #[diagnostic(code(zigbridge::logging))]
    Logging { reason: String },

    #[error(transparent)]
    #[diagnostic(code(zigbridge::bridge))]
    Core(#[from] CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Settings { .. } => exit_code::SETTINGS,
            Self::Logging { .. } | Self::Core(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

impl CliError {
    /// Attribute a config error to the file it was loaded from.
    pub fn config(path: &Path, err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config {
                path: path.display().to_string(),
                source: other,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::config(&zigbridge_config::config_path(), err)
    }
}
