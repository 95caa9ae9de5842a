// ── Core error types ──
//
// Errors raised by the settings store and by payload validation. The
// command router never lets these reach the bus; it folds them into an
// `Outcome` and logs them.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Registry errors ──────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Group not found: {identifier}")]
    GroupNotFound { identifier: String },

    #[error("Entity not found: {identifier}")]
    NotFound { identifier: String },

    #[error("Friendly name '{name}' is already in use")]
    NameTaken { name: String },

    #[error("Invalid friendly name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("No free group id left")]
    GroupIdsExhausted,

    // ── Payload errors ───────────────────────────────────────────────
    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Persistence errors ───────────────────────────────────────────
    #[error("Failed to read settings from {}: {source}", path.display())]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write settings to {}: {source}", path.display())]
    SettingsWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings document is invalid: {0}")]
    SettingsFormat(#[from] serde_yaml::Error),

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Bridge is not running")]
    BridgeStopped,
}
