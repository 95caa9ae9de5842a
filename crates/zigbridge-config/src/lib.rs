//! Process configuration for zigbridge.
//!
//! TOML file plus `ZIGBRIDGE_*` environment overrides, platform path
//! resolution, and translation to `zigbridge_core::BridgeConfig`. Bridge
//! state (devices, groups, options) lives in the settings document, not here.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use zigbridge_core::{BridgeConfig, BuildInfo, CoordinatorInfo, DEFAULT_BASE_TOPIC, IeeeAddr};

/// Prefix of environment overrides. Nested keys are separated by `__`,
/// e.g. `ZIGBRIDGE_MQTT__BASE_TOPIC`.
pub const ENV_PREFIX: &str = "ZIGBRIDGE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttSection,

    #[serde(default)]
    pub settings: SettingsSection,

    #[serde(default)]
    pub log: LogSection,

    #[serde(default)]
    pub coordinator: CoordinatorSection,

    #[serde(default)]
    pub bridge: BridgeSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MqttSection {
    /// First level of every bridge topic.
    #[serde(default = "default_base_topic")]
    pub base_topic: String,

    /// Broker URL. Informational until a broker client is wired in.
    pub server: Option<String>,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            base_topic: default_base_topic(),
            server: None,
        }
    }
}

fn default_base_topic() -> String {
    DEFAULT_BASE_TOPIC.into()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SettingsSection {
    /// Settings document path. Defaults to the platform data directory.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogSection {
    /// Directory of the log file. No file sink when unset.
    pub directory: Option<PathBuf>,

    #[serde(default = "default_log_file")]
    pub file_name: String,

    /// Format of the file sink.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: default_log_file(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_file() -> String {
    "zigbridge.log".into()
}

/// Identity of the coordinator, reported in the startup summary.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CoordinatorSection {
    #[serde(default = "default_coordinator_address")]
    pub ieee_address: String,

    /// Stack type, e.g. `zStack`.
    #[serde(default = "default_coordinator_kind")]
    pub kind: String,

    #[serde(default = "default_coordinator_version")]
    pub version: u64,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            ieee_address: default_coordinator_address(),
            kind: default_coordinator_kind(),
            version: default_coordinator_version(),
        }
    }
}

fn default_coordinator_address() -> String {
    "0x00124b00120144ae".into()
}
fn default_coordinator_kind() -> String {
    "zStack".into()
}
fn default_coordinator_version() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BridgeSection {
    /// Depth of the inbound command queue.
    #[serde(default = "default_queue_size")]
    pub command_queue_size: usize,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            command_queue_size: default_queue_size(),
        }
    }
}

fn default_queue_size() -> usize {
    64
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Runtime configuration for the bridge router.
    pub fn bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        let base_topic = self.mqtt.base_topic.trim_end_matches('/');
        if base_topic.is_empty() || base_topic.contains(['+', '#']) {
            return Err(ConfigError::Validation {
                field: "mqtt.base_topic".into(),
                reason: format!("'{}' is not a usable topic level", self.mqtt.base_topic),
            });
        }
        if self.bridge.command_queue_size == 0 {
            return Err(ConfigError::Validation {
                field: "bridge.command_queue_size".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(BridgeConfig {
            base_topic: base_topic.to_owned(),
            build: BuildInfo::current(),
            command_queue_size: self.bridge.command_queue_size,
        })
    }

    pub fn coordinator_address(&self) -> Result<IeeeAddr, ConfigError> {
        self.coordinator
            .ieee_address
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "coordinator.ieee_address".into(),
                reason: format!("'{}' is not an IEEE address", self.coordinator.ieee_address),
            })
    }

    pub fn coordinator_info(&self) -> CoordinatorInfo {
        zigbridge_core::InMemoryNetwork::coordinator_info(
            &self.coordinator.kind,
            self.coordinator.version,
        )
    }

    /// Settings document path, falling back to the platform default.
    pub fn settings_path(&self) -> PathBuf {
        self.settings
            .file
            .clone()
            .unwrap_or_else(default_settings_path)
    }

    /// Full path of the log file, if file logging is configured.
    pub fn log_file(&self) -> Option<PathBuf> {
        self.log
            .directory
            .as_ref()
            .map(|dir| dir.join(&self.log.file_name))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "zigbridge", "zigbridge")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the settings document.
pub fn default_settings_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("configuration.yaml"),
        |dirs| dirs.data_dir().join("configuration.yaml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("zigbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Provider chain: defaults, then the TOML file, then the environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load config from `path` (a missing file is not an error) and the
/// environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    Ok(figment(path).extract()?)
}

/// Load config from the canonical path and the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}
