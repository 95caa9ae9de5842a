// ── Global runtime options ──

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::level_filters::LevelFilter;

/// Log verbosity accepted on `bridge/config/log_level`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// How (and whether) a `last_seen` attribute is attached to device state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
pub enum LastSeenMode {
    #[default]
    #[serde(rename = "disable")]
    #[strum(serialize = "disable")]
    Disable,
    #[serde(rename = "ISO_8601")]
    #[strum(serialize = "ISO_8601")]
    Iso8601,
    #[serde(rename = "ISO_8601_local")]
    #[strum(serialize = "ISO_8601_local")]
    Iso8601Local,
    #[serde(rename = "epoch")]
    #[strum(serialize = "epoch")]
    Epoch,
}

impl LastSeenMode {
    /// Render a timestamp in this mode. `None` when disabled.
    pub fn render(self, at: DateTime<Utc>) -> Option<serde_json::Value> {
        match self {
            Self::Disable => None,
            Self::Iso8601 => Some(at.to_rfc3339_opts(SecondsFormat::Millis, true).into()),
            Self::Iso8601Local => Some(
                at.with_timezone(&Local)
                    .to_rfc3339_opts(SecondsFormat::Millis, false)
                    .into(),
            ),
            Self::Epoch => Some(at.timestamp_millis().into()),
        }
    }
}

/// Snapshot of the independently settable global options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub log_level: LogLevel,
    pub elapsed: bool,
    pub last_seen: LastSeenMode,
    pub permit_join: bool,
}
