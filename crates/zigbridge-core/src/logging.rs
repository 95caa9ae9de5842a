// ── Log level control ──
//
// The router changes log verbosity at runtime; the process owning the
// tracing subscriber decides how.

use strum::{Display, EnumIter};

use crate::model::LogLevel;

/// Destinations whose verbosity `bridge/config/log_level` adjusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum LogSink {
    Console,
    File,
}

pub trait LogControl: Send + Sync {
    fn set_level(&self, sink: LogSink, level: LogLevel);
}

/// For embedders that do not reconfigure logging.
#[derive(Debug, Default)]
pub struct FixedLogLevel;

impl LogControl for FixedLogLevel {
    fn set_level(&self, sink: LogSink, level: LogLevel) {
        tracing::debug!(%sink, %level, "log level change ignored");
    }
}
