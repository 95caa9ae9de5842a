//! Tracing setup with runtime-adjustable sinks.
//!
//! Console output goes to stderr (stdout carries the bus). The optional
//! file sink writes through a non-blocking appender. Each sink sits behind
//! its own reloadable level filter so `bridge/config/log_level` can change
//! it while running.

use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

use zigbridge_config::LogFormat;
use zigbridge_core::{LogControl, LogLevel, LogSink};

use crate::error::CliError;

type Reloader = Box<dyn Fn(LevelFilter) -> Result<(), reload::Error> + Send + Sync>;

/// Reload handles of the installed sinks.
pub struct TracingLogControl {
    console: Reloader,
    file: Option<Reloader>,
}

impl LogControl for TracingLogControl {
    fn set_level(&self, sink: LogSink, level: LogLevel) {
        let reloader = match sink {
            LogSink::Console => Some(&self.console),
            LogSink::File => self.file.as_ref(),
        };
        let Some(reload) = reloader else {
            return;
        };
        if let Err(e) = reload(LevelFilter::from(level)) {
            tracing::warn!(%sink, error = %e, "failed to change log level");
        }
    }
}

/// Keeps the file writer alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Console verbosity: `-v` flags win over the persisted level.
fn console_level(level: LogLevel, verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::from(level),
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber.
pub fn init_tracing(
    level: LogLevel,
    verbosity: u8,
    log_file: Option<&Path>,
    format: LogFormat,
) -> Result<(TracingLogControl, LoggingGuard), CliError> {
    let (console_filter, console_handle) = reload::Layer::new(console_level(level, verbosity));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let mut file_guard = None;
    let mut file_reloader: Option<Reloader> = None;
    let file_layer = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = path.file_name().ok_or_else(|| CliError::Logging {
                reason: format!("{} has no file name", path.display()),
            })?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);

            let (file_filter, file_handle) = reload::Layer::new(LevelFilter::from(level));
            let reloader: Reloader = Box::new(move |filter| file_handle.reload(filter));
            file_reloader = Some(reloader);

            let layer = match format {
                LogFormat::Text => fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(file_filter)
                    .boxed(),
                LogFormat::Json => fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            };
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().ok())
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Logging {
            reason: e.to_string(),
        })?;

    let control = TracingLogControl {
        console: Box::new(move |filter| console_handle.reload(filter)),
        file: file_reloader,
    };
    Ok((control, LoggingGuard { _file: file_guard }))
}
