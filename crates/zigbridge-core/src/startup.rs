// ── Startup summary ──

use serde::Serialize;

use crate::config::BuildInfo;
use crate::model::{CoordinatorInfo, GlobalOptions, LogLevel};

/// Retained message published once on `<base>/bridge/config`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartupSummary {
    pub version: String,
    pub commit: Option<String>,
    /// `null` when the coordinator could not be queried.
    pub coordinator: Option<CoordinatorInfo>,
    pub log_level: LogLevel,
    pub permit_join: bool,
}

impl StartupSummary {
    pub fn compose(
        build: &BuildInfo,
        coordinator: Option<CoordinatorInfo>,
        options: &GlobalOptions,
    ) -> Self {
        Self {
            version: build.version.clone(),
            commit: build.commit.clone(),
            coordinator,
            log_level: options.log_level,
            permit_join: options.permit_join,
        }
    }
}
