// ── Runtime bridge configuration ──
//
// What the bridge needs to know about itself: where its topics live and
// which build it is. The config crate constructs a `BridgeConfig` and
// hands it in; core never reads config files.

pub const DEFAULT_BASE_TOPIC: &str = "zigbee2mqtt";

/// Version metadata reported in the startup summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub commit: Option<String>,
}

impl BuildInfo {
    /// Build info of this crate, with the commit taken from
    /// `ZIGBRIDGE_COMMIT` at compile time when set.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_owned(),
            commit: option_env!("ZIGBRIDGE_COMMIT").map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// First topic level of every bridge topic.
    pub base_topic: String,
    pub build: BuildInfo,
    /// Depth of the inbound command queue.
    pub command_queue_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_topic: DEFAULT_BASE_TOPIC.into(),
            build: BuildInfo::current(),
            command_queue_size: 64,
        }
    }
}

/// Topic layout derived from the base topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
    command_prefix: String,
}

impl Topics {
    pub fn new(base_topic: &str) -> Self {
        let base = base_topic.trim_end_matches('/').to_owned();
        let command_prefix = format!("{base}/bridge/config/");
        Self {
            base,
            command_prefix,
        }
    }

    /// Prefix stripped from inbound command topics.
    pub fn command_prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Filter covering every command topic.
    pub fn command_filter(&self) -> String {
        format!("{}#", self.command_prefix)
    }

    /// Full topic of a command, e.g. `zigbee2mqtt/bridge/config/rename`.
    pub fn command(&self, path: &str) -> String {
        format!("{}{path}", self.command_prefix)
    }

    /// Retained startup summary.
    pub fn startup(&self) -> String {
        format!("{}/bridge/config", self.base)
    }

    pub fn log(&self) -> String {
        format!("{}/bridge/log", self.base)
    }

    pub fn device_list(&self) -> String {
        format!("{}/bridge/config/devices", self.base)
    }

    /// State topic of a device or group.
    pub fn entity(&self, friendly_name: &str) -> String {
        format!("{}/{friendly_name}", self.base)
    }
}
