// ── JSON command payloads ──

use serde::Deserialize;
use serde_json::{Map, Value};

/// Payload of `bridge/config/device_options`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceOptionsRequest {
    pub friendly_name: String,
    pub options: Map<String, Value>,
}

/// Payload of `bridge/config/rename`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenameRequest {
    pub old: String,
    pub new: String,
}
