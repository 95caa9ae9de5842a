// ── Device domain types ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ieee::IeeeAddr;

/// A device as recorded in the settings registry.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEntry {
    pub id: IeeeAddr,
    pub friendly_name: String,
    /// Per-device option overrides (`retain`, `qos`, ...).
    pub options: Map<String, Value>,
}

impl DeviceEntry {
    /// Whether state messages for this device are published retained.
    pub fn retain(&self) -> bool {
        self.options
            .get("retain")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Zigbee logical device type, as reported by the network stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Coordinator,
    Router,
    EndDevice,
}

/// A device as known to the network stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDevice {
    pub ieee_addr: IeeeAddr,
    pub device_type: DeviceType,
    pub network_address: u16,
    pub manufacturer_id: Option<u16>,
    pub model_id: Option<String>,
    pub power_source: Option<String>,
    /// Marketing model resolved by the device-definition layer.
    pub model: Option<String>,
    /// Milliseconds since the epoch.
    pub last_seen: Option<i64>,
}

/// Compact projection published on `bridge/config/devices`.
///
/// The coordinator carries only its address and type; every other device
/// carries its friendly name and whatever the stack knows about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    #[serde(rename = "ieeeAddr")]
    pub ieee_addr: IeeeAddr,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(rename = "networkAddress", skip_serializing_if = "Option::is_none")]
    pub network_address: Option<u16>,
    #[serde(rename = "model", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "modelID", skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(rename = "manufacturerID", skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<u16>,
    #[serde(rename = "powerSource", skip_serializing_if = "Option::is_none")]
    pub power_source: Option<String>,
    #[serde(rename = "lastSeen", skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
}

impl DeviceSummary {
    /// Project a stack device, naming it from the registry when possible.
    pub fn project(device: &NetworkDevice, entry: Option<&DeviceEntry>) -> Self {
        if device.device_type == DeviceType::Coordinator {
            return Self {
                ieee_addr: device.ieee_addr.clone(),
                device_type: DeviceType::Coordinator,
                friendly_name: None,
                network_address: None,
                model: None,
                model_id: None,
                manufacturer_id: None,
                power_source: None,
                last_seen: None,
            };
        }

        let friendly_name = entry.map_or_else(
            || device.ieee_addr.to_string(),
            |e| e.friendly_name.clone(),
        );

        Self {
            ieee_addr: device.ieee_addr.clone(),
            device_type: device.device_type,
            friendly_name: Some(friendly_name),
            network_address: Some(device.network_address),
            model: device.model.clone(),
            model_id: device.model_id.clone(),
            manufacturer_id: device.manufacturer_id,
            power_source: device.power_source.clone(),
            last_seen: device.last_seen,
        }
    }
}

/// Coordinator firmware metadata for the startup summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub meta: Map<String, Value>,
}
