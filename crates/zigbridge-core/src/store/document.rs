// ── Persisted settings document ──
//
// Serde shape of the YAML settings file. Sections the bridge does not
// manage (mqtt, serial, ...) are carried through untouched in `other`.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::{
    DeviceEntry, GlobalOptions, GroupEntry, GroupId, IeeeAddr, LastSeenMode, LogLevel,
    validate_friendly_name,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(default)]
    pub permit_join: bool,

    #[serde(default)]
    pub advanced: Advanced,

    #[serde(default)]
    pub whitelist: Vec<IeeeAddr>,

    #[serde(default)]
    pub devices: IndexMap<IeeeAddr, DeviceRecord>,

    #[serde(default)]
    pub groups: IndexMap<GroupId, GroupRecord>,

    #[serde(flatten)]
    pub other: IndexMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Advanced {
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub elapsed: bool,

    #[serde(default)]
    pub last_seen: LastSeenMode,

    #[serde(flatten)]
    pub other: IndexMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub friendly_name: String,

    #[serde(flatten)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub friendly_name: String,

    #[serde(default)]
    pub devices: Vec<String>,

    #[serde(default)]
    pub retain: bool,

    #[serde(default = "default_optimistic")]
    pub optimistic: bool,

    #[serde(flatten)]
    pub options: Map<String, Value>,
}

fn default_optimistic() -> bool {
    true
}

impl SettingsDocument {
    pub fn from_yaml(raw: &str) -> Result<Self, CoreError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let document: Self = serde_yaml::from_str(raw)?;
        document.check_names()?;
        Ok(document)
    }

    /// Every friendly name must be valid and unique across devices and
    /// groups. A device may carry its own address as its name.
    fn check_names(&self) -> Result<(), CoreError> {
        let mut seen = HashSet::new();

        for (id, device) in &self.devices {
            if device.friendly_name != id.as_str() {
                validate_friendly_name(&device.friendly_name)?;
            }
            if !seen.insert(device.friendly_name.as_str()) {
                return Err(CoreError::NameTaken {
                    name: device.friendly_name.clone(),
                });
            }
        }
        for group in self.groups.values() {
            validate_friendly_name(&group.friendly_name)?;
            if !seen.insert(group.friendly_name.as_str()) {
                return Err(CoreError::NameTaken {
                    name: group.friendly_name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, CoreError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn options(&self) -> GlobalOptions {
        GlobalOptions {
            log_level: self.advanced.log_level,
            elapsed: self.advanced.elapsed,
            last_seen: self.advanced.last_seen,
            permit_join: self.permit_join,
        }
    }

    // ── Lookups ──────────────────────────────────────────────────────

    /// Resolve a device by IEEE address or friendly name.
    pub fn find_device(&self, key: &str) -> Option<(&IeeeAddr, &DeviceRecord)> {
        if let Ok(addr) = key.parse::<IeeeAddr>() {
            if let Some(found) = self.devices.get_key_value(&addr) {
                return Some(found);
            }
        }
        self.devices.iter().find(|(_, d)| d.friendly_name == key)
    }

    /// Resolve a group by friendly name or numeric id.
    pub fn find_group(&self, key: &str) -> Option<(&GroupId, &GroupRecord)> {
        self.groups
            .iter()
            .find(|(_, g)| g.friendly_name == key)
            .or_else(|| {
                let id = key.parse::<GroupId>().ok()?;
                self.groups.get_key_value(&id)
            })
    }

    /// Whether any device or group already carries `name`.
    pub fn name_in_use(&self, name: &str) -> bool {
        self.devices.values().any(|d| d.friendly_name == name)
            || self.groups.values().any(|g| g.friendly_name == name)
    }

    /// Next group id: highest existing id + 1, or 1 for an empty registry.
    pub fn next_group_id(&self) -> Option<GroupId> {
        match self.groups.keys().max() {
            Some(max) => max.next(),
            None => Some(GroupId::FIRST),
        }
    }
}

impl DeviceRecord {
    pub(crate) fn to_entry(&self, id: &IeeeAddr) -> DeviceEntry {
        DeviceEntry {
            id: id.clone(),
            friendly_name: self.friendly_name.clone(),
            options: self.options.clone(),
        }
    }
}

impl GroupRecord {
    pub(crate) fn new(friendly_name: String) -> Self {
        Self {
            friendly_name,
            devices: Vec::new(),
            retain: false,
            optimistic: true,
            options: Map::new(),
        }
    }

    pub(crate) fn to_entry(&self, id: GroupId) -> GroupEntry {
        GroupEntry {
            id,
            friendly_name: self.friendly_name.clone(),
            devices: self.devices.clone(),
            retain: self.retain,
            optimistic: self.optimistic,
            options: self.options.clone(),
        }
    }
}
