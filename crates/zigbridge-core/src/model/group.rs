// ── Group domain types ──

use serde::Serialize;
use serde_json::{Map, Value};

use super::ieee::GroupId;

/// A group as recorded in the settings registry.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupEntry {
    pub id: GroupId,
    pub friendly_name: String,
    /// Member device references (friendly names or IEEE addresses), in order.
    pub devices: Vec<String>,
    pub retain: bool,
    pub optimistic: bool,
    pub options: Map<String, Value>,
}

/// One element of the `groups` log event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    #[serde(rename = "ID")]
    pub id: GroupId,
    pub friendly_name: String,
    pub retain: bool,
    pub devices: Vec<String>,
    pub optimistic: bool,
}

impl From<&GroupEntry> for GroupSummary {
    fn from(group: &GroupEntry) -> Self {
        Self {
            id: group.id,
            friendly_name: group.friendly_name.clone(),
            retain: group.retain,
            devices: group.devices.clone(),
            optimistic: group.optimistic,
        }
    }
}
