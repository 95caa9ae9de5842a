// ── Live device state ──
//
// Last reported attributes per device, keyed by IEEE address. Not
// persisted; removing a device from the registry drops its entry here too.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::model::{GlobalOptions, IeeeAddr};

struct DeviceState {
    attributes: Map<String, Value>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct RuntimeState {
    devices: DashMap<IeeeAddr, DeviceState>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `update` into the device's state and return the payload to
    /// publish, stamped with `last_seen` / `elapsed` as configured.
    pub fn record(
        &self,
        id: &IeeeAddr,
        update: Map<String, Value>,
        options: &GlobalOptions,
        now: DateTime<Utc>,
    ) -> Map<String, Value> {
        let mut entry = self.devices.entry(id.clone()).or_insert_with(|| DeviceState {
            attributes: Map::new(),
            updated_at: now,
        });
        let previous = entry.updated_at;

        entry.attributes.extend(update);
        entry.updated_at = now;

        let mut payload = entry.attributes.clone();
        drop(entry);

        if let Some(stamp) = options.last_seen.render(now) {
            payload.insert("last_seen".into(), stamp);
        }
        if options.elapsed && previous < now {
            let millis = (now - previous).num_milliseconds();
            payload.insert("elapsed".into(), millis.into());
        }
        payload
    }

    /// Current attributes of a device, if any were reported.
    pub fn get(&self, id: &IeeeAddr) -> Option<Map<String, Value>> {
        self.devices.get(id).map(|s| s.attributes.clone())
    }

    pub fn remove(&self, id: &IeeeAddr) -> Option<Map<String, Value>> {
        self.devices.remove(id).map(|(_, s)| s.attributes)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
