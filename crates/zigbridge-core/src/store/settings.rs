// ── Settings store ──
//
// Single owner of persisted bridge state. Reads are wait-free snapshots
// through `ArcSwap`; writes are serialized by `writer`, applied to a copy,
// persisted, and only then published to readers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::document::{DeviceRecord, GroupRecord, SettingsDocument};
use crate::error::CoreError;
use crate::model::{
    DeviceEntry, GlobalOptions, GroupEntry, IeeeAddr, LastSeenMode, LogLevel,
    validate_friendly_name,
};

/// Option keys that cannot be set through `device_options`.
const RESERVED_OPTION_KEYS: &[&str] = &["friendly_name", "ID"];

enum Backend {
    Memory,
    File(PathBuf),
}

/// Result of a successful rename.
#[derive(Debug, Clone, PartialEq)]
pub enum Renamed {
    Device(DeviceEntry),
    Group(GroupEntry),
}

pub struct SettingsStore {
    current: ArcSwap<SettingsDocument>,
    writer: Mutex<()>,
    backend: Backend,
}

impl SettingsStore {
    /// A store that never touches disk.
    pub fn in_memory(document: SettingsDocument) -> Self {
        Self {
            current: ArcSwap::from_pointee(document),
            writer: Mutex::new(()),
            backend: Backend::Memory,
        }
    }

    /// Open a file-backed store. A missing file starts from defaults and is
    /// created on the first change.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        let document = match std::fs::read_to_string(&path) {
            Ok(raw) => SettingsDocument::from_yaml(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "settings file missing, starting from defaults");
                SettingsDocument::default()
            }
            Err(source) => return Err(CoreError::SettingsRead { path, source }),
        };

        Ok(Self {
            current: ArcSwap::from_pointee(document),
            writer: Mutex::new(()),
            backend: Backend::File(path),
        })
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Memory => None,
            Backend::File(path) => Some(path),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<SettingsDocument> {
        self.current.load_full()
    }

    pub fn options(&self) -> GlobalOptions {
        self.current.load().options()
    }

    /// Look up a device by friendly name or IEEE address.
    pub fn device(&self, key: &str) -> Option<DeviceEntry> {
        let doc = self.current.load();
        doc.find_device(key).map(|(id, record)| record.to_entry(id))
    }

    pub fn devices(&self) -> Vec<DeviceEntry> {
        let doc = self.current.load();
        doc.devices
            .iter()
            .map(|(id, record)| record.to_entry(id))
            .collect()
    }

    /// Look up a group by friendly name or numeric id.
    pub fn group(&self, key: &str) -> Option<GroupEntry> {
        let doc = self.current.load();
        doc.find_group(key).map(|(id, record)| record.to_entry(*id))
    }

    pub fn groups(&self) -> Vec<GroupEntry> {
        let doc = self.current.load();
        doc.groups
            .iter()
            .map(|(id, record)| record.to_entry(*id))
            .collect()
    }

    pub fn whitelist(&self) -> Vec<IeeeAddr> {
        self.current.load().whitelist.clone()
    }

    /// A device may stay on the network when no whitelist is configured or
    /// when it is on the whitelist.
    pub fn is_admitted(&self, id: &IeeeAddr) -> bool {
        let doc = self.current.load();
        doc.whitelist.is_empty() || doc.whitelist.contains(id)
    }

    // ── Global options ───────────────────────────────────────────────

    pub fn set_elapsed(&self, elapsed: bool) -> Result<(), CoreError> {
        self.commit(|doc| {
            doc.advanced.elapsed = elapsed;
            Ok(())
        })
    }

    pub fn set_last_seen(&self, mode: LastSeenMode) -> Result<(), CoreError> {
        self.commit(|doc| {
            doc.advanced.last_seen = mode;
            Ok(())
        })
    }

    pub fn set_log_level(&self, level: LogLevel) -> Result<(), CoreError> {
        self.commit(|doc| {
            doc.advanced.log_level = level;
            Ok(())
        })
    }

    pub fn set_permit_join(&self, permit: bool) -> Result<(), CoreError> {
        self.commit(|doc| {
            doc.permit_join = permit;
            Ok(())
        })
    }

    // ── Whitelist ────────────────────────────────────────────────────

    /// Add a device to the whitelist. Returns `false` when it was already there.
    pub fn whitelist_add(&self, id: &IeeeAddr) -> Result<bool, CoreError> {
        self.commit(|doc| {
            if doc.whitelist.contains(id) {
                return Ok(false);
            }
            doc.whitelist.push(id.clone());
            Ok(true)
        })
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// Register a device seen on the network, named after its address.
    /// Existing entries are returned unchanged.
    pub fn ensure_device(&self, id: &IeeeAddr) -> Result<DeviceEntry, CoreError> {
        self.commit(|doc| {
            if let Some(record) = doc.devices.get(id) {
                return Ok(record.to_entry(id));
            }
            if doc.name_in_use(id.as_str()) {
                return Err(CoreError::NameTaken {
                    name: id.to_string(),
                });
            }
            let record = DeviceRecord {
                friendly_name: id.to_string(),
                options: Map::new(),
            };
            let entry = record.to_entry(id);
            doc.devices.insert(id.clone(), record);
            Ok(entry)
        })
    }

    /// Merge option overrides into a device entry.
    pub fn merge_device_options(
        &self,
        key: &str,
        options: Map<String, Value>,
    ) -> Result<DeviceEntry, CoreError> {
        self.commit(|doc| {
            let id = doc
                .find_device(key)
                .map(|(id, _)| id.clone())
                .ok_or_else(|| CoreError::DeviceNotFound {
                    identifier: key.to_owned(),
                })?;
            let Some(record) = doc.devices.get_mut(&id) else {
                return Err(CoreError::DeviceNotFound {
                    identifier: key.to_owned(),
                });
            };

            for (name, value) in options {
                if RESERVED_OPTION_KEYS.contains(&name.as_str()) {
                    warn!(device = %id, option = %name, "ignoring reserved device option");
                    continue;
                }
                record.options.insert(name, value);
            }
            Ok(record.to_entry(&id))
        })
    }

    /// Remove a device entry and drop it from every group's member list.
    /// Returns `None` when no such device exists.
    pub fn remove_device(&self, key: &str) -> Result<Option<DeviceEntry>, CoreError> {
        self.commit(|doc| {
            let Some(id) = doc.find_device(key).map(|(id, _)| id.clone()) else {
                return Ok(None);
            };
            let Some(record) = doc.devices.shift_remove(&id) else {
                return Ok(None);
            };

            for group in doc.groups.values_mut() {
                group
                    .devices
                    .retain(|member| member != &record.friendly_name && member != id.as_str());
            }
            Ok(Some(record.to_entry(&id)))
        })
    }

    // ── Groups ───────────────────────────────────────────────────────

    /// Create a group with the next free id.
    pub fn add_group(&self, name: &str) -> Result<GroupEntry, CoreError> {
        validate_friendly_name(name)?;
        self.commit(|doc| {
            if doc.name_in_use(name) {
                return Err(CoreError::NameTaken {
                    name: name.to_owned(),
                });
            }
            let id = doc.next_group_id().ok_or(CoreError::GroupIdsExhausted)?;
            let record = GroupRecord::new(name.to_owned());
            let entry = record.to_entry(id);
            doc.groups.insert(id, record);
            Ok(entry)
        })
    }

    /// Remove a group entry. Returns `None` when no such group exists.
    pub fn remove_group(&self, key: &str) -> Result<Option<GroupEntry>, CoreError> {
        self.commit(|doc| {
            let Some(id) = doc.find_group(key).map(|(id, _)| *id) else {
                return Ok(None);
            };
            Ok(doc.groups.shift_remove(&id).map(|record| record.to_entry(id)))
        })
    }

    // ── Rename ───────────────────────────────────────────────────────

    /// Rename a device or group in place. Devices are matched before groups.
    pub fn rename(&self, old: &str, new: &str) -> Result<Renamed, CoreError> {
        validate_friendly_name(new)?;
        self.commit(|doc| {
            if let Some(id) = doc.find_device(old).map(|(id, _)| id.clone()) {
                let current = doc.devices[&id].friendly_name.clone();
                if current != new && doc.name_in_use(new) {
                    return Err(CoreError::NameTaken {
                        name: new.to_owned(),
                    });
                }
                for group in doc.groups.values_mut() {
                    for member in &mut group.devices {
                        if *member == current {
                            new.clone_into(member);
                        }
                    }
                }
                let Some(record) = doc.devices.get_mut(&id) else {
                    return Err(CoreError::DeviceNotFound {
                        identifier: old.to_owned(),
                    });
                };
                new.clone_into(&mut record.friendly_name);
                return Ok(Renamed::Device(record.to_entry(&id)));
            }

            if let Some(id) = doc.find_group(old).map(|(id, _)| *id) {
                let taken = doc
                    .groups
                    .get(&id)
                    .is_some_and(|g| g.friendly_name != new && doc.name_in_use(new));
                if taken {
                    return Err(CoreError::NameTaken {
                        name: new.to_owned(),
                    });
                }
                let Some(record) = doc.groups.get_mut(&id) else {
                    return Err(CoreError::GroupNotFound {
                        identifier: old.to_owned(),
                    });
                };
                new.clone_into(&mut record.friendly_name);
                return Ok(Renamed::Group(record.to_entry(id)));
            }

            Err(CoreError::NotFound {
                identifier: old.to_owned(),
            })
        })
    }

    // ── Commit machinery ─────────────────────────────────────────────

    /// Apply `change` to a copy of the document and commit it.
    ///
    /// Nothing is committed when `change` fails or persisting fails. An
    /// unchanged document is not rewritten.
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut SettingsDocument) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let before = self.current.load_full();
        let mut next = SettingsDocument::clone(&before);
        let value = change(&mut next)?;

        if next == *before {
            return Ok(value);
        }

        self.persist(&next)?;
        self.current.store(Arc::new(next));
        Ok(value)
    }

    fn persist(&self, doc: &SettingsDocument) -> Result<(), CoreError> {
        let Backend::File(path) = &self.backend else {
            return Ok(());
        };

        let yaml = doc.to_yaml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CoreError::SettingsWrite {
                path: path.clone(),
                source,
            })?;
        }
        std::fs::write(path, yaml).map_err(|source| CoreError::SettingsWrite {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "settings persisted");
        Ok(())
    }
}
