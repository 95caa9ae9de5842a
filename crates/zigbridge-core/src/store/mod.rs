mod document;
mod runtime;
mod settings;

pub use document::{Advanced, DeviceRecord, GroupRecord, SettingsDocument};
pub use runtime::RuntimeState;
pub use settings::{Renamed, SettingsStore};
