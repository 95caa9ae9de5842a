// ── Domain model ──
//
// Canonical registry and network types shared by the store, the network
// facade and the command router.

mod device;
mod group;
mod ieee;
mod options;

pub use device::{CoordinatorInfo, DeviceEntry, DeviceSummary, DeviceType, NetworkDevice};
pub use group::{GroupEntry, GroupSummary};
pub use ieee::{GroupId, IeeeAddr};
pub use options::{GlobalOptions, LastSeenMode, LogLevel};

use crate::error::CoreError;

/// Check a proposed friendly name.
///
/// Names become topic levels, so MQTT wildcards are refused, and a trailing
/// `/<digits>` is reserved for endpoint addressing. Lookups accept either a
/// name or an IEEE address, so a name may not parse as an address.
pub fn validate_friendly_name(name: &str) -> Result<(), CoreError> {
    let invalid = |reason: &str| CoreError::InvalidName {
        name: name.to_owned(),
        reason: reason.to_owned(),
    };

    if name.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if IeeeAddr::looks_like(name) {
        return Err(invalid("must not be an IEEE address"));
    }
    if name.contains(['+', '#']) {
        return Err(invalid("must not contain MQTT wildcards"));
    }
    if let Some((_, last)) = name.rsplit_once('/') {
        if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("must not end with /<number>"));
        }
    }
    Ok(())
}
