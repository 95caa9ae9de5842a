// ── Core identity types ──
//
// IeeeAddr and GroupId identify every registry entry. Friendly names are
// mutable labels on top of them; these never change for an entry's lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ── IeeeAddr ────────────────────────────────────────────────────────

/// 64-bit IEEE address of a Zigbee device, normalized to `0x` + 16
/// lowercase hex digits (`0x000b57fffec6a5b3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IeeeAddr(String);

impl IeeeAddr {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `raw` looks like an IEEE address rather than a friendly name.
    pub fn looks_like(raw: &str) -> bool {
        raw.parse::<Self>().is_ok()
    }
}

impl fmt::Display for IeeeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IeeeAddr {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let digits = lowered.strip_prefix("0x").unwrap_or(&lowered);

        if digits.len() != 16 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CoreError::ValidationFailed {
                message: format!("'{s}' is not an IEEE address"),
            });
        }

        Ok(Self(format!("0x{digits}")))
    }
}

impl TryFrom<String> for IeeeAddr {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IeeeAddr> for String {
    fn from(addr: IeeeAddr) -> Self {
        addr.0
    }
}

// ── GroupId ─────────────────────────────────────────────────────────

/// Numeric Zigbee group id. Allocated as `max + 1`, starting at 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupId(pub u16);

impl GroupId {
    pub const FIRST: Self = Self(1);

    /// The id following this one, or `None` once the id space is exhausted.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}
