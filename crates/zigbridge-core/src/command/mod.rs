// ── Command API ──
//
// Inbound bridge commands. The topic suffix selects a `CommandTopic`; the
// payload is then parsed into a typed `Command`. Anything that does not
// resolve to a `CommandTopic` is ignored by the router.

pub mod requests;

use serde::de::DeserializeOwned;
use strum::{Display, EnumIter, EnumString};

use crate::error::CoreError;
use crate::model::{LastSeenMode, LogLevel};

pub use requests::{DeviceOptionsRequest, RenameRequest};

/// Every command topic below `<base>/bridge/config/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum CommandTopic {
    Elapsed,
    Whitelist,
    DeviceOptions,
    PermitJoin,
    Reset,
    LastSeen,
    LogLevel,
    #[strum(serialize = "devices/get")]
    DevicesGet,
    Groups,
    Rename,
    AddGroup,
    RemoveGroup,
    Remove,
    Ban,
    ForceRemove,
}

impl CommandTopic {
    /// Resolve a command path (the topic with the bridge prefix removed).
    ///
    /// Exact names match first; `devices/<action>` resolves to the device
    /// list request whatever the action. The bare `devices` level is where
    /// the list is published, so it is not a command.
    pub fn resolve(path: &str) -> Option<Self> {
        if let Ok(topic) = path.parse() {
            return Some(topic);
        }
        match path.split_once('/') {
            Some(("devices", action)) if !action.is_empty() => Some(Self::DevicesGet),
            _ => None,
        }
    }
}

/// How a device leaves the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    Remove,
    /// Currently identical to `Remove`: the device is not put on any
    /// exclusion list.
    Ban,
    /// Drop from the stack's database without a leave request.
    Force,
}

impl RemovalMode {
    /// `type` of the log event published on success.
    pub fn event_type(self) -> &'static str {
        match self {
            Self::Remove => "device_removed",
            Self::Ban => "device_banned",
            Self::Force => "device_force_removed",
        }
    }
}

/// A validated bridge command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetElapsed(bool),
    Whitelist { friendly_name: String },
    DeviceOptions(DeviceOptionsRequest),
    PermitJoin(bool),
    SoftReset,
    SetLastSeen(LastSeenMode),
    SetLogLevel(LogLevel),
    ListDevices,
    ListGroups,
    Rename(RenameRequest),
    AddGroup { friendly_name: String },
    RemoveGroup { friendly_name: String },
    RemoveDevice {
        friendly_name: String,
        mode: RemovalMode,
    },
}

impl Command {
    /// Parse the payload for `topic`.
    pub fn parse(topic: CommandTopic, payload: &[u8]) -> Result<Self, CoreError> {
        let command = match topic {
            CommandTopic::Elapsed => Self::SetElapsed(is_true(payload)),
            CommandTopic::PermitJoin => Self::PermitJoin(is_true(payload)),
            CommandTopic::Reset => Self::SoftReset,
            CommandTopic::DevicesGet => Self::ListDevices,
            CommandTopic::Groups => Self::ListGroups,
            CommandTopic::Whitelist => Self::Whitelist {
                friendly_name: name(payload)?,
            },
            CommandTopic::DeviceOptions => Self::DeviceOptions(json(payload)?),
            CommandTopic::Rename => Self::Rename(json(payload)?),
            CommandTopic::LastSeen => Self::SetLastSeen(literal(payload)?),
            CommandTopic::LogLevel => Self::SetLogLevel(literal(payload)?),
            CommandTopic::AddGroup => Self::AddGroup {
                friendly_name: name(payload)?,
            },
            CommandTopic::RemoveGroup => Self::RemoveGroup {
                friendly_name: name(payload)?,
            },
            CommandTopic::Remove => removal(payload, RemovalMode::Remove)?,
            CommandTopic::Ban => removal(payload, RemovalMode::Ban)?,
            CommandTopic::ForceRemove => removal(payload, RemovalMode::Force)?,
        };
        Ok(command)
    }
}

// ── Payload helpers ──────────────────────────────────────────────────

/// Only the exact literal `true` is true.
fn is_true(payload: &[u8]) -> bool {
    payload == b"true"
}

fn text(payload: &[u8]) -> Result<&str, CoreError> {
    std::str::from_utf8(payload).map_err(|e| CoreError::MalformedPayload {
        message: e.to_string(),
    })
}

fn name(payload: &[u8]) -> Result<String, CoreError> {
    let name = text(payload)?;
    if name.is_empty() {
        return Err(CoreError::MalformedPayload {
            message: "expected a friendly name".into(),
        });
    }
    Ok(name.to_owned())
}

fn json<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CoreError> {
    serde_json::from_slice(payload).map_err(|e| CoreError::MalformedPayload {
        message: e.to_string(),
    })
}

fn literal<T: std::str::FromStr>(payload: &[u8]) -> Result<T, CoreError> {
    let raw = text(payload)?;
    raw.parse().map_err(|_| CoreError::ValidationFailed {
        message: format!("unsupported value '{raw}'"),
    })
}

fn removal(payload: &[u8], mode: RemovalMode) -> Result<Command, CoreError> {
    Ok(Command::RemoveDevice {
        friendly_name: name(payload)?,
        mode,
    })
}
