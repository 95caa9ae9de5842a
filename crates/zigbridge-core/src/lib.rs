//! Command routing and state for a Zigbee-to-MQTT bridge.
//!
//! This crate owns everything between the message bus and the Zigbee
//! stack, without depending on either:
//!
//! - **[`Bridge`]**: Routes `<base>/bridge/config/*` messages to typed
//!   [`Command`]s and runs them one at a time, publishing log events and
//!   listings through a [`Publisher`]. [`start()`](Bridge::start) announces
//!   the bridge once and spawns the command processor.
//!
//! - **[`SettingsStore`]**: Persisted registry of devices, groups, the
//!   whitelist and global options. Copy-on-write YAML document with
//!   snapshot reads.
//!
//! - **[`NetworkControl`]**: Async facade onto the Zigbee stack.
//!   [`InMemoryNetwork`] is a deterministic implementation with call
//!   recording and failure injection.
//!
//! - **Domain model** ([`model`]): IEEE addresses, group ids, registry
//!   entries and the compact device/group projections published on the bus.

pub mod bridge;
pub mod bus;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod network;
pub mod startup;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, BridgeServices, Inbound, InboundEnvelope, Outcome};
pub use bus::{
    BusError, ChannelPublisher, DeliveryCallback, LogEvent, Outbound, Payload, PublishOptions,
    Publisher, QoS,
};
pub use command::{Command, CommandTopic, DeviceOptionsRequest, RemovalMode, RenameRequest};
pub use config::{BridgeConfig, BuildInfo, DEFAULT_BASE_TOPIC, Topics};
pub use error::CoreError;
pub use logging::{FixedLogLevel, LogControl, LogSink};
pub use network::{InMemoryNetwork, NetworkCall, NetworkControl, NetworkError, NetworkOperation};
pub use startup::StartupSummary;
pub use store::{RuntimeState, SettingsDocument, SettingsStore};

pub use model::{
    CoordinatorInfo, DeviceEntry, DeviceSummary, DeviceType, GlobalOptions, GroupEntry, GroupId,
    GroupSummary, IeeeAddr, LastSeenMode, LogLevel, NetworkDevice,
};
