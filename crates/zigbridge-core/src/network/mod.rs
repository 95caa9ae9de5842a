// ── Network control facade ──
//
// Narrow async interface onto the Zigbee stack. Every call may fail; the
// command router branches on the `Result` and never lets a failure escape
// a handler.

mod memory;

use async_trait::async_trait;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::model::{CoordinatorInfo, GroupId, IeeeAddr, NetworkDevice};

pub use memory::{InMemoryNetwork, NetworkCall};

/// Operations of [`NetworkControl`], used for failure injection and call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum NetworkOperation {
    PermitJoin,
    SoftReset,
    CreateGroup,
    RemoveFromNetwork,
    Forget,
    ListDevices,
    Coordinator,
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("{operation} failed: {message}")]
    OperationFailed {
        operation: NetworkOperation,
        message: String,
    },

    #[error("Device {id} is not known to the network")]
    UnknownDevice { id: IeeeAddr },

    #[error("Network stack unavailable")]
    Unavailable,
}

#[async_trait]
pub trait NetworkControl: Send + Sync {
    async fn permit_join(&self, permit: bool) -> Result<(), NetworkError>;

    async fn soft_reset(&self) -> Result<(), NetworkError>;

    async fn create_group(&self, id: GroupId) -> Result<(), NetworkError>;

    /// Ask the device to leave and drop it from the stack.
    async fn remove_from_network(&self, id: &IeeeAddr) -> Result<(), NetworkError>;

    /// Drop the device from the stack's database without a leave request.
    async fn forget(&self, id: &IeeeAddr) -> Result<(), NetworkError>;

    /// All known devices, coordinator first.
    async fn list_devices(&self) -> Result<Vec<NetworkDevice>, NetworkError>;

    async fn coordinator(&self) -> Result<CoordinatorInfo, NetworkError>;
}
