// ── In-memory network ──
//
// Deterministic stand-in for a Zigbee stack: a device table, a record of
// every call, and one-shot failure injection per operation.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Map;
use tracing::debug;

use super::{NetworkControl, NetworkError, NetworkOperation};
use crate::model::{CoordinatorInfo, DeviceType, GroupId, IeeeAddr, NetworkDevice};

/// A call received by [`InMemoryNetwork`], with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCall {
    PermitJoin(bool),
    SoftReset,
    CreateGroup(GroupId),
    RemoveFromNetwork(IeeeAddr),
    Forget(IeeeAddr),
    ListDevices,
    Coordinator,
}

impl NetworkCall {
    pub fn operation(&self) -> NetworkOperation {
        match self {
            Self::PermitJoin(_) => NetworkOperation::PermitJoin,
            Self::SoftReset => NetworkOperation::SoftReset,
            Self::CreateGroup(_) => NetworkOperation::CreateGroup,
            Self::RemoveFromNetwork(_) => NetworkOperation::RemoveFromNetwork,
            Self::Forget(_) => NetworkOperation::Forget,
            Self::ListDevices => NetworkOperation::ListDevices,
            Self::Coordinator => NetworkOperation::Coordinator,
        }
    }
}

pub struct InMemoryNetwork {
    coordinator: CoordinatorInfo,
    devices: Mutex<Vec<NetworkDevice>>,
    groups: Mutex<BTreeSet<GroupId>>,
    permit_join: AtomicBool,
    pending_failures: Mutex<Vec<NetworkOperation>>,
    calls: Mutex<Vec<NetworkCall>>,
}

impl InMemoryNetwork {
    /// A network holding only its coordinator.
    pub fn new(coordinator_addr: IeeeAddr, coordinator: CoordinatorInfo) -> Self {
        let node = NetworkDevice {
            ieee_addr: coordinator_addr,
            device_type: DeviceType::Coordinator,
            network_address: 0,
            manufacturer_id: None,
            model_id: None,
            power_source: None,
            model: None,
            last_seen: None,
        };

        Self {
            coordinator,
            devices: Mutex::new(vec![node]),
            groups: Mutex::new(BTreeSet::new()),
            permit_join: AtomicBool::new(false),
            pending_failures: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Coordinator metadata with a single `version` field.
    pub fn coordinator_info(kind: &str, version: u64) -> CoordinatorInfo {
        let mut meta = Map::new();
        meta.insert("version".into(), version.into());
        CoordinatorInfo {
            kind: kind.to_owned(),
            meta,
        }
    }

    /// Add (or replace) a device in the table.
    pub fn add_device(&self, device: NetworkDevice) {
        let mut devices = lock(&self.devices);
        devices.retain(|d| d.ieee_addr != device.ieee_addr);
        devices.push(device);
    }

    pub fn has_device(&self, id: &IeeeAddr) -> bool {
        lock(&self.devices).iter().any(|d| &d.ieee_addr == id)
    }

    /// Make the next call of `operation` fail.
    pub fn fail_next(&self, operation: NetworkOperation) {
        lock(&self.pending_failures).push(operation);
    }

    pub fn calls(&self) -> Vec<NetworkCall> {
        lock(&self.calls).clone()
    }

    /// Calls of a single operation, in order.
    pub fn calls_of(&self, operation: NetworkOperation) -> Vec<NetworkCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation() == operation)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn permit_join_enabled(&self) -> bool {
        self.permit_join.load(Ordering::SeqCst)
    }

    pub fn groups(&self) -> Vec<GroupId> {
        lock(&self.groups).iter().copied().collect()
    }

    /// Log the call and consume a pending failure for its operation.
    fn enter(&self, call: NetworkCall) -> Result<(), NetworkError> {
        let operation = call.operation();
        debug!(?call, "network call");
        lock(&self.calls).push(call);

        let mut pending = lock(&self.pending_failures);
        if let Some(pos) = pending.iter().position(|op| *op == operation) {
            pending.remove(pos);
            return Err(NetworkError::OperationFailed {
                operation,
                message: "injected failure".into(),
            });
        }
        Ok(())
    }

    fn drop_device(&self, id: &IeeeAddr) -> Result<(), NetworkError> {
        let mut devices = lock(&self.devices);
        let before = devices.len();
        devices.retain(|d| &d.ieee_addr != id || d.device_type == DeviceType::Coordinator);
        if devices.len() == before {
            return Err(NetworkError::UnknownDevice { id: id.clone() });
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkControl for InMemoryNetwork {
    async fn permit_join(&self, permit: bool) -> Result<(), NetworkError> {
        self.enter(NetworkCall::PermitJoin(permit))?;
        self.permit_join.store(permit, Ordering::SeqCst);
        Ok(())
    }

    async fn soft_reset(&self) -> Result<(), NetworkError> {
        self.enter(NetworkCall::SoftReset)
    }

    async fn create_group(&self, id: GroupId) -> Result<(), NetworkError> {
        self.enter(NetworkCall::CreateGroup(id))?;
        lock(&self.groups).insert(id);
        Ok(())
    }

    async fn remove_from_network(&self, id: &IeeeAddr) -> Result<(), NetworkError> {
        self.enter(NetworkCall::RemoveFromNetwork(id.clone()))?;
        self.drop_device(id)
    }

    async fn forget(&self, id: &IeeeAddr) -> Result<(), NetworkError> {
        self.enter(NetworkCall::Forget(id.clone()))?;
        self.drop_device(id)
    }

    async fn list_devices(&self) -> Result<Vec<NetworkDevice>, NetworkError> {
        self.enter(NetworkCall::ListDevices)?;
        Ok(lock(&self.devices).clone())
    }

    async fn coordinator(&self) -> Result<CoordinatorInfo, NetworkError> {
        self.enter(NetworkCall::Coordinator)?;
        Ok(self.coordinator.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
