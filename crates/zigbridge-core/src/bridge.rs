// ── Bridge router ──
//
// Owns the command channel, the startup announcement, and the handlers
// that turn inbound `bridge/config/*` messages into store mutations,
// network calls, and outbound messages.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value, json};
use strum::IntoEnumIterator;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{LogEvent, Outbound, PublishOptions, Publisher, log_delivery_failure};
use crate::command::{Command, CommandTopic, RemovalMode};
use crate::config::{BridgeConfig, Topics};
use crate::error::CoreError;
use crate::logging::{LogControl, LogSink};
use crate::model::{DeviceSummary, GroupSummary, IeeeAddr};
use crate::network::{NetworkControl, NetworkError};
use crate::startup::StartupSummary;
use crate::store::{Renamed, RuntimeState, SettingsStore};

// ── Inbound messages ─────────────────────────────────────────────

/// A message received on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Inbound {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Inbound message plus an optional reply slot for its outcome.
pub struct InboundEnvelope {
    pub message: Inbound,
    pub response_tx: Option<oneshot::Sender<Outcome>>,
}

/// How a message was handled. Never published; returned to the caller
/// and logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Not a bridge command. Nothing happened.
    Unrecognized,
    /// Malformed payload or a request that cannot apply to current state.
    Rejected(String),
    /// The network or the settings file failed.
    Failed(String),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

// ── Handler errors ───────────────────────────────────────────────

#[derive(Debug, Error)]
enum HandlerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl HandlerError {
    fn into_outcome(self) -> Outcome {
        let downstream = match &self {
            Self::Core(e) => matches!(
                e,
                CoreError::SettingsRead { .. }
                    | CoreError::SettingsWrite { .. }
                    | CoreError::SettingsFormat(_)
                    | CoreError::BridgeStopped
            ),
            Self::Network(_) | Self::Encode(_) => true,
        };

        if downstream {
            Outcome::Failed(self.to_string())
        } else {
            Outcome::Rejected(self.to_string())
        }
    }
}

// ── Bridge ───────────────────────────────────────────────────────

/// Collaborators handed to the bridge at construction.
pub struct BridgeServices {
    pub store: Arc<SettingsStore>,
    pub network: Arc<dyn NetworkControl>,
    pub publisher: Arc<dyn Publisher>,
    pub log_control: Arc<dyn LogControl>,
}

/// Command router for one bridge instance.
///
/// Cheaply cloneable. Messages may be handled directly with
/// [`handle()`](Self::handle) or queued with [`submit()`](Self::submit) /
/// [`execute()`](Self::execute) once [`start()`](Self::start) has spawned
/// the processor task. Either way handlers run one at a time, each to
/// completion.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    topics: Topics,
    store: Arc<SettingsStore>,
    runtime: RuntimeState,
    network: Arc<dyn NetworkControl>,
    publisher: Arc<dyn Publisher>,
    log_control: Arc<dyn LogControl>,
    /// Held for the duration of one handler.
    dispatch: Mutex<()>,
    inbound_tx: mpsc::Sender<InboundEnvelope>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundEnvelope>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    announced: AtomicBool,
    running: AtomicBool,
}

impl Bridge {
    pub fn new(config: BridgeConfig, services: BridgeServices) -> Self {
        let topics = Topics::new(&config.base_topic);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.command_queue_size.max(1));

        Self {
            inner: Arc::new(BridgeInner {
                config,
                topics,
                store: services.store,
                runtime: RuntimeState::new(),
                network: services.network,
                publisher: services.publisher,
                log_control: services.log_control,
                dispatch: Mutex::new(()),
                inbound_tx,
                inbound_rx: Mutex::new(Some(inbound_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                announced: AtomicBool::new(false),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn topics(&self) -> &Topics {
        &self.inner.topics
    }

    pub fn store(&self) -> &Arc<SettingsStore> {
        &self.inner.store
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.inner.runtime
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Publish the startup summary (first call only) and spawn the
    /// command processor.
    pub async fn start(&self) {
        if !self.inner.announced.swap(true, Ordering::SeqCst) {
            self.announce().await;
        }

        let Some(rx) = self.inner.inbound_rx.lock().await.take() else {
            debug!("command processor already running");
            return;
        };
        self.inner.running.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(inbound_processor_task(
            self.clone(),
            rx,
            self.inner.cancel.clone(),
        ));
        self.inner.task_handles.lock().await.push(handle);
        info!(
            base_topic = %self.inner.config.base_topic,
            subscription = %self.inner.topics.command_filter(),
            "bridge started"
        );
    }

    /// Stop the processor between commands and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("bridge stopped");
    }

    async fn announce(&self) {
        let coordinator = match self.inner.network.coordinator().await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, "coordinator metadata unavailable");
                None
            }
        };
        let summary = StartupSummary::compose(
            &self.inner.config.build,
            coordinator,
            &self.inner.store.options(),
        );

        match Outbound::json(self.inner.topics.startup(), &summary, PublishOptions::RETAINED) {
            Ok(message) => self.publish(message),
            Err(e) => error!(error = %e, "failed to encode startup summary"),
        }
    }

    // ── Queued execution ─────────────────────────────────────────

    /// Queue a message without waiting for its outcome.
    pub async fn submit(&self, message: Inbound) -> Result<(), CoreError> {
        self.enqueue(InboundEnvelope {
            message,
            response_tx: None,
        })
        .await
    }

    /// Queue a message and wait for its outcome.
    pub async fn execute(&self, message: Inbound) -> Result<Outcome, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(InboundEnvelope {
            message,
            response_tx: Some(tx),
        })
        .await?;
        rx.await.map_err(|_| CoreError::BridgeStopped)
    }

    async fn enqueue(&self, envelope: InboundEnvelope) -> Result<(), CoreError> {
        if !self.inner.running.load(Ordering::SeqCst) {
            return Err(CoreError::BridgeStopped);
        }
        self.inner
            .inbound_tx
            .send(envelope)
            .await
            .map_err(|_| CoreError::BridgeStopped)
    }

    // ── Direct handling ──────────────────────────────────────────

    /// Handle one inbound message to completion.
    pub async fn handle(&self, topic: &str, payload: &[u8]) -> Outcome {
        let _guard = self.inner.dispatch.lock().await;

        let Some(path) = topic.strip_prefix(self.inner.topics.command_prefix()) else {
            return Outcome::Unrecognized;
        };
        let Some(command_topic) = CommandTopic::resolve(path) else {
            debug!(%topic, "ignoring unknown bridge topic");
            return Outcome::Unrecognized;
        };

        let command = match Command::parse(command_topic, payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(command = %command_topic, error = %e, "rejected bridge command");
                return Outcome::Rejected(e.to_string());
            }
        };

        match route_command(self, command).await {
            Ok(()) => {
                debug!(command = %command_topic, "bridge command completed");
                Outcome::Completed
            }
            Err(e) => {
                let outcome = e.into_outcome();
                match &outcome {
                    Outcome::Failed(reason) => {
                        error!(command = %command_topic, %reason, "bridge command failed");
                    }
                    Outcome::Rejected(reason) => {
                        warn!(command = %command_topic, %reason, "rejected bridge command");
                    }
                    Outcome::Completed | Outcome::Unrecognized => {}
                }
                outcome
            }
        }
    }

    // ── Network events ───────────────────────────────────────────

    /// A device announced itself on the network.
    ///
    /// With a non-empty whitelist, devices not on it are sent away and
    /// never registered.
    pub async fn device_joined(&self, id: &IeeeAddr) -> Outcome {
        let _guard = self.inner.dispatch.lock().await;

        if !self.inner.store.is_admitted(id) {
            warn!(device = %id, "device not whitelisted, removing it from the network");
            return match self.inner.network.remove_from_network(id).await {
                Ok(()) => Outcome::Rejected(format!("{id} is not whitelisted")),
                Err(e) => {
                    error!(device = %id, error = %e, "failed to remove non-whitelisted device");
                    Outcome::Failed(e.to_string())
                }
            };
        }

        match self.register_joined(id) {
            Ok(()) => Outcome::Completed,
            Err(e) => e.into_outcome(),
        }
    }

    fn register_joined(&self, id: &IeeeAddr) -> Result<(), HandlerError> {
        let entry = self.inner.store.ensure_device(id)?;
        info!(device = %id, friendly_name = %entry.friendly_name, "device connected");
        self.log_event(
            "device_connected",
            &json!({ "friendly_name": entry.friendly_name }),
        )
    }

    /// A device reported new attribute values.
    pub async fn device_state(&self, id: &IeeeAddr, attributes: Map<String, Value>) -> Outcome {
        let _guard = self.inner.dispatch.lock().await;

        let Some(entry) = self.inner.store.device(id.as_str()) else {
            debug!(device = %id, "state from unregistered device ignored");
            return Outcome::Rejected(format!("{id} is not registered"));
        };

        let options = self.inner.store.options();
        let payload = self
            .inner
            .runtime
            .record(id, attributes, &options, Utc::now());
        let publish_options = PublishOptions {
            retain: entry.retain(),
            ..PublishOptions::default()
        };

        match Outbound::json(
            self.inner.topics.entity(&entry.friendly_name),
            &payload,
            publish_options,
        ) {
            Ok(message) => {
                self.publish(message);
                Outcome::Completed
            }
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }

    // ── Outbound helpers ─────────────────────────────────────────

    fn publish(&self, message: Outbound) {
        let on_delivery = log_delivery_failure(&message.topic);
        self.inner.publisher.publish(message, on_delivery);
    }

    fn log_event<M: Serialize + ?Sized>(&self, kind: &str, message: &M) -> Result<(), HandlerError> {
        let event = LogEvent { kind, message };
        let out = Outbound::json(self.inner.topics.log(), &event, PublishOptions::default())?;
        self.publish(out);
        Ok(())
    }
}

// ── Background tasks ─────────────────────────────────────────────

async fn inbound_processor_task(
    bridge: Bridge,
    mut rx: mpsc::Receiver<InboundEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let Inbound { topic, payload } = envelope.message;
                let outcome = bridge.handle(&topic, &payload).await;
                if let Some(tx) = envelope.response_tx {
                    let _ = tx.send(outcome);
                }
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
async fn route_command(bridge: &Bridge, cmd: Command) -> Result<(), HandlerError> {
    let inner = &bridge.inner;
    let store = &inner.store;

    match cmd {
        // ── Global options ───────────────────────────────────────
        Command::SetElapsed(elapsed) => {
            store.set_elapsed(elapsed)?;
            info!(elapsed, "elapsed reporting updated");
        }

        Command::SetLastSeen(mode) => {
            store.set_last_seen(mode)?;
            info!(%mode, "last_seen mode updated");
        }

        Command::SetLogLevel(level) => {
            store.set_log_level(level)?;
            for sink in LogSink::iter() {
                inner.log_control.set_level(sink, level);
            }
            info!(%level, "log level updated");
        }

        // ── Network ──────────────────────────────────────────────
        Command::PermitJoin(permit) => {
            inner.network.permit_join(permit).await?;
            store.set_permit_join(permit)?;
            info!(permit, "permit join updated");
        }

        Command::SoftReset => {
            inner.network.soft_reset().await?;
            info!("soft reset coordinator");
        }

        Command::ListDevices => {
            let devices = inner.network.list_devices().await?;
            let summaries: Vec<DeviceSummary> = devices
                .iter()
                .map(|device| {
                    let entry = store.device(device.ieee_addr.as_str());
                    DeviceSummary::project(device, entry.as_ref())
                })
                .collect();
            let out = Outbound::json(
                inner.topics.device_list(),
                &summaries,
                PublishOptions::default(),
            )?;
            bridge.publish(out);
        }

        // ── Devices ──────────────────────────────────────────────
        Command::Whitelist { friendly_name } => {
            let entry = store
                .device(&friendly_name)
                .ok_or(CoreError::DeviceNotFound {
                    identifier: friendly_name,
                })?;
            if store.whitelist_add(&entry.id)? {
                info!(device = %entry.id, friendly_name = %entry.friendly_name, "device whitelisted");
                bridge.log_event(
                    "device_whitelisted",
                    &json!({ "friendly_name": entry.friendly_name }),
                )?;
            } else {
                debug!(device = %entry.id, "device already whitelisted");
            }
        }

        Command::DeviceOptions(request) => {
            let entry = store.merge_device_options(&request.friendly_name, request.options)?;
            info!(device = %entry.id, friendly_name = %entry.friendly_name, "device options updated");
        }

        Command::RemoveDevice {
            friendly_name,
            mode,
        } => {
            let entry = store
                .device(&friendly_name)
                .ok_or(CoreError::DeviceNotFound {
                    identifier: friendly_name,
                })?;
            match mode {
                RemovalMode::Force => inner.network.forget(&entry.id).await?,
                RemovalMode::Remove | RemovalMode::Ban => {
                    inner.network.remove_from_network(&entry.id).await?;
                }
            }
            store.remove_device(entry.id.as_str())?;
            inner.runtime.remove(&entry.id);
            info!(device = %entry.id, friendly_name = %entry.friendly_name, ?mode, "device removed");
            bridge.log_event(mode.event_type(), entry.friendly_name.as_str())?;
        }

        Command::Rename(request) => {
            let renamed = store.rename(&request.old, &request.new)?;
            match &renamed {
                Renamed::Device(entry) => {
                    info!(device = %entry.id, from = %request.old, to = %request.new, "device renamed");
                }
                Renamed::Group(group) => {
                    info!(group = %group.id, from = %request.old, to = %request.new, "group renamed");
                }
            }
            bridge.log_event(
                "device_renamed",
                &json!({ "from": request.old, "to": request.new }),
            )?;
        }

        // ── Groups ───────────────────────────────────────────────
        Command::ListGroups => {
            let groups: Vec<GroupSummary> = store.groups().iter().map(GroupSummary::from).collect();
            bridge.log_event("groups", &groups)?;
        }

        Command::AddGroup { friendly_name } => {
            let group = store.add_group(&friendly_name)?;
            info!(group = %group.id, %friendly_name, "group added");
            inner.network.create_group(group.id).await?;
            bridge.log_event("group_added", group.friendly_name.as_str())?;
        }

        Command::RemoveGroup { friendly_name } => {
            if let Some(group) = store.remove_group(&friendly_name)? {
                info!(group = %group.id, friendly_name = %group.friendly_name, "group removed");
                bridge.log_event("group_removed", group.friendly_name.as_str())?;
            } else {
                debug!(%friendly_name, "no such group, nothing removed");
            }
        }
    }

    Ok(())
}
