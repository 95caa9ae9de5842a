#![allow(clippy::unwrap_used)]
// Integration tests for the `bridge/config/*` command surface, driven
// through an in-memory store, an in-memory network and a channel publisher.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::mpsc::UnboundedReceiver;

use zigbridge_core::{
    Bridge, BridgeConfig, BridgeServices, BuildInfo, ChannelPublisher, DeviceType, GroupId,
    IeeeAddr, InMemoryNetwork, Inbound, LastSeenMode, LogControl, LogLevel, LogSink,
    NetworkCall, NetworkDevice, NetworkOperation, Outbound, Outcome, SettingsDocument,
    SettingsStore,
};

// ── Helpers ─────────────────────────────────────────────────────────

const BULB_COLOR: &str = "0x000b57fffec6a5b3";
const BULB: &str = "0x000b57fffec6a5b2";
const COORDINATOR: &str = "0x00124b00120144ae";

const SETTINGS: &str = r"
devices:
  '0x000b57fffec6a5b3':
    friendly_name: bulb_color
    retain: false
  '0x000b57fffec6a5b2':
    friendly_name: bulb
    retain: true
groups:
  1:
    friendly_name: group_1
    retain: false
  2:
    friendly_name: group_2
    retain: false
";

#[derive(Default)]
struct RecordingLogControl {
    changes: Mutex<Vec<(LogSink, LogLevel)>>,
}

impl LogControl for RecordingLogControl {
    fn set_level(&self, sink: LogSink, level: LogLevel) {
        self.changes.lock().unwrap().push((sink, level));
    }
}

struct Harness {
    bridge: Bridge,
    store: Arc<SettingsStore>,
    network: Arc<InMemoryNetwork>,
    log_control: Arc<RecordingLogControl>,
    rx: UnboundedReceiver<Outbound>,
}

impl Harness {
    fn new() -> Self {
        let document = SettingsDocument::from_yaml(SETTINGS).unwrap();
        Self::with_store(SettingsStore::in_memory(document))
    }

    fn with_store(store: SettingsStore) -> Self {
        let store = Arc::new(store);
        let network = Arc::new(InMemoryNetwork::new(
            addr(COORDINATOR),
            InMemoryNetwork::coordinator_info("zStack", 1),
        ));
        network.add_device(router(BULB_COLOR));
        network.add_device(router(BULB));

        let (publisher, rx) = ChannelPublisher::new();
        let log_control = Arc::new(RecordingLogControl::default());
        let config = BridgeConfig {
            base_topic: "zigbee2mqtt".into(),
            build: BuildInfo {
                version: "1.2.3".into(),
                commit: Some("abc1234".into()),
            },
            command_queue_size: 8,
        };

        let bridge = Bridge::new(
            config,
            BridgeServices {
                store: Arc::clone(&store),
                network: Arc::clone(&network) as _,
                publisher: Arc::new(publisher),
                log_control: Arc::clone(&log_control) as _,
            },
        );

        Self {
            bridge,
            store,
            network,
            log_control,
            rx,
        }
    }

    async fn send(&self, command: &str, payload: &str) -> Outcome {
        self.bridge
            .handle(&self.bridge.topics().command(command), payload.as_bytes())
            .await
    }

    fn published(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            out.push(message);
        }
        out
    }

    /// Drain published messages and return the single bridge log event.
    fn log_event(&mut self) -> Value {
        let published = self.published();
        assert_eq!(published.len(), 1, "expected exactly one message: {published:?}");
        let message = &published[0];
        assert_eq!(message.topic, "zigbee2mqtt/bridge/log");
        assert!(!message.options.retain);
        assert_eq!(message.options.qos.level(), 0);
        serde_json::from_str(message.payload.as_str()).unwrap()
    }
}

fn addr(raw: &str) -> IeeeAddr {
    raw.parse().unwrap()
}

fn router(raw: &str) -> NetworkDevice {
    NetworkDevice {
        ieee_addr: addr(raw),
        device_type: DeviceType::Router,
        network_address: 40369,
        manufacturer_id: Some(4476),
        model_id: Some("TRADFRI bulb E27 CWS opal 600lm".into()),
        power_source: Some("Mains (single phase)".into()),
        model: Some("LED1624G9".into()),
        last_seen: Some(1000),
    }
}

// ── Global options ──────────────────────────────────────────────────

#[tokio::test]
async fn test_elapsed_accepts_only_literal_true() {
    let mut h = Harness::new();

    assert_eq!(h.send("elapsed", "true").await, Outcome::Completed);
    assert!(h.store.options().elapsed);

    h.send("elapsed", "false").await;
    assert!(!h.store.options().elapsed);

    h.send("elapsed", "true").await;
    h.send("elapsed", "wrong").await;
    assert!(!h.store.options().elapsed);
    assert!(h.published().is_empty());
}

#[tokio::test]
async fn test_last_seen_rejects_unknown_modes() {
    let mut h = Harness::new();

    assert_eq!(h.send("last_seen", "ISO_8601").await, Outcome::Completed);
    assert_eq!(h.store.options().last_seen, LastSeenMode::Iso8601);

    let outcome = h.send("last_seen", "notvalid").await;
    assert!(matches!(outcome, Outcome::Rejected(_)), "{outcome:?}");
    assert_eq!(h.store.options().last_seen, LastSeenMode::Iso8601);
    assert!(h.published().is_empty());
}

#[tokio::test]
async fn test_log_level_updates_both_sinks() {
    let h = Harness::new();

    assert_eq!(h.send("log_level", "debug").await, Outcome::Completed);
    assert_eq!(h.store.options().log_level, LogLevel::Debug);
    assert_eq!(
        *h.log_control.changes.lock().unwrap(),
        vec![(LogSink::Console, LogLevel::Debug), (LogSink::File, LogLevel::Debug)]
    );

    assert!(matches!(h.send("log_level", "notvalid").await, Outcome::Rejected(_)));
    assert_eq!(h.store.options().log_level, LogLevel::Debug);
    assert_eq!(h.log_control.changes.lock().unwrap().len(), 2);
}

// ── Network commands ────────────────────────────────────────────────

#[tokio::test]
async fn test_permit_join_forwards_flag_once() {
    let h = Harness::new();

    h.send("permit_join", "true").await;
    assert_eq!(
        h.network.calls_of(NetworkOperation::PermitJoin),
        vec![NetworkCall::PermitJoin(true)]
    );
    assert!(h.store.options().permit_join);

    h.network.clear_calls();
    h.send("permit_join", "false").await;
    h.send("permit_join", "wrong").await;
    assert_eq!(
        h.network.calls(),
        vec![NetworkCall::PermitJoin(false), NetworkCall::PermitJoin(false)]
    );
    assert!(!h.store.options().permit_join);
}

#[tokio::test]
async fn test_permit_join_failure_keeps_flag() {
    let h = Harness::new();
    h.network.fail_next(NetworkOperation::PermitJoin);

    let outcome = h.send("permit_join", "true").await;
    assert!(matches!(outcome, Outcome::Failed(_)), "{outcome:?}");
    assert!(!h.store.options().permit_join);
    assert!(!h.network.permit_join_enabled());
}

#[tokio::test]
async fn test_reset_failure_is_contained() {
    let h = Harness::new();

    assert_eq!(h.send("reset", "").await, Outcome::Completed);
    h.network.fail_next(NetworkOperation::SoftReset);
    assert!(matches!(h.send("reset", "").await, Outcome::Failed(_)));
    assert_eq!(h.network.calls_of(NetworkOperation::SoftReset).len(), 2);
}

#[tokio::test]
async fn test_devices_get_publishes_compact_list() {
    let mut h = Harness::new();

    assert_eq!(h.send("devices/get", "").await, Outcome::Completed);
    let published = h.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, "zigbee2mqtt/bridge/config/devices");
    assert!(!published[0].options.retain);

    let list: Value = serde_json::from_str(published[0].payload.as_str()).unwrap();
    assert_eq!(
        list,
        json!([
            {"ieeeAddr": COORDINATOR, "type": "Coordinator"},
            {
                "ieeeAddr": BULB_COLOR,
                "type": "Router",
                "friendly_name": "bulb_color",
                "networkAddress": 40369,
                "model": "LED1624G9",
                "modelID": "TRADFRI bulb E27 CWS opal 600lm",
                "manufacturerID": 4476,
                "powerSource": "Mains (single phase)",
                "lastSeen": 1000
            },
            {
                "ieeeAddr": BULB,
                "type": "Router",
                "friendly_name": "bulb",
                "networkAddress": 40369,
                "model": "LED1624G9",
                "modelID": "TRADFRI bulb E27 CWS opal 600lm",
                "manufacturerID": 4476,
                "powerSource": "Mains (single phase)",
                "lastSeen": 1000
            }
        ])
    );
}

#[tokio::test]
async fn test_devices_subtopics_and_bare_devices() {
    let mut h = Harness::new();

    assert_eq!(h.send("devices/refresh", "").await, Outcome::Completed);
    assert_eq!(h.published().len(), 1);

    assert_eq!(h.send("devices", "[]").await, Outcome::Unrecognized);
    assert!(h.published().is_empty());
}

#[tokio::test]
async fn test_devices_get_enumeration_failure_publishes_nothing() {
    let mut h = Harness::new();
    h.network.fail_next(NetworkOperation::ListDevices);

    assert!(matches!(h.send("devices/get", "").await, Outcome::Failed(_)));
    assert!(h.published().is_empty());
}

// ── Whitelist ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_whitelist_add_is_idempotent() {
    let mut h = Harness::new();

    h.send("whitelist", "bulb_color").await;
    assert_eq!(h.store.whitelist(), vec![addr(BULB_COLOR)]);
    assert_eq!(
        h.log_event(),
        json!({"type": "device_whitelisted", "message": {"friendly_name": "bulb_color"}})
    );

    h.send("whitelist", "bulb_color").await;
    assert!(h.published().is_empty());
    assert_eq!(h.store.whitelist(), vec![addr(BULB_COLOR)]);

    h.send("whitelist", "bulb").await;
    assert_eq!(h.store.whitelist(), vec![addr(BULB_COLOR), addr(BULB)]);
    assert_eq!(
        h.log_event(),
        json!({"type": "device_whitelisted", "message": {"friendly_name": "bulb"}})
    );
}

#[tokio::test]
async fn test_whitelist_unknown_device_is_rejected() {
    let mut h = Harness::new();

    assert!(matches!(h.send("whitelist", "ghost").await, Outcome::Rejected(_)));
    assert!(h.store.whitelist().is_empty());
    assert!(h.published().is_empty());
}

// ── Device options ──────────────────────────────────────────────────

#[tokio::test]
async fn test_device_options_merge_and_malformed_follow_up() {
    let mut h = Harness::new();
    assert!(!h.store.device("bulb_color").unwrap().retain());

    let outcome = h
        .send(
            "device_options",
            r#"{"friendly_name":"bulb_color","options":{"retain":true}}"#,
        )
        .await;
    assert_eq!(outcome, Outcome::Completed);
    assert!(h.store.device("bulb_color").unwrap().retain());

    let outcome = h
        .send(
            "device_options",
            r#"{"friendly_name":"bulb_color","optionswrong":{"retain":false}}"#,
        )
        .await;
    assert!(matches!(outcome, Outcome::Rejected(_)));
    assert!(h.store.device("bulb_color").unwrap().retain());
    assert!(h.published().is_empty());
}

// ── Rename ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_rename_device() {
    let mut h = Harness::new();
    let before = h.store.device("bulb_color").unwrap();

    let outcome = h
        .send("rename", r#"{"old":"bulb_color","new":"bulb_color_renamed"}"#)
        .await;
    assert_eq!(outcome, Outcome::Completed);

    assert!(h.store.device("bulb_color").is_none());
    let after = h.store.device("bulb_color_renamed").unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.options, before.options);
    assert_eq!(
        h.log_event(),
        json!({"type": "device_renamed", "message": {"from": "bulb_color", "to": "bulb_color_renamed"}})
    );
}

#[tokio::test]
async fn test_rename_group() {
    let mut h = Harness::new();

    h.send("rename", r#"{"old":"group_1","new":"group_1_renamed"}"#)
        .await;
    assert!(h.store.group("group_1").is_none());
    assert_eq!(h.store.group("group_1_renamed").unwrap().id, GroupId(1));
    assert_eq!(
        h.log_event(),
        json!({"type": "device_renamed", "message": {"from": "group_1", "to": "group_1_renamed"}})
    );
}

#[tokio::test]
async fn test_rename_rejections_leave_state_untouched() {
    let mut h = Harness::new();
    let before = h.store.snapshot();

    for payload in [
        r#"{"old":"bulb_color","newmalformed":"bulb_color_renamed"}"#,
        "{old: 'bulb_color'newmalformed: 'bulb_color_renamed'}",
        r#"{"old":"ghost","new":"spirit"}"#,
        r#"{"old":"bulb_color","new":"bulb"}"#,
        r#"{"old":"bulb_color","new":"group_2"}"#,
        r#"{"old":"bulb_color","new":"lamp#"}"#,
    ] {
        let outcome = h.send("rename", payload).await;
        assert!(matches!(outcome, Outcome::Rejected(_)), "{payload}: {outcome:?}");
    }

    assert_eq!(*h.store.snapshot(), *before);
    assert!(h.published().is_empty());
}

// ── Groups ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_groups_listing() {
    let mut h = Harness::new();

    assert_eq!(h.send("groups", "").await, Outcome::Completed);
    assert_eq!(
        h.log_event(),
        json!({
            "type": "groups",
            "message": [
                {"ID": 1, "friendly_name": "group_1", "retain": false, "devices": [], "optimistic": true},
                {"ID": 2, "friendly_name": "group_2", "retain": false, "devices": [], "optimistic": true}
            ]
        })
    );
}

#[tokio::test]
async fn test_add_group_allocates_next_id() {
    let mut h = Harness::new();

    assert_eq!(h.send("add_group", "new_group").await, Outcome::Completed);
    let group = h.store.group("new_group").unwrap();
    assert_eq!(group.id, GroupId(3));
    assert!(group.devices.is_empty());
    assert_eq!(
        h.network.calls_of(NetworkOperation::CreateGroup),
        vec![NetworkCall::CreateGroup(GroupId(3))]
    );
    assert_eq!(h.log_event(), json!({"type": "group_added", "message": "new_group"}));
}

#[tokio::test]
async fn test_add_group_rejects_taken_name() {
    let mut h = Harness::new();

    assert!(matches!(h.send("add_group", "group_1").await, Outcome::Rejected(_)));
    assert!(matches!(h.send("add_group", "bulb").await, Outcome::Rejected(_)));
    assert_eq!(h.store.groups().len(), 2);
    assert!(h.network.calls().is_empty());
    assert!(h.published().is_empty());
}

#[tokio::test]
async fn test_names_that_parse_as_addresses_are_rejected() {
    let mut h = Harness::new();

    let outcome = h
        .send("rename", &format!(r#"{{"old":"bulb_color","new":"{BULB}"}}"#))
        .await;
    assert!(matches!(outcome, Outcome::Rejected(_)), "{outcome:?}");
    assert_eq!(h.store.device(BULB_COLOR).unwrap().friendly_name, "bulb_color");

    let outcome = h.send("add_group", "0x00158d0001d82999").await;
    assert!(matches!(outcome, Outcome::Rejected(_)), "{outcome:?}");
    assert_eq!(h.store.groups().len(), 2);
    assert!(h.network.calls().is_empty());
    assert!(h.published().is_empty());

    assert_eq!(h.send("remove", BULB).await, Outcome::Completed);
    assert_eq!(
        h.network.calls(),
        vec![NetworkCall::RemoveFromNetwork(addr(BULB))]
    );
    assert!(h.store.device("bulb").is_none());
    assert_eq!(h.store.device(BULB_COLOR).unwrap().friendly_name, "bulb_color");
}

#[tokio::test]
async fn test_joined_device_name_cannot_be_claimed_by_a_group() {
    let mut h = Harness::new();
    let newcomer = addr("0x00158d0001d82999");

    assert!(matches!(
        h.send("add_group", newcomer.as_str()).await,
        Outcome::Rejected(_)
    ));
    assert_eq!(h.bridge.device_joined(&newcomer).await, Outcome::Completed);
    assert!(h.store.group(newcomer.as_str()).is_none());
    assert_eq!(
        h.store.device(newcomer.as_str()).unwrap().friendly_name,
        newcomer.as_str()
    );
}

#[tokio::test]
async fn test_add_group_network_failure_keeps_entry() {
    let mut h = Harness::new();
    h.network.fail_next(NetworkOperation::CreateGroup);

    assert!(matches!(h.send("add_group", "new_group").await, Outcome::Failed(_)));
    assert_eq!(h.store.group("new_group").unwrap().id, GroupId(3));
    assert!(h.published().is_empty());
}

#[tokio::test]
async fn test_remove_group() {
    let mut h = Harness::new();

    assert_eq!(h.send("remove_group", "group_1").await, Outcome::Completed);
    assert!(h.store.group("group_1").is_none());
    assert_eq!(
        h.log_event(),
        json!({"type": "group_removed", "message": "group_1"})
    );

    assert_eq!(h.send("remove_group", "group_1").await, Outcome::Completed);
    assert!(h.published().is_empty());
}

// ── Removal ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_remove_device() {
    let mut h = Harness::new();

    assert_eq!(h.send("remove", "bulb_color").await, Outcome::Completed);
    assert_eq!(
        h.network.calls(),
        vec![NetworkCall::RemoveFromNetwork(addr(BULB_COLOR))]
    );
    assert!(h.store.device("bulb_color").is_none());
    assert!(!h.network.has_device(&addr(BULB_COLOR)));
    assert_eq!(
        h.log_event(),
        json!({"type": "device_removed", "message": "bulb_color"})
    );
}

#[tokio::test]
async fn test_remove_device_failure_keeps_entry() {
    let mut h = Harness::new();
    h.network.fail_next(NetworkOperation::RemoveFromNetwork);

    assert!(matches!(h.send("remove", "bulb_color").await, Outcome::Failed(_)));
    assert!(h.store.device("bulb_color").is_some());
    assert!(h.published().is_empty());
}

#[tokio::test]
async fn test_ban_device() {
    let mut h = Harness::new();

    assert_eq!(h.send("ban", "bulb_color").await, Outcome::Completed);
    assert!(h.store.device("bulb_color").is_none());
    assert!(h.store.whitelist().is_empty());
    assert_eq!(
        h.log_event(),
        json!({"type": "device_banned", "message": "bulb_color"})
    );
}

#[tokio::test]
async fn test_ban_device_failure_keeps_entry() {
    let mut h = Harness::new();
    h.network.fail_next(NetworkOperation::RemoveFromNetwork);

    assert!(matches!(h.send("ban", "bulb_color").await, Outcome::Failed(_)));
    assert!(h.store.device("bulb_color").is_some());
    assert!(h.published().is_empty());
}

#[tokio::test]
async fn test_force_remove_skips_leave_request() {
    let mut h = Harness::new();

    assert_eq!(h.send("force_remove", "bulb").await, Outcome::Completed);
    assert_eq!(h.network.calls(), vec![NetworkCall::Forget(addr(BULB))]);
    assert!(h.store.device("bulb").is_none());
    assert_eq!(
        h.log_event(),
        json!({"type": "device_force_removed", "message": "bulb"})
    );
}

#[tokio::test]
async fn test_remove_unknown_device_is_rejected() {
    let mut h = Harness::new();

    assert!(matches!(h.send("remove", "ghost").await, Outcome::Rejected(_)));
    assert!(h.network.calls().is_empty());
    assert!(h.published().is_empty());
}

// ── Routing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unrecognized_topics_publish_nothing() {
    let mut h = Harness::new();

    assert_eq!(h.send("not_supported", "x").await, Outcome::Unrecognized);
    assert_eq!(
        h.bridge.handle("zigbee2mqtt/bulb/set", b"{}").await,
        Outcome::Unrecognized
    );
    assert_eq!(
        h.bridge.handle("other/bridge/config/elapsed", b"true").await,
        Outcome::Unrecognized
    );
    assert!(!h.store.options().elapsed);
    assert!(h.published().is_empty());
    assert!(h.network.calls().is_empty());
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_startup_summary_published_once() {
    let mut h = Harness::new();

    h.bridge.start().await;
    h.bridge.start().await;

    let published = h.published();
    assert_eq!(published.len(), 1);
    let startup = &published[0];
    assert_eq!(startup.topic, "zigbee2mqtt/bridge/config");
    assert!(startup.options.retain);
    assert_eq!(
        startup.payload.as_str(),
        r#"{"version":"1.2.3","commit":"abc1234","coordinator":{"type":"zStack","meta":{"version":1}},"log_level":"info","permit_join":false}"#
    );

    h.bridge.shutdown().await;
}

#[tokio::test]
async fn test_startup_without_coordinator_metadata() {
    let mut h = Harness::new();
    h.network.fail_next(NetworkOperation::Coordinator);

    h.bridge.start().await;
    let published = h.published();
    let summary: Value = serde_json::from_str(published[0].payload.as_str()).unwrap();
    assert!(summary["coordinator"].is_null());

    h.bridge.shutdown().await;
}

#[tokio::test]
async fn test_execute_requires_running_bridge() {
    let h = Harness::new();
    let message = Inbound::new("zigbee2mqtt/bridge/config/elapsed", "true");

    assert!(h.bridge.execute(message.clone()).await.is_err());

    h.bridge.start().await;
    assert_eq!(h.bridge.execute(message.clone()).await.unwrap(), Outcome::Completed);

    h.bridge.shutdown().await;
    assert!(h.bridge.execute(message).await.is_err());
}

#[tokio::test]
async fn test_queued_commands_run_in_arrival_order() {
    let mut h = Harness::new();
    h.bridge.start().await;
    h.published();

    h.bridge
        .submit(Inbound::new("zigbee2mqtt/bridge/config/add_group", "hallway"))
        .await
        .unwrap();
    h.bridge
        .submit(Inbound::new(
            "zigbee2mqtt/bridge/config/rename",
            r#"{"old":"hallway","new":"landing"}"#,
        ))
        .await
        .unwrap();
    let outcome = h
        .bridge
        .execute(Inbound::new("zigbee2mqtt/bridge/config/remove_group", "landing"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Completed);

    let kinds: Vec<String> = h
        .published()
        .iter()
        .map(|m| {
            let event: Value = serde_json::from_str(m.payload.as_str()).unwrap();
            event["type"].as_str().unwrap().to_owned()
        })
        .collect();
    assert_eq!(kinds, vec!["group_added", "device_renamed", "group_removed"]);
    assert!(h.store.group("landing").is_none());

    h.bridge.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_group_allocates_distinct_ids() {
    let h = Harness::new();
    h.bridge.start().await;

    let mut tasks = Vec::new();
    for n in 0..10 {
        let bridge = h.bridge.clone();
        tasks.push(tokio::spawn(async move {
            bridge
                .execute(Inbound::new(
                    "zigbee2mqtt/bridge/config/add_group",
                    format!("room_{n}"),
                ))
                .await
                .unwrap()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), Outcome::Completed);
    }

    let mut ids: Vec<u16> = h.store.groups().iter().map(|g| g.id.0).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=12).collect::<Vec<_>>());

    h.bridge.shutdown().await;
}

// ── Network events ──────────────────────────────────────────────────

#[tokio::test]
async fn test_join_registers_device() {
    let mut h = Harness::new();
    let newcomer = addr("0x00158d0001d82999");

    assert_eq!(h.bridge.device_joined(&newcomer).await, Outcome::Completed);
    let entry = h.store.device("0x00158d0001d82999").unwrap();
    assert_eq!(entry.friendly_name, "0x00158d0001d82999");
    assert_eq!(
        h.log_event(),
        json!({"type": "device_connected", "message": {"friendly_name": "0x00158d0001d82999"}})
    );
}

#[tokio::test]
async fn test_join_gated_by_whitelist() {
    let mut h = Harness::new();
    h.send("whitelist", "bulb").await;
    h.published();

    let stranger = addr("0x00158d0001d82999");
    h.network.add_device(router("0x00158d0001d82999"));

    let outcome = h.bridge.device_joined(&stranger).await;
    assert!(matches!(outcome, Outcome::Rejected(_)), "{outcome:?}");
    assert!(h.store.device("0x00158d0001d82999").is_none());
    assert!(!h.network.has_device(&stranger));
    assert!(h.published().is_empty());

    assert_eq!(h.bridge.device_joined(&addr(BULB)).await, Outcome::Completed);
}

#[tokio::test]
async fn test_device_state_respects_retain_option() {
    let mut h = Harness::new();

    let Value::Object(update) = json!({"state": "ON", "brightness": 200}) else {
        unreachable!()
    };
    assert_eq!(
        h.bridge.device_state(&addr(BULB), update.clone()).await,
        Outcome::Completed
    );
    assert_eq!(
        h.bridge.device_state(&addr(BULB_COLOR), update).await,
        Outcome::Completed
    );

    let published = h.published();
    assert_eq!(published[0].topic, "zigbee2mqtt/bulb");
    assert!(published[0].options.retain);
    assert_eq!(published[1].topic, "zigbee2mqtt/bulb_color");
    assert!(!published[1].options.retain);

    let state: Value = serde_json::from_str(published[0].payload.as_str()).unwrap();
    assert_eq!(state, json!({"state": "ON", "brightness": 200}));
}

#[tokio::test]
async fn test_device_state_merges_and_stamps_last_seen() {
    let mut h = Harness::new();
    h.send("last_seen", "epoch").await;

    let Value::Object(first) = json!({"state": "ON"}) else {
        unreachable!()
    };
    let Value::Object(second) = json!({"brightness": 10}) else {
        unreachable!()
    };
    h.bridge.device_state(&addr(BULB), first).await;
    h.bridge.device_state(&addr(BULB), second).await;

    let published = h.published();
    let state: Value = serde_json::from_str(published[1].payload.as_str()).unwrap();
    assert_eq!(state["state"], "ON");
    assert_eq!(state["brightness"], 10);
    assert!(state["last_seen"].is_i64());
}

#[tokio::test]
async fn test_removal_drops_runtime_state() {
    let h = Harness::new();
    let Value::Object(update) = json!({"state": "ON"}) else {
        unreachable!()
    };
    h.bridge.device_state(&addr(BULB), update).await;
    assert!(h.bridge.runtime().get(&addr(BULB)).is_some());

    h.send("remove", "bulb").await;
    assert!(h.bridge.runtime().get(&addr(BULB)).is_none());
}

// ── Persistence ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_file_backed_store_persists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configuration.yaml");
    std::fs::write(&path, SETTINGS).unwrap();

    let h = Harness::with_store(SettingsStore::open(&path).unwrap());
    h.send("add_group", "kitchen").await;
    h.send("rename", r#"{"old":"bulb","new":"desk_lamp"}"#).await;
    h.send("last_seen", "ISO_8601").await;

    let reopened = SettingsStore::open(&path).unwrap();
    assert_eq!(reopened.group("kitchen").unwrap().id, GroupId(3));
    assert_eq!(reopened.device("desk_lamp").unwrap().id, addr(BULB));
    assert_eq!(reopened.options().last_seen, LastSeenMode::Iso8601);
}

#[tokio::test]
async fn test_persistence_failure_leaves_memory_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configuration.yaml");

    let mut h = Harness::with_store(SettingsStore::open(&path).unwrap());
    // A directory where the file should be makes every write fail.
    std::fs::create_dir(&path).unwrap();

    let outcome = h.send("add_group", "kitchen").await;
    assert!(matches!(outcome, Outcome::Failed(_)), "{outcome:?}");
    assert!(h.store.group("kitchen").is_none());
    assert!(h.network.calls().is_empty());
    assert!(h.published().is_empty());
}
