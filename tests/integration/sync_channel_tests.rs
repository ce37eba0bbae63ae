//! Connection lifecycle and command dispatch through the full service.

use portatec::app::events::AppEvent;
use portatec::app::ports::{BrokerEvent, RelayPort};
use portatec::sync::{ConnectionState, INBOX_CAPACITY};
use serde_json::json;

use super::mock_hw::{Rig, topic};

// ── Connection lifecycle ──────────────────────────────────────

#[test]
fn connects_subscribes_and_reports_status() {
    let mut rig = Rig::new();
    rig.connect_at(0);

    assert_eq!(
        rig.broker.subscriptions,
        vec![topic("command"), topic("access-codes/sync")]
    );

    let status = rig.broker.published_on("status");
    assert_eq!(status.len(), 1, "one status snapshot on connect");
    let s = &status[0];
    assert_eq!(s["device_id"], "ptc-efcafe");
    assert_eq!(s["uptime"], 0);
    assert_eq!(s["rssi"], -58);
    assert_eq!(s["pulse_pin"], 4);
    assert_eq!(s["clock_synced"], false);
    assert_eq!(s["access_codes"], 0);
    assert!(s.get("sensor_value").is_none(), "no sensor configured");

    assert!(rig.sink.events.contains(&AppEvent::ConnectionChanged {
        from: ConnectionState::Disconnected,
        to: ConnectionState::Connecting,
    }));
    assert!(rig.sink.events.contains(&AppEvent::ConnectionChanged {
        from: ConnectionState::Connecting,
        to: ConnectionState::Connected,
    }));
}

#[test]
fn no_attempt_while_link_is_down() {
    let mut rig = Rig::new();
    rig.link.up = false;
    rig.run(0, 60_000, 1_000);
    assert_eq!(rig.broker.connects, 0);
    assert_eq!(rig.service.channel().state(), ConnectionState::Disconnected);

    // No attempt was consumed, so the first one after the link returns is immediate.
    rig.link.up = true;
    rig.tick(61_000);
    assert_eq!(rig.broker.connects, 1);
}

#[test]
fn failed_attempts_respect_fixed_interval() {
    let mut rig = Rig::new();
    rig.broker.fail_connect = true;
    rig.run(0, 20_000, 500);
    // 0, 5000, 10000, 15000, 20000
    assert_eq!(rig.broker.connects, 5);
    assert_eq!(rig.service.channel().state(), ConnectionState::Disconnected);
}

#[test]
fn handshake_timeout_returns_to_disconnected() {
    let mut rig = Rig::new();
    rig.broker.auto_accept = false;

    rig.tick(0);
    assert_eq!(rig.service.channel().state(), ConnectionState::Connecting);
    rig.tick(9_999);
    assert_eq!(rig.service.channel().state(), ConnectionState::Connecting);
    rig.tick(10_000);
    assert_eq!(rig.service.channel().state(), ConnectionState::Disconnected);
    assert_eq!(rig.broker.disconnects, 1);

    rig.tick(10_001);
    assert_eq!(rig.broker.connects, 2);
}

#[test]
fn late_handshake_is_ignored() {
    let mut rig = Rig::new();
    rig.broker.auto_accept = false;
    rig.tick(0);
    rig.tick(10_000);

    rig.link.up = false;
    rig.broker.push_event(BrokerEvent::Connected);
    rig.tick(10_001);
    assert_eq!(rig.service.channel().state(), ConnectionState::Disconnected);
    assert!(rig.broker.subscriptions.is_empty());
}

#[test]
fn silence_past_liveness_forces_disconnect() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker.fail_publish = true;

    // Heartbeats fail, so nothing refreshes the liveness timer after 10.
    rig.tick(30_010);
    rig.tick(60_010);
    rig.tick(90_010);
    assert!(rig.service.channel().is_connected());

    rig.tick(90_011);
    assert_eq!(rig.service.channel().state(), ConnectionState::Disconnected);
    assert_eq!(rig.broker.disconnects, 1);

    // The reconnect timer was reset on connect; the next attempt is immediate.
    rig.tick(90_012);
    assert_eq!(rig.broker.connects, 2);
}

#[test]
fn heartbeats_keep_session_alive() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.run(1_000, 300_000, 1_000);

    assert!(rig.service.channel().is_connected());
    assert_eq!(rig.broker.disconnects, 0);
    // Connect snapshot plus 31 s, 61 s, ... 271 s.
    let status = rig.broker.published_on("status");
    assert_eq!(status.len(), 10);
    assert_eq!(status[9]["uptime"], 271);
}

#[test]
fn transport_drop_reconnects_immediately() {
    let mut rig = Rig::new();
    rig.connect_at(0);

    rig.broker.push_event(BrokerEvent::Disconnected);
    rig.tick(1_000);
    assert_eq!(rig.service.channel().state(), ConnectionState::Connecting);
    assert_eq!(rig.broker.connects, 2);

    rig.tick(1_010);
    assert!(rig.service.channel().is_connected());
    assert_eq!(rig.broker.subscriptions.len(), 4);
}

// ── Inbox ─────────────────────────────────────────────────────

#[test]
fn inbox_overflow_drops_newest_and_dispatches_one_per_tick() {
    let mut rig = Rig::new();
    rig.connect_at(0);

    for i in 0..10 {
        rig.broker
            .deliver_command(&format!(r#"{{"action":"pulse","command_id":"{}"}}"#, i));
    }
    rig.tick(20);
    assert_eq!(rig.service.channel().pending(), INBOX_CAPACITY - 1);
    assert_eq!(rig.relay.pulses.len(), 1);

    rig.run(30, 100, 10);
    assert_eq!(rig.service.channel().pending(), 0);

    let ids: Vec<String> = rig
        .broker
        .published_on("ack")
        .iter()
        .map(|a| a["command_id"].as_str().unwrap_or_default().to_owned())
        .collect();
    let expected: Vec<String> = (0..INBOX_CAPACITY).map(|i| i.to_string()).collect();
    assert_eq!(ids, expected);
    assert_eq!(rig.relay.pulses.len(), INBOX_CAPACITY);
}

#[test]
fn message_on_foreign_topic_is_dropped() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker
        .deliver("device/ptc-000000/command", r#"{"action":"pulse"}"#);
    rig.tick(20);
    assert_eq!(rig.service.channel().pending(), 0);
    assert!(rig.relay.pulses.is_empty());
    assert!(rig.broker.published_on("ack").is_empty());
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn pulse_energises_relay_and_acks_pin() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker
        .deliver_command(r#"{"action":"pulse","command_id":7}"#);
    rig.tick(20);

    assert_eq!(rig.relay.pulses, vec![(20, 1_000)]);
    assert_eq!(
        rig.broker.published_on("ack"),
        vec![json!({"action":"pulse","pin":4,"command_id":"7"})]
    );
    assert!(rig.sink.events.contains(&AppEvent::RelayPulsed { duration_ms: 1_000 }));

    rig.tick(1_020);
    assert!(!rig.relay.is_active());
}

#[test]
fn unknown_action_acked_exactly_once() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker
        .deliver_command(r#"{"action":"foo","command_id":"42"}"#);
    rig.run(20, 200, 10);

    assert_eq!(
        rig.broker.published_on("ack"),
        vec![json!({"action":"foo","command_id":"42"})]
    );
    assert!(rig.relay.pulses.is_empty());
    assert!(rig.sink.events.contains(&AppEvent::UnknownAction));
}

#[test]
fn undecodable_payloads_are_dropped_without_ack() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker.deliver_command("{nope");
    rig.broker.deliver_command(r#"{"command_id":"1"}"#);
    rig.broker.deliver_command("[1,2,3]");
    rig.run(20, 60, 10);

    assert!(rig.broker.published_on("ack").is_empty());
    assert!(rig.broker.published_on("access-codes/ack").is_empty());
    assert!(rig.service.channel().is_connected());
}

#[test]
fn known_action_with_bad_params_is_nacked() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker
        .deliver_command(r#"{"action":"update_firmware","command_id":"9","url":12}"#);
    rig.broker
        .deliver_command(r#"{"action":"delete_access_code","command_id":"d"}"#);
    rig.run(20, 30, 10);

    assert_eq!(
        rig.broker.published_on("ack"),
        vec![json!({
            "action":"update_firmware","command_id":"9",
            "status":"error","error":"invalid_params"
        })]
    );
    assert_eq!(
        rig.broker.published_on("access-codes/ack"),
        vec![json!({"action":"delete_access_code","command_id":"d","status":"error"})]
    );
    assert!(rig.firmware.requests.is_empty());
}
