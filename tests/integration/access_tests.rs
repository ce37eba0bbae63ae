//! Credential sync, validation and persistence through the full service.

use portatec::access::AccessGrant;
use portatec::app::events::AppEvent;
use portatec::config::DeviceConfig;
use serde_json::json;

use super::mock_hw::{MockNvs, Rig, topic};

/// 2023-11-14T22:13:20Z
const SERVER_TIME: u64 = 1_700_000_000;

fn seeded(records: &str) -> Rig {
    let nvs = MockNvs::new();
    nvs.seed("access", "codes", records.as_bytes());
    Rig::with_storage(
        DeviceConfig {
            master_pin: "123456".into(),
            ..Default::default()
        },
        nvs,
    )
}

// ── Full list sync ────────────────────────────────────────────

#[test]
fn sync_replaces_list_and_sets_clock() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker.deliver(
        &topic("access-codes/sync"),
        r#"{
            "action":"sync_access_codes","command_id":"s1","server_time":1700000000,
            "access_codes":[
                {"id":1,"pin":"111111","start_unix":1699999000,"end_unix":1700003600},
                {"id":2,"pin":"222222","start":"2023-11-14T00:00:00Z","end":"2023-11-16T00:00:00Z"},
                {"pin":"333333","start_unix":0,"end_unix":10},
                {"id":4,"pin":"444444","start":"yesterday","end_unix":10}
            ]}"#,
    );
    rig.tick(20);

    assert_eq!(
        rig.broker.published_on("access-codes/ack"),
        vec![json!({
            "action":"sync_access_codes","command_id":"s1",
            "accepted":3,"skipped":1,"status":"ok"
        })]
    );
    assert!(rig.service.clock().is_synced());
    assert_eq!(rig.service.clock().now(1_020), Some(SERVER_TIME + 1));
    assert_eq!(rig.service.store().len(), 3);
    // Numbered after the largest id in the list.
    assert_eq!(rig.service.store().get(5).map(|c| c.secret.as_str()), Some("333333"));
    assert!(rig.sink.events.contains(&AppEvent::ClockSynced { epoch: SERVER_TIME }));
    assert!(rig.sink.events.contains(&AppEvent::CredentialsSynced {
        accepted: 3,
        skipped: 1,
    }));

    assert_eq!(rig.present("222222", 1_020), Some(AccessGrant::Temporary(2)));
    assert_eq!(rig.relay.pulses, vec![(1_020, 1_000)]);
    assert_eq!(
        rig.broker.published_on("event"),
        vec![json!({"pin":"222222","result":"valid","timestamp_device":SERVER_TIME + 1})]
    );
}

#[test]
fn sync_entries_without_ids_are_installed() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker.deliver(
        &topic("access-codes/sync"),
        r#"{"action":"sync_access_codes","command_id":"s3","server_time":1500,
            "access_codes":[
                {"pin":"999111","start_unix":1000,"end_unix":2000},
                {"pin":"555","start":"bogus","end_unix":2000},
                {"pin":"777","start":"1970-01-01T00:10:00Z","end":"1970-01-01T00:40:00Z"}
            ]}"#,
    );
    rig.tick(20);

    assert_eq!(
        rig.broker.published_on("access-codes/ack"),
        vec![json!({
            "action":"sync_access_codes","command_id":"s3",
            "accepted":2,"skipped":1,"status":"ok"
        })]
    );
    let ids: Vec<i64> = rig.service.store().credentials().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(rig.present("999111", 30), Some(AccessGrant::Temporary(1)));
    assert_eq!(rig.present("777", 40), Some(AccessGrant::Temporary(3)));
    assert_eq!(rig.present("555", 50), None);
}

#[test]
fn synced_list_survives_restart() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker.deliver(
        &topic("access-codes/sync"),
        r#"{"action":"sync_access_codes","command_id":"s2","access_codes":[
            {"id":10,"pin":"1010","start_unix":0,"end_unix":4000000000},
            {"id":11,"pin":"1111","start_unix":0,"end_unix":4000000000}
        ]}"#,
    );
    rig.tick(20);
    assert_eq!(rig.nvs.writes(), 1, "replace persists once");

    let reboot = Rig::with_storage(rig.service.config().clone(), rig.nvs.clone());
    assert_eq!(reboot.service.store().len(), 2);
    assert_eq!(reboot.sink.events, vec![AppEvent::Started { credentials: 2 }]);
    // No server_time in that sync, so the clock is still unknown.
    assert!(!reboot.service.clock().is_synced());
}

// ── Single-credential commands ────────────────────────────────

#[test]
fn create_then_delete_credential() {
    let mut rig = Rig::new();
    rig.sync_clock(1_000_000, 0);
    rig.connect_at(0);

    rig.broker.deliver_command(
        r#"{"action":"create_access_code","command_id":"c1","id":5,"pin":"4242",
            "start_unix":999000,"end_unix":1001000}"#,
    );
    rig.tick(20);
    assert_eq!(
        rig.broker.published_on("access-codes/ack"),
        vec![json!({"action":"create_access_code","command_id":"c1","id":5,"status":"ok"})]
    );
    assert!(rig.sink.events.contains(&AppEvent::CredentialChanged {
        id: 5,
        removed: false,
    }));
    assert_eq!(rig.present("4242", 30), Some(AccessGrant::Temporary(5)));

    rig.broker
        .deliver_command(r#"{"action":"delete_access_code","command_id":"d1","id":5}"#);
    rig.tick(40);
    assert_eq!(
        rig.broker.published_on("access-codes/ack")[1],
        json!({"action":"delete_access_code","command_id":"d1","id":5,"status":"ok"})
    );
    assert_eq!(rig.present("4242", 50), None);

    let events = rig.broker.published_on("event");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["result"], "valid");
    assert_eq!(events[1]["result"], "invalid");
}

#[test]
fn update_of_unknown_id_creates_it() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker.deliver_command(
        r#"{"action":"update_access_code","command_id":"u1","id":9,"pin":"9999",
            "start":"2024-01-01T00:00:00","end":"2024-12-31T23:59:59+02:00"}"#,
    );
    rig.tick(20);

    let stored = rig.service.store().get(9).cloned();
    assert!(stored.is_some());
    assert_eq!(stored.map(|c| c.valid_from), Some(1_704_067_200));
}

#[test]
fn inverted_window_is_rejected_with_id() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker.deliver_command(
        r#"{"action":"create_access_code","command_id":"c2","id":6,"pin":"1",
            "start_unix":20,"end_unix":10}"#,
    );
    rig.tick(20);

    assert_eq!(
        rig.broker.published_on("access-codes/ack"),
        vec![json!({"action":"create_access_code","command_id":"c2","id":6,"status":"error"})]
    );
    assert!(rig.service.store().is_empty());
    assert_eq!(rig.nvs.writes(), 0);
}

#[test]
fn delete_of_unknown_id_is_ok_without_write() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    rig.broker
        .deliver_command(r#"{"action":"delete_access_code","command_id":"d2","id":404}"#);
    rig.tick(20);

    assert_eq!(
        rig.broker.published_on("access-codes/ack"),
        vec![json!({"action":"delete_access_code","command_id":"d2","id":404,"status":"ok"})]
    );
    assert_eq!(rig.nvs.writes(), 0);
}

// ── Local validation ──────────────────────────────────────────

#[test]
fn master_pin_works_offline_without_clock() {
    let mut rig = Rig::new();
    rig.link.up = false;

    assert_eq!(rig.present("123456", 0), Some(AccessGrant::Master));
    assert_eq!(rig.relay.pulses.len(), 1);
    assert!(rig.broker.published.is_empty(), "offline attempts are not reported");
    assert!(rig.sink.events.contains(&AppEvent::AccessDecision {
        grant: Some(AccessGrant::Master),
    }));
}

#[test]
fn temporary_credential_fails_closed_without_clock() {
    let mut rig = seeded(
        r#"{"version":2,"credentials":[{"id":1,"secret":"4242","start_epoch":0,"end_epoch":4000000000}]}"#,
    );
    assert_eq!(rig.present("4242", 0), None);
    assert!(rig.relay.pulses.is_empty());

    rig.sync_clock(SERVER_TIME, 0);
    assert_eq!(rig.present("4242", 0), Some(AccessGrant::Temporary(1)));
}

#[test]
fn rejected_attempt_reports_null_time_when_unsynced() {
    let mut rig = Rig::new();
    rig.connect_at(0);
    assert_eq!(rig.present("000000", 20), None);
    assert!(rig.relay.pulses.is_empty());
    assert_eq!(
        rig.broker.published_on("event"),
        vec![json!({"pin":"000000","result":"invalid","timestamp_device":null})]
    );
}

// ── Persistence ───────────────────────────────────────────────

#[test]
fn legacy_records_are_migrated_on_load() {
    let rig = seeded(r#"[{"code":"777","start_epoch":0,"end_epoch":4000000000},
                         {"code":"888","start_epoch":5,"end_epoch":6}]"#);

    let store = rig.service.store();
    assert_eq!(store.len(), 2);
    assert_eq!(store.get(1).map(|c| c.secret.as_str()), Some("777"));
    assert_eq!(store.get(2).map(|c| c.secret.as_str()), Some("888"));
    assert_eq!(rig.nvs.writes(), 1, "migrated file rewritten once");

    let raw = rig.nvs.raw("access", "codes").unwrap_or_default();
    let file: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(file["version"], 2);
}

#[test]
fn corrupt_records_start_empty() {
    let rig = seeded("{\"version\":");
    assert!(rig.service.store().is_empty());
    assert_eq!(rig.sink.events, vec![AppEvent::Started { credentials: 0 }]);
}

#[test]
fn periodic_purge_drops_expired() {
    let mut rig = seeded(
        r#"{"version":2,"credentials":[
            {"id":1,"secret":"1","start_epoch":0,"end_epoch":500},
            {"id":2,"secret":"2","start_epoch":0,"end_epoch":5000}
        ]}"#,
    );
    rig.link.up = false;
    rig.sync_clock(1_000, 0);

    rig.tick(59_999);
    assert_eq!(rig.service.store().len(), 2);
    rig.tick(60_000);
    assert_eq!(rig.service.store().len(), 1);
    assert!(rig.service.store().get(2).is_some());
    assert!(rig.sink.events.contains(&AppEvent::CredentialsPurged { removed: 1 }));
}

#[test]
fn purge_without_clock_keeps_everything() {
    let mut rig = seeded(
        r#"{"version":2,"credentials":[{"id":1,"secret":"1","start_epoch":0,"end_epoch":1}]}"#,
    );
    rig.link.up = false;
    rig.run(0, 180_000, 60_000);
    assert_eq!(rig.service.store().len(), 1);
}
