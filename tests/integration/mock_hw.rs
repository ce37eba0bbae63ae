//! Mock adapters for integration tests.
//!
//! Every port records what the core asked of it so tests can assert on the
//! full interaction history without a radio, a relay or flash.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use portatec::app::events::AppEvent;
use portatec::app::ports::{
    BrokerEvent, BrokerPort, EventSink, FirmwarePort, FirmwareRequest, FlashOutcome, LinkPort,
    Ports, RelayPort, SensorPort, StorageError, StoragePort, SystemPort,
};
use portatec::app::service::DeviceService;
use portatec::config::DeviceConfig;
use portatec::error::TransportError;
use serde_json::Value;

pub const DEVICE_ID: &str = "ptc-efcafe";

pub fn topic(suffix: &str) -> String {
    format!("device/{}/{}", DEVICE_ID, suffix)
}

// ── Link ──────────────────────────────────────────────────────

pub struct MockLink {
    pub up: bool,
}

impl LinkPort for MockLink {
    fn is_link_up(&self) -> bool {
        self.up
    }

    fn rssi(&self) -> Option<i8> {
        self.up.then_some(-58)
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBroker {
    /// Report a completed handshake right after `connect`.
    pub auto_accept: bool,
    pub fail_connect: bool,
    pub fail_publish: bool,
    pub connects: usize,
    pub disconnects: usize,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Value)>,
    events: VecDeque<BrokerEvent>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            auto_accept: true,
            ..Default::default()
        }
    }

    pub fn deliver(&mut self, topic: &str, payload: &str) {
        self.events.push_back(BrokerEvent::Message {
            topic: topic.into(),
            payload: payload.as_bytes().to_vec(),
        });
    }

    pub fn deliver_command(&mut self, payload: &str) {
        self.deliver(&topic("command"), payload);
    }

    pub fn push_event(&mut self, event: BrokerEvent) {
        self.events.push_back(event);
    }

    /// Payloads published on `device/<id>/<suffix>`.
    pub fn published_on(&self, suffix: &str) -> Vec<Value> {
        let t = topic(suffix);
        self.published
            .iter()
            .filter(|(topic, _)| *topic == t)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self, _client_id: &str) -> Result<(), TransportError> {
        self.connects += 1;
        if self.fail_connect {
            return Err(TransportError::ConnectFailed);
        }
        if self.auto_accept {
            self.events.push_back(BrokerEvent::Connected);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if self.fail_publish {
            return Err(TransportError::PublishFailed);
        }
        let value = serde_json::from_slice(payload).expect("outbound payload is JSON");
        self.published.push((topic.into(), value));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.subscriptions.push(topic.into());
        Ok(())
    }

    fn poll_event(&mut self) -> Option<BrokerEvent> {
        self.events.pop_front()
    }
}

// ── Relay / sensor ────────────────────────────────────────────

#[derive(Default)]
pub struct MockRelay {
    pub pulses: Vec<(u64, u32)>,
    release_at: Option<u64>,
}

impl RelayPort for MockRelay {
    fn pulse(&mut self, now_ms: u64, duration_ms: u32) {
        self.pulses.push((now_ms, duration_ms));
        self.release_at = Some(now_ms + u64::from(duration_ms));
    }

    fn poll(&mut self, now_ms: u64) {
        if self.release_at.is_some_and(|t| now_ms >= t) {
            self.release_at = None;
        }
    }

    fn is_active(&self) -> bool {
        self.release_at.is_some()
    }
}

#[derive(Default)]
pub struct MockSensor {
    pub level: Option<bool>,
}

impl SensorPort for MockSensor {
    fn read_level(&mut self) -> Option<bool> {
        self.level
    }
}

// ── Firmware / system ─────────────────────────────────────────

pub struct MockFirmware {
    pub outcome: FlashOutcome,
    pub requests: Vec<FirmwareRequest>,
}

impl Default for MockFirmware {
    fn default() -> Self {
        Self {
            outcome: FlashOutcome::Success,
            requests: Vec::new(),
        }
    }
}

impl FirmwarePort for MockFirmware {
    fn download_and_flash(&mut self, request: &FirmwareRequest) -> FlashOutcome {
        self.requests.push(request.clone());
        self.outcome
    }
}

pub struct MockSystem {
    pub now: u64,
    pub free_heap: u32,
    pub restarts: usize,
    pub slept_ms: u64,
}

impl Default for MockSystem {
    fn default() -> Self {
        Self {
            now: 0,
            free_heap: 128 * 1024,
            restarts: 0,
            slept_ms: 0,
        }
    }
}

impl SystemPort for MockSystem {
    fn uptime_ms(&self) -> u64 {
        self.now
    }

    fn free_heap(&self) -> u32 {
        self.free_heap
    }

    /// Advances the mock clock instead of blocking.
    fn sleep_ms(&mut self, ms: u32) {
        self.now += u64::from(ms);
        self.slept_ms += u64::from(ms);
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }
}

// ── MockNvs ───────────────────────────────────────────────────

/// In-memory storage.  Clones share contents, so a test can "reboot" by
/// building a new service on a clone.
#[derive(Clone, Default)]
pub struct MockNvs {
    store: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    writes: Rc<Cell<usize>>,
}

impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        self.store
            .borrow()
            .get(&format!("{}::{}", namespace, key))
            .cloned()
    }

    pub fn seed(&self, namespace: &str, key: &str, data: &[u8]) {
        self.store
            .borrow_mut()
            .insert(format!("{}::{}", namespace, key), data.to_vec());
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", namespace, key);
        match self.store.borrow().get(&k) {
            Some(v) if v.len() > buf.len() => Err(StorageError::TooLarge),
            Some(v) => {
                buf[..v.len()].copy_from_slice(v);
                Ok(v.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.writes.set(self.writes.get() + 1);
        self.store
            .borrow_mut()
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .borrow()
            .contains_key(&format!("{}::{}", namespace, key))
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig: every mock plus a service under test ─────────────────

pub struct Rig {
    pub link: MockLink,
    pub broker: MockBroker,
    pub relay: MockRelay,
    pub sensor: MockSensor,
    pub firmware: MockFirmware,
    pub system: MockSystem,
    pub sink: RecordingSink,
    pub nvs: MockNvs,
    pub service: DeviceService<MockNvs>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(DeviceConfig {
            master_pin: "123456".into(),
            ..Default::default()
        })
    }

    pub fn with_config(config: DeviceConfig) -> Self {
        Self::with_storage(config, MockNvs::new())
    }

    pub fn with_storage(config: DeviceConfig, nvs: MockNvs) -> Self {
        let mut sink = RecordingSink::default();
        let mut service = DeviceService::new(config, nvs.clone(), DEVICE_ID);
        service.start(&mut sink);
        Self {
            link: MockLink { up: true },
            broker: MockBroker::new(),
            relay: MockRelay::default(),
            sensor: MockSensor::default(),
            firmware: MockFirmware::default(),
            system: MockSystem::default(),
            sink,
            nvs,
            service,
        }
    }

    pub fn tick(&mut self, now: u64) {
        self.system.now = now;
        let mut ports = Ports {
            link: &self.link,
            broker: &mut self.broker,
            relay: &mut self.relay,
            sensor: &mut self.sensor,
            firmware: &mut self.firmware,
            system: &mut self.system,
        };
        self.service.tick(now, &mut ports, &mut self.sink);
    }

    /// Tick every `step` ms from `from` to `to` inclusive.
    pub fn run(&mut self, from: u64, to: u64, step: u64) {
        let mut t = from;
        while t <= to {
            self.tick(t);
            t += step;
        }
    }

    pub fn present(&mut self, pin: &str, now: u64) -> Option<portatec::access::AccessGrant> {
        self.system.now = now;
        let mut ports = Ports {
            link: &self.link,
            broker: &mut self.broker,
            relay: &mut self.relay,
            sensor: &mut self.sensor,
            firmware: &mut self.firmware,
            system: &mut self.system,
        };
        self.service
            .present_credential(pin, now, &mut ports, &mut self.sink)
    }

    /// Bring the channel up: attempt at `t`, handshake seen at `t + 10`.
    pub fn connect_at(&mut self, t: u64) {
        self.tick(t);
        self.tick(t + 10);
        assert!(self.service.channel().is_connected(), "channel did not connect");
    }

    pub fn sync_clock(&mut self, epoch: u64, now: u64) {
        self.service.sync_clock(epoch, now, &mut self.sink);
    }
}
