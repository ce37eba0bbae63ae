//! Backend connection state machine and command dispatcher.
//!
//! ```text
//!                 link up && reconnect interval elapsed
//!   Disconnected ─────────────────────────────────────▶ Connecting
//!        ▲   ▲                                            │    │
//!        │   └──── handshake failed / timed out ──────────┘    │ handshake ok
//!        │                                                     ▼
//!        └──── liveness timeout / transport dropped ──────  Connected
//! ```
//!
//! Every tick:
//! 1. drain broker events (handshake results, messages into the inbox),
//! 2. advance the state machine,
//! 3. when connected, publish the heartbeat if due and dispatch at most
//!    one queued message.
//!
//! All timers run on uptime milliseconds with wrapping arithmetic; the
//! estimated absolute time is never used for connection management.

use heapless::Deque;
use log::{debug, info, warn};
use serde::Serialize;

use super::messages::{
    self, AccessCodesAck, AccessEventReport, Ack, Command, CommandHeader, StatusReport,
};
use super::topics::{Inbound, Outbound, Topics};
use super::SyncContext;
use crate::app::events::AppEvent;
use crate::app::ports::{BrokerEvent, BrokerPort, EventSink, StoragePort};
use crate::clock::Timestamp;
use crate::config::SyncSettings;
use crate::error::{ProtocolError, TransportError};

/// Queued inbound messages awaiting dispatch.
pub const INBOX_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// A message received from the broker, not yet decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub kind: Inbound,
    pub payload: Vec<u8>,
}

pub struct SyncChannel {
    device_id: heapless::String<16>,
    topics: Topics,
    pub(super) settings: SyncSettings,
    state: ConnectionState,
    /// Uptime of the last connection attempt; `None` allows an immediate one.
    last_attempt_ms: Option<u64>,
    connecting_since_ms: u64,
    last_exchange_ms: u64,
    last_heartbeat_ms: u64,
    inbox: Deque<InboundMessage, INBOX_CAPACITY>,
}

impl SyncChannel {
    pub fn new(device_id: &str, settings: SyncSettings) -> Self {
        let mut id = heapless::String::new();
        for c in device_id.chars() {
            if id.push(c).is_err() {
                warn!("Sync: device id '{}' truncated", device_id);
                break;
            }
        }
        let topics = Topics::for_device(&id);
        Self {
            device_id: id,
            topics,
            settings,
            state: ConnectionState::Disconnected,
            last_attempt_ms: None,
            connecting_since_ms: 0,
            last_exchange_ms: 0,
            last_heartbeat_ms: 0,
            inbox: Deque::new(),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Messages waiting for dispatch.
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    // ── Per-tick driver ───────────────────────────────────────

    pub fn tick<S: StoragePort>(&mut self, now_ms: u64, ctx: &mut SyncContext<'_, '_, S>) {
        self.pump_events(now_ms, ctx);

        match self.state {
            ConnectionState::Disconnected => self.try_connect(now_ms, ctx),
            ConnectionState::Connecting => {
                let waited = now_ms.wrapping_sub(self.connecting_since_ms);
                if waited >= u64::from(self.settings.connect_timeout_ms) {
                    warn!("Sync: handshake timed out after {} ms", waited);
                    ctx.ports.broker.disconnect();
                    self.set_state(ConnectionState::Disconnected, ctx.sink);
                }
            }
            ConnectionState::Connected => {
                let silent = now_ms.wrapping_sub(self.last_exchange_ms);
                if silent > u64::from(self.settings.liveness_timeout_ms) {
                    warn!("Sync: no traffic for {} ms, forcing disconnect", silent);
                    ctx.ports.broker.disconnect();
                    self.set_state(ConnectionState::Disconnected, ctx.sink);
                    return;
                }
                let since_heartbeat = now_ms.wrapping_sub(self.last_heartbeat_ms);
                if since_heartbeat >= u64::from(self.settings.heartbeat_interval_ms) {
                    self.last_heartbeat_ms = now_ms;
                    self.publish_status(now_ms, ctx);
                }
                if let Some(msg) = self.inbox.pop_front() {
                    self.dispatch(now_ms, msg, ctx);
                }
            }
        }
    }

    /// Drain every pending broker event.
    pub(super) fn pump_events<S: StoragePort>(
        &mut self,
        now_ms: u64,
        ctx: &mut SyncContext<'_, '_, S>,
    ) {
        while let Some(event) = ctx.ports.broker.poll_event() {
            match event {
                BrokerEvent::Connected => match self.state {
                    ConnectionState::Connecting => self.enter_connected(now_ms, ctx),
                    ConnectionState::Connected => {}
                    ConnectionState::Disconnected => {
                        debug!("Sync: late handshake ignored");
                    }
                },
                BrokerEvent::Disconnected => {
                    if self.state != ConnectionState::Disconnected {
                        info!("Sync: transport reported disconnection");
                        self.set_state(ConnectionState::Disconnected, ctx.sink);
                    }
                }
                BrokerEvent::Message { topic, payload } => {
                    let Some(kind) = self.topics.classify(&topic) else {
                        warn!("Sync: {} '{}', message dropped", ProtocolError::UnknownTopic, topic);
                        continue;
                    };
                    self.last_exchange_ms = now_ms;
                    if self.inbox.push_back(InboundMessage { kind, payload }).is_err() {
                        warn!("Sync: inbox full, dropping {:?} message", kind);
                    }
                }
            }
        }
    }

    fn try_connect<S: StoragePort>(&mut self, now_ms: u64, ctx: &mut SyncContext<'_, '_, S>) {
        if !ctx.ports.link.is_link_up() {
            return;
        }
        if let Some(last) = self.last_attempt_ms {
            if now_ms.wrapping_sub(last) < u64::from(self.settings.reconnect_interval_ms) {
                return;
            }
        }
        self.last_attempt_ms = Some(now_ms);
        info!("Sync: connecting as '{}'", self.device_id);
        match ctx.ports.broker.connect(&self.device_id) {
            Ok(()) => {
                self.connecting_since_ms = now_ms;
                self.set_state(ConnectionState::Connecting, ctx.sink);
            }
            Err(e) => warn!("Sync: connect failed: {}", e),
        }
    }

    fn enter_connected<S: StoragePort>(&mut self, now_ms: u64, ctx: &mut SyncContext<'_, '_, S>) {
        self.set_state(ConnectionState::Connected, ctx.sink);
        self.last_attempt_ms = None;
        self.last_exchange_ms = now_ms;
        self.last_heartbeat_ms = now_ms;

        for kind in [Inbound::Command, Inbound::AccessSync] {
            let topic = self.topics.inbound(kind);
            if let Err(e) = ctx.ports.broker.subscribe(topic) {
                warn!("Sync: subscribe to '{}' failed: {}", topic, e);
            }
        }
        self.publish_status(now_ms, ctx);
    }

    /// Tear the session down locally.
    pub(super) fn teardown(&mut self, broker: &mut dyn BrokerPort, sink: &mut dyn EventSink) {
        broker.disconnect();
        self.set_state(ConnectionState::Disconnected, sink);
    }

    /// Forget the reconnect timer so the next attempt may start at once.
    pub(super) fn allow_immediate_attempt(&mut self) {
        self.last_attempt_ms = None;
    }

    /// Attempt a connection right now if the state machine allows it.
    pub(super) fn try_connect_now<S: StoragePort>(
        &mut self,
        now_ms: u64,
        ctx: &mut SyncContext<'_, '_, S>,
    ) {
        if self.state == ConnectionState::Disconnected {
            self.try_connect(now_ms, ctx);
        }
    }

    fn set_state(&mut self, to: ConnectionState, sink: &mut dyn EventSink) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        info!("Sync: {:?} -> {:?}", from, to);
        sink.emit(&AppEvent::ConnectionChanged { from, to });
    }

    // ── Outbound ──────────────────────────────────────────────

    /// Serialise and publish `msg`.  A successful publish counts as traffic
    /// for the liveness timer.
    pub(super) fn send<T: Serialize>(
        &mut self,
        now_ms: u64,
        broker: &mut dyn BrokerPort,
        kind: Outbound,
        msg: &T,
    ) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        let bytes = serde_json::to_vec(msg).map_err(|_| TransportError::PublishFailed)?;
        let topic = self.topics.outbound(kind);
        match broker.publish(topic, &bytes) {
            Ok(()) => {
                self.last_exchange_ms = now_ms;
                Ok(())
            }
            Err(e) => {
                warn!("Sync: publish to '{}' failed: {}", topic, e);
                Err(e)
            }
        }
    }

    fn publish_status<S: StoragePort>(&mut self, now_ms: u64, ctx: &mut SyncContext<'_, '_, S>) {
        let cfg = ctx.config;
        let sensor_value = if cfg.has_sensor() {
            ctx.ports.sensor.read_level().map(u8::from)
        } else {
            None
        };
        let device_id = self.device_id.clone();
        let report = StatusReport {
            device_id: &device_id,
            uptime: now_ms / 1000,
            rssi: ctx.ports.link.rssi(),
            firmware_version: env!("CARGO_PKG_VERSION"),
            device_name: &cfg.device_name,
            pulse_pin: cfg.pulse_pin,
            sensor_pin: cfg.sensor_pin,
            pulse_inverted: cfg.pulse_inverted,
            sensor_value,
            clock_synced: ctx.clock.is_synced(),
            access_codes: ctx.store.len(),
        };
        let _ = self.send(now_ms, ctx.ports.broker, Outbound::Status, &report);
    }

    /// Report one access attempt.  Dropped when not connected.
    pub fn publish_access_event(
        &mut self,
        now_ms: u64,
        broker: &mut dyn BrokerPort,
        presented: &str,
        granted: bool,
        device_time: Option<Timestamp>,
    ) {
        if !self.is_connected() {
            debug!("Sync: offline, access event not sent");
            return;
        }
        let report = AccessEventReport {
            pin: presented,
            result: if granted { "valid" } else { "invalid" },
            timestamp_device: device_time,
        };
        let _ = self.send(now_ms, broker, Outbound::Event, &report);
    }

    // ── Dispatch ──────────────────────────────────────────────

    fn dispatch<S: StoragePort>(
        &mut self,
        now_ms: u64,
        msg: InboundMessage,
        ctx: &mut SyncContext<'_, '_, S>,
    ) {
        self.last_exchange_ms = now_ms;

        let envelope = match messages::decode(&msg.payload) {
            Ok(envelope) => envelope,
            Err(rejected) => {
                warn!("Sync: {:?} message rejected: {}", msg.kind, rejected.error);
                if let Some(header) = rejected.header {
                    self.ack_invalid(now_ms, &header, ctx);
                }
                return;
            }
        };
        let header = envelope.header;
        debug!("Sync: dispatching '{}' ({})", header.action, header.command_id);

        match envelope.command {
            Command::Pulse(kind) => {
                let duration = self.settings.pulse_duration_ms;
                info!("Sync: {:?} for {} ms", kind, duration);
                ctx.ports.relay.pulse(now_ms, duration);
                ctx.sink.emit(&AppEvent::RelayPulsed {
                    duration_ms: duration,
                });
                let ack = Ack::new(&header).with_pin(ctx.config.pulse_pin);
                let _ = self.send(now_ms, ctx.ports.broker, Outbound::Ack, &ack);
            }
            Command::UpdateFirmware { url, version } => {
                self.run_firmware_update(now_ms, &header, url, version, ctx);
            }
            Command::SyncAccessCodes {
                entries,
                server_time,
            } => {
                if let Some(epoch) = server_time {
                    ctx.clock.sync(epoch, now_ms);
                    ctx.sink.emit(&AppEvent::ClockSynced { epoch });
                }
                let (status, summary) = match ctx.store.replace_all(entries) {
                    Ok(summary) => {
                        ctx.sink.emit(&AppEvent::CredentialsSynced {
                            accepted: summary.accepted,
                            skipped: summary.skipped,
                        });
                        ("ok", Some(summary))
                    }
                    Err(e) => {
                        warn!("Sync: credential replace failed: {}", e);
                        ("error", None)
                    }
                };
                let ack = AccessCodesAck {
                    action: &header.action,
                    command_id: &header.command_id,
                    accepted: summary.map(|s| s.accepted),
                    skipped: summary.map(|s| s.skipped),
                    id: None,
                    status,
                };
                let _ = self.send(now_ms, ctx.ports.broker, Outbound::AccessAck, &ack);
            }
            Command::UpsertAccessCode(draft) => {
                let id = draft.id;
                let status = match draft.resolve() {
                    None => {
                        warn!("Sync: access code {:?} has an unresolvable window", id);
                        "error"
                    }
                    Some(credential) => {
                        let cid = credential.id;
                        match ctx.store.upsert(credential) {
                            Ok(()) => {
                                ctx.sink.emit(&AppEvent::CredentialChanged {
                                    id: cid,
                                    removed: false,
                                });
                                "ok"
                            }
                            Err(e) => {
                                warn!("Sync: upsert of {} failed: {}", cid, e);
                                "error"
                            }
                        }
                    }
                };
                self.ack_access(now_ms, &header, id, status, ctx.ports.broker);
            }
            Command::DeleteAccessCode { id } => {
                let status = match ctx.store.remove(id) {
                    Ok(removed) => {
                        if removed {
                            ctx.sink.emit(&AppEvent::CredentialChanged { id, removed: true });
                        }
                        "ok"
                    }
                    Err(e) => {
                        warn!("Sync: removal of {} failed: {}", id, e);
                        "error"
                    }
                };
                self.ack_access(now_ms, &header, Some(id), status, ctx.ports.broker);
            }
            Command::Unrecognized => {
                info!("Sync: unknown action '{}'", header.action);
                ctx.sink.emit(&AppEvent::UnknownAction);
                let _ = self.send(now_ms, ctx.ports.broker, Outbound::Ack, &Ack::new(&header));
            }
        }
    }

    fn ack_access(
        &mut self,
        now_ms: u64,
        header: &CommandHeader,
        id: Option<i64>,
        status: &str,
        broker: &mut dyn BrokerPort,
    ) {
        let ack = AccessCodesAck {
            action: &header.action,
            command_id: &header.command_id,
            accepted: None,
            skipped: None,
            id,
            status,
        };
        let _ = self.send(now_ms, broker, Outbound::AccessAck, &ack);
    }

    /// Known action, unusable parameters.
    fn ack_invalid<S: StoragePort>(
        &mut self,
        now_ms: u64,
        header: &CommandHeader,
        ctx: &mut SyncContext<'_, '_, S>,
    ) {
        if header.action.ends_with("access_code") || header.action == "sync_access_codes" {
            self.ack_access(now_ms, header, None, "error", ctx.ports.broker);
        } else {
            let ack = Ack::new(header).with_error("invalid_params");
            let _ = self.send(now_ms, ctx.ports.broker, Outbound::Ack, &ack);
        }
    }
}
