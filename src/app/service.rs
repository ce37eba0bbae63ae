//! Application service: the hexagonal core.
//!
//! [`DeviceService`] owns the clock estimator, the credential store and the
//! sync channel.  All I/O flows through port traits injected at call
//! sites, so the whole service runs against mock adapters on the host.
//!
//! ```text
//!   LinkPort ────▶ ┌────────────────────────┐ ──▶ BrokerPort
//!  SensorPort ───▶ │     DeviceService       │ ──▶ RelayPort
//!  SystemPort ◀──▶ │ Clock · Store · Channel │ ──▶ FirmwarePort
//!                  └────────────────────────┘ ──▶ EventSink
//! ```

use log::{info, warn};

use crate::access::{AccessGrant, CredentialStore};
use crate::clock::{ClockEstimator, Timestamp};
use crate::config::DeviceConfig;
use crate::sync::{SyncChannel, SyncContext};

use super::events::AppEvent;
use super::ports::{EventSink, Ports, StoragePort};

// ───────────────────────────────────────────────────────────────
// DeviceService
// ───────────────────────────────────────────────────────────────

pub struct DeviceService<S: StoragePort> {
    config: DeviceConfig,
    clock: ClockEstimator,
    store: CredentialStore<S>,
    channel: SyncChannel,
    last_purge_ms: u64,
}

impl<S: StoragePort> DeviceService<S> {
    /// Build the service and load persisted credentials from `storage`.
    pub fn new(config: DeviceConfig, storage: S, device_id: &str) -> Self {
        let store = CredentialStore::load(storage);
        let channel = SyncChannel::new(device_id, config.sync);
        Self {
            config,
            clock: ClockEstimator::new(),
            store,
            channel,
            last_purge_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        let credentials = self.store.len();
        sink.emit(&AppEvent::Started { credentials });
        info!(
            "DeviceService started as '{}' with {} credentials",
            self.channel.device_id(),
            credentials
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One cooperative cycle: release the relay if due, advance the sync
    /// channel, then purge expired credentials on schedule.
    pub fn tick(&mut self, now_ms: u64, ports: &mut Ports<'_>, sink: &mut impl EventSink) {
        ports.relay.poll(now_ms);

        let mut ctx = SyncContext {
            config: &self.config,
            store: &mut self.store,
            clock: &mut self.clock,
            ports: &mut *ports,
            sink: &mut *sink,
        };
        self.channel.tick(now_ms, &mut ctx);

        let since_purge = now_ms.wrapping_sub(self.last_purge_ms);
        if since_purge >= u64::from(self.config.sync.purge_interval_ms) {
            self.last_purge_ms = now_ms;
            match self.store.purge(self.clock.now(now_ms)) {
                Ok(0) => {}
                Ok(removed) => sink.emit(&AppEvent::CredentialsPurged { removed }),
                Err(e) => warn!("Access: purge failed: {}", e),
            }
        }
    }

    /// Feed an absolute time from a source other than the backend (SNTP).
    pub fn sync_clock(&mut self, epoch: Timestamp, now_ms: u64, sink: &mut impl EventSink) {
        self.clock.sync(epoch, now_ms);
        if self.clock.is_synced() {
            sink.emit(&AppEvent::ClockSynced { epoch });
        }
    }

    /// Check a PIN entered at the keypad, pulse the relay when it is
    /// accepted and report the attempt to the backend.
    pub fn present_credential(
        &mut self,
        presented: &str,
        now_ms: u64,
        ports: &mut Ports<'_>,
        sink: &mut impl EventSink,
    ) -> Option<AccessGrant> {
        let now = self.clock.now(now_ms);
        let grant = self.store.validate(presented, &self.config.master_pin, now);

        if grant.is_some() {
            let duration_ms = self.config.sync.pulse_duration_ms;
            ports.relay.pulse(now_ms, duration_ms);
            sink.emit(&AppEvent::RelayPulsed { duration_ms });
        }
        sink.emit(&AppEvent::AccessDecision { grant });
        self.channel
            .publish_access_event(now_ms, ports.broker, presented, grant.is_some(), now);
        grant
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn clock(&self) -> &ClockEstimator {
        &self.clock
    }

    pub fn store(&self) -> &CredentialStore<S> {
        &self.store
    }

    pub fn channel(&self) -> &SyncChannel {
        &self.channel
    }
}
