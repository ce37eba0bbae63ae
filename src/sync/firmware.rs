//! Firmware replacement orchestration.
//!
//! The transfer needs the heap the broker session holds, so the session is
//! torn down first and only brought back afterwards to report the result.
//! Every attempt that reaches the flash primitive ends in a restart.

use log::{error, info, warn};

use super::SyncChannel;
use super::SyncContext;
use super::channel::ConnectionState;
use super::messages::{Ack, CommandHeader};
use super::topics::Outbound;
use crate::app::events::AppEvent;
use crate::app::ports::{FirmwareRequest, StoragePort};

/// Poll period while waiting for the broker to come back.
const RECONNECT_POLL_MS: u32 = 100;

impl SyncChannel {
    pub(super) fn run_firmware_update<S: StoragePort>(
        &mut self,
        now_ms: u64,
        header: &CommandHeader,
        url: Option<String>,
        version: Option<String>,
        ctx: &mut SyncContext<'_, '_, S>,
    ) {
        let url = match url.filter(|u| !u.is_empty()) {
            Some(u) => u,
            None if !ctx.config.firmware_url.is_empty() => ctx.config.firmware_url.clone(),
            None => {
                warn!("OTA: no image URL available");
                let ack = Ack::new(header).with_error("missing_url");
                let _ = self.send(now_ms, ctx.ports.broker, Outbound::Ack, &ack);
                return;
            }
        };

        info!("OTA: update requested from {} ({:?})", url, version);
        self.teardown(ctx.ports.broker, ctx.sink);

        let free = ctx.ports.system.free_heap();
        let floor = self.settings.min_free_heap_bytes;
        if free < floor {
            warn!("OTA: {} bytes free, {} required; update aborted", free, floor);
            ctx.sink.emit(&AppEvent::FirmwareRejected {
                reason: "insufficient_memory",
            });
            if self.reconnect_blocking(ctx) {
                let ack = Ack::new(header)
                    .with_error("insufficient_memory")
                    .with_free_heap(free);
                let now = ctx.ports.system.uptime_ms();
                let _ = self.send(now, ctx.ports.broker, Outbound::Ack, &ack);
            }
            return;
        }

        let request = FirmwareRequest { url, version };
        let outcome = ctx.ports.firmware.download_and_flash(&request);
        info!("OTA: flash finished: {}", outcome.as_str());
        ctx.sink.emit(&AppEvent::FirmwareFlashed(outcome));

        if self.reconnect_blocking(ctx) {
            let ack = Ack::new(header).with_status(outcome.as_str());
            let now = ctx.ports.system.uptime_ms();
            let _ = self.send(now, ctx.ports.broker, Outbound::Ack, &ack);
        } else {
            error!("OTA: could not report outcome, restarting anyway");
        }
        ctx.ports.system.restart();
    }

    /// Bring the session back within one connect timeout.  Returns whether
    /// the channel ended up connected.
    fn reconnect_blocking<S: StoragePort>(&mut self, ctx: &mut SyncContext<'_, '_, S>) -> bool {
        let started = ctx.ports.system.uptime_ms();
        let budget = u64::from(self.settings.connect_timeout_ms);
        self.allow_immediate_attempt();

        loop {
            let now = ctx.ports.system.uptime_ms();
            self.pump_events(now, ctx);
            match self.state() {
                ConnectionState::Connected => return true,
                ConnectionState::Disconnected => self.try_connect_now(now, ctx),
                ConnectionState::Connecting => {}
            }
            if self.state() == ConnectionState::Connected {
                return true;
            }
            if now.wrapping_sub(started) >= budget {
                warn!("OTA: broker did not come back within {} ms", budget);
                return false;
            }
            ctx.ports.system.sleep_ms(RECONNECT_POLL_MS);
        }
    }
}
