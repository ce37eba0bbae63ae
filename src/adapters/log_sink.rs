//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per
//! application event to the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::access::AccessGrant;
use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { credentials } => {
                info!("START | credentials={}", credentials);
            }
            AppEvent::ConnectionChanged { from, to } => {
                info!("LINK  | {:?} -> {:?}", from, to);
            }
            AppEvent::ClockSynced { epoch } => {
                info!("CLOCK | synced epoch={}", epoch);
            }
            AppEvent::AccessDecision { grant } => match grant {
                Some(g @ AccessGrant::Master) => info!("ACCESS| granted id={} (master)", g.wire_id()),
                Some(g) => info!("ACCESS| granted id={}", g.wire_id()),
                None => warn!("ACCESS| denied"),
            },
            AppEvent::RelayPulsed { duration_ms } => {
                info!("RELAY | pulse {} ms", duration_ms);
            }
            AppEvent::CredentialsSynced { accepted, skipped } => {
                info!("CODES | synced accepted={} skipped={}", accepted, skipped);
            }
            AppEvent::CredentialsPurged { removed } => {
                info!("CODES | purged {}", removed);
            }
            AppEvent::CredentialChanged { id, removed } => {
                info!("CODES | id={} {}", id, if *removed { "removed" } else { "stored" });
            }
            AppEvent::UnknownAction => {
                info!("CMD   | unknown action");
            }
            AppEvent::FirmwareRejected { reason } => {
                warn!("OTA   | rejected: {}", reason);
            }
            AppEvent::FirmwareFlashed(outcome) => {
                info!("OTA   | finished: {}", outcome.as_str());
            }
        }
    }
}
