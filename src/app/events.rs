//! Outbound application events.
//!
//! The [`DeviceService`](super::service::DeviceService) and the sync channel
//! emit these through the [`EventSink`](super::ports::EventSink) port.
//! Adapters on the other side decide what to do with them, such as logging
//! to serial or counting them in a test.

use crate::access::AccessGrant;
use crate::app::ports::FlashOutcome;
use crate::sync::ConnectionState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started (carries the number of stored credentials).
    Started { credentials: usize },

    /// The sync channel moved between connection states.
    ConnectionChanged {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// The absolute clock was (re)synchronised.
    ClockSynced { epoch: u64 },

    /// A presented credential was checked.
    AccessDecision { grant: Option<AccessGrant> },

    /// The relay was pulsed.
    RelayPulsed { duration_ms: u32 },

    /// A full credential list replaced the store.
    CredentialsSynced { accepted: usize, skipped: usize },

    /// Expired credentials were removed.
    CredentialsPurged { removed: usize },

    /// A single credential was created, updated or removed.
    CredentialChanged { id: i64, removed: bool },

    /// An inbound command carried an action the device does not know.
    UnknownAction,

    /// A firmware update was refused before download.
    FirmwareRejected { reason: &'static str },

    /// A firmware update attempt finished; a restart follows.
    FirmwareFlashed(FlashOutcome),
}
