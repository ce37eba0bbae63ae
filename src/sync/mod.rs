//! Backend synchronisation over the message broker.
//!
//! [`SyncChannel`] keeps the broker session alive, turns inbound payloads
//! into [`Command`](messages::Command)s and applies them to the credential
//! store, the relay and the firmware primitive.

pub mod channel;
mod firmware;
pub mod messages;
pub mod topics;

pub use channel::{ConnectionState, InboundMessage, SyncChannel, INBOX_CAPACITY};

use crate::access::CredentialStore;
use crate::app::ports::{EventSink, Ports, StoragePort};
use crate::clock::ClockEstimator;
use crate::config::DeviceConfig;

/// Largest inbound payload the broker adapter forwards.
pub const MAX_PAYLOAD_BYTES: usize = 4096;

/// Everything the channel reads or mutates during one tick.
pub struct SyncContext<'c, 'p, S: StoragePort> {
    pub config: &'c DeviceConfig,
    pub store: &'c mut CredentialStore<S>,
    pub clock: &'c mut ClockEstimator,
    pub ports: &'c mut Ports<'p>,
    pub sink: &'c mut dyn EventSink,
}
