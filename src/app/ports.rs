//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DeviceService (domain)
//! ```
//!
//! Driven adapters (broker client, WiFi link, relay, sensor, OTA, NVS,
//! event sinks) implement these traits.  The
//! [`DeviceService`](super::service::DeviceService) receives them by
//! reference on every call, so the domain core never touches hardware
//! directly and every path is testable with recording mocks.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **StoragePort** implementations SHOULD keep the access-code namespace
//!   on the encrypted NVS partition.
//! - All port errors are typed; callers must handle every variant explicitly.

use crate::config::DeviceConfig;
use crate::error::TransportError;

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: WiFi station → domain)
// ───────────────────────────────────────────────────────────────

/// Link-layer availability.  The sync channel never consumes a reconnect
/// attempt while the link is down.
pub trait LinkPort {
    /// `true` once the station is associated and has an address.
    fn is_link_up(&self) -> bool;

    /// Signal strength of the current association, in dBm.
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: domain ↔ MQTT client)
// ───────────────────────────────────────────────────────────────

/// Events reported by the broker client, drained once per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// The session handshake completed.
    Connected,
    /// The session ended (remote close, network loss, keepalive failure).
    Disconnected,
    /// A complete message arrived on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },
}

/// Publish/subscribe client bound to one backend endpoint.
///
/// `connect` only *starts* the handshake; completion is reported later
/// through [`BrokerEvent::Connected`].
pub trait BrokerPort {
    /// Begin a session using `client_id`.
    fn connect(&mut self, client_id: &str) -> Result<(), TransportError>;

    /// Tear the session down.  Idempotent.
    fn disconnect(&mut self);

    /// Publish `payload` on `topic`.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Subscribe to `topic`.
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Take the next pending event, if any.
    fn poll_event(&mut self) -> Option<BrokerEvent>;
}

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → strike relay)
// ───────────────────────────────────────────────────────────────

/// The door/gate strike relay.  Polarity is a property of the adapter.
pub trait RelayPort {
    /// Energise the relay now and release it `duration_ms` later.
    fn pulse(&mut self, now_ms: u64, duration_ms: u32);

    /// Release the relay once the pulse deadline has passed.
    fn poll(&mut self, now_ms: u64);

    /// Whether the relay is currently energised.
    fn is_active(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: level input → domain)
// ───────────────────────────────────────────────────────────────

/// Optional digital level sensor (door contact, reed switch, ...).
pub trait SensorPort {
    /// Current level, or `None` when no sensor pin is configured.
    fn read_level(&mut self) -> Option<bool>;
}

// ───────────────────────────────────────────────────────────────
// Firmware port (driven adapter: domain → OTA partition)
// ───────────────────────────────────────────────────────────────

/// What the device was asked to flash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareRequest {
    pub url: String,
    pub version: Option<String>,
}

/// Result of one code-replacement attempt.  Every variant ends in a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOutcome {
    /// The new image was written and marked bootable.
    Success,
    /// Transfer or flash write failed.
    Failed,
    /// The server reported there is nothing newer.
    NoUpdate,
    /// The primitive returned without a recognisable result.
    Unknown,
}

impl FlashOutcome {
    /// Wire name used in the final acknowledgment.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::NoUpdate => "no_update",
            Self::Unknown => "unknown",
        }
    }
}

/// Blocking download-and-flash primitive.
pub trait FirmwarePort {
    fn download_and_flash(&mut self, request: &FirmwareRequest) -> FlashOutcome;
}

// ───────────────────────────────────────────────────────────────
// System port (driven adapter: domain → SoC services)
// ───────────────────────────────────────────────────────────────

/// Monotonic time, heap introspection, blocking delay and reset.
pub trait SystemPort {
    /// Milliseconds since boot.  May wrap; consumers use wrapping arithmetic.
    fn uptime_ms(&self) -> u64;

    /// Currently free heap in bytes.
    fn free_heap(&self) -> u32;

    /// Block the calling task.
    fn sleep_ms(&mut self, ms: u32);

    /// Reset the SoC.  Real hardware never returns.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists device configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`DeviceConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for the credential records.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic, with no partial writes on power loss.
///   ESP-IDF NVS commits guarantee this natively.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// Every collaborator the sync channel touches during one tick.
///
/// Borrowed for the duration of a single call; the service never stores it.
pub struct Ports<'a> {
    pub link: &'a dyn LinkPort,
    pub broker: &'a mut dyn BrokerPort,
    pub relay: &'a mut dyn RelayPort,
    pub sensor: &'a mut dyn SensorPort,
    pub firmware: &'a mut dyn FirmwarePort,
    pub system: &'a mut dyn SystemPort,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// The stored value does not fit the caller's buffer.
    TooLarge,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::TooLarge => write!(f, "value too large"),
        }
    }
}
