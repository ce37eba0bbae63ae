//! Device configuration parameters
//!
//! All tunable parameters for the Portatec controller.
//! Values are persisted in NVS through the [`ConfigPort`](crate::app::ports::ConfigPort)
//! and validated before every save.

use serde::{Deserialize, Serialize};

/// Sentinel pin number meaning "no pin configured".
pub const UNCONFIGURED_PIN: u8 = 255;

/// Core device configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Identity ---
    /// Human-readable name reported in status snapshots
    pub device_name: String,
    /// Master PIN; always valid, checked before temporary credentials.
    /// Empty disables the master credential.
    pub master_pin: String,

    // --- I/O ---
    /// GPIO driving the strike relay
    pub pulse_pin: u8,
    /// GPIO of the optional level sensor ([`UNCONFIGURED_PIN`] = none)
    pub sensor_pin: u8,
    /// Relay is active-low when set
    pub pulse_inverted: bool,

    // --- Network ---
    pub wifi_ssid: String,
    pub wifi_password: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_password: String,
    /// Fallback image URL for `update_firmware` commands without one
    pub firmware_url: String,

    // --- Sync channel timing ---
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Timers and limits of the sync channel and its collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Status heartbeat period while connected (milliseconds)
    pub heartbeat_interval_ms: u32,
    /// Silence after which a connected session is forced down (milliseconds)
    pub liveness_timeout_ms: u32,
    /// Fixed wait between connection attempts (milliseconds)
    pub reconnect_interval_ms: u32,
    /// Handshake budget for one connection attempt (milliseconds)
    pub connect_timeout_ms: u32,
    /// Relay pulse length (milliseconds)
    pub pulse_duration_ms: u32,
    /// Expired-credential purge period (milliseconds)
    pub purge_interval_ms: u32,
    /// Minimum free heap required to start a firmware download (bytes)
    pub min_free_heap_bytes: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 30_000,
            liveness_timeout_ms: 90_000,
            reconnect_interval_ms: 5_000,
            connect_timeout_ms: 10_000,
            pulse_duration_ms: 1_000,
            purge_interval_ms: 60_000,
            min_free_heap_bytes: 40 * 1024,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_name: "ESP-PORTATEC".into(),
            master_pin: String::new(),

            pulse_pin: crate::pins::RELAY_GPIO,
            sensor_pin: UNCONFIGURED_PIN,
            pulse_inverted: false,

            wifi_ssid: String::new(),
            wifi_password: String::new(),
            mqtt_host: String::new(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_password: String::new(),
            firmware_url: String::new(),

            sync: SyncSettings::default(),
        }
    }
}

impl DeviceConfig {
    /// Whether an optional sensor pin is wired.
    pub fn has_sensor(&self) -> bool {
        self.sensor_pin != UNCONFIGURED_PIN
    }

    /// Range-check every field.  Used by [`ConfigPort::save`](crate::app::ports::ConfigPort::save).
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.device_name.is_empty() || self.device_name.len() > 31 {
            return Err("device_name must be 1–31 bytes");
        }
        if !self.master_pin.is_empty()
            && (self.master_pin.len() > 6 || !self.master_pin.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err("master_pin must be up to 6 digits");
        }
        if self.pulse_pin == UNCONFIGURED_PIN {
            return Err("pulse_pin must be configured");
        }
        if self.has_sensor() && self.sensor_pin == self.pulse_pin {
            return Err("sensor_pin must differ from pulse_pin");
        }
        if self.mqtt_port == 0 {
            return Err("mqtt_port must be non-zero");
        }
        let s = &self.sync;
        if !(1_000..=600_000).contains(&s.heartbeat_interval_ms) {
            return Err("heartbeat_interval_ms must be 1000–600000");
        }
        if s.liveness_timeout_ms <= s.heartbeat_interval_ms {
            return Err("liveness_timeout_ms must exceed heartbeat_interval_ms");
        }
        if !(500..=300_000).contains(&s.reconnect_interval_ms) {
            return Err("reconnect_interval_ms must be 500–300000");
        }
        if !(1_000..=60_000).contains(&s.connect_timeout_ms) {
            return Err("connect_timeout_ms must be 1000–60000");
        }
        if !(50..=30_000).contains(&s.pulse_duration_ms) {
            return Err("pulse_duration_ms must be 50–30000");
        }
        if s.purge_interval_ms < 1_000 {
            return Err("purge_interval_ms must be at least 1000");
        }
        Ok(())
    }
}
