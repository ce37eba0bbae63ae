//! Device identity derived from the ESP32 factory MAC address.
//!
//! The id has the form `ptc-xxyyzz` (last 3 bytes of the 6-byte MAC in
//! lowercase hex).  It is stable across reboots and doubles as the MQTT
//! client id and the topic prefix.

use core::fmt::Write;

/// Fixed-size device id string.
pub type DeviceIdString = heapless::String<16>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: `mac` is a 6-byte buffer, as the call requires.
    let ret = unsafe { esp_idf_sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) };
    if ret != esp_idf_sys::ESP_OK as i32 {
        log::warn!("DeviceId: eFuse MAC read failed ({})", ret);
    }
    mac
}

/// Simulation: a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "ptc-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    id
}
