//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements    | Connects to                    |
//! |-------------|---------------|--------------------------------|
//! | `firmware`  | FirmwarePort  | HTTP client + OTA partitions   |
//! | `log_sink`  | EventSink     | Serial log output              |
//! | `mqtt`      | BrokerPort    | ESP-IDF MQTT client            |
//! | `nvs`       | ConfigPort    | NVS / in-memory store          |
//! |             | StoragePort   |                                |
//! | `system`    | SystemPort    | Heap stats, FreeRTOS, reset    |
//! | `time`      |               | esp_timer, SNTP wall clock     |
//! | `wifi`      | LinkPort      | ESP-IDF WiFi STA               |
//!
//! The relay and sensor ports are implemented by [`crate::drivers`].

pub mod device_id;
pub mod firmware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod system;
pub mod time;
pub mod wifi;
