//! Portatec firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter   MqttAdapter   RelayDriver   LevelSensor         │
//! │  (LinkPort)    (BrokerPort)  (RelayPort)   (SensorPort)        │
//! │  HttpFirmwareAdapter   SystemAdapter   NvsAdapter  LogEventSink│
//! │  (FirmwarePort)        (SystemPort)    (Storage)   (EventSink) │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            DeviceService (pure logic)                  │    │
//! │  │  ClockEstimator · CredentialStore · SyncChannel        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{AnyIOPin, PinDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::sntp::{EspSntp, SyncStatus};
use esp_idf_svc::wifi::EspWifi;

use portatec::adapters::device_id;
use portatec::adapters::firmware::{self, HttpFirmwareAdapter};
use portatec::adapters::log_sink::LogEventSink;
use portatec::adapters::mqtt::{BrokerSettings, MqttAdapter};
use portatec::adapters::nvs::NvsAdapter;
use portatec::adapters::system::SystemAdapter;
use portatec::adapters::wifi::WifiAdapter;
use portatec::app::ports::{ConfigPort, Ports, SensorPort, SystemPort};
use portatec::app::service::DeviceService;
use portatec::config::DeviceConfig;
use portatec::drivers::relay::RelayDriver;
use portatec::drivers::sensor::{LevelSensor, NoSensor};
use portatec::drivers::watchdog::Watchdog;

/// Main loop period.
const LOOP_PERIOD_MS: u32 = 50;

/// How often the estimator is re-anchored to the SNTP wall clock.
const SNTP_RESYNC_MS: u64 = 60 * 60 * 1000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Portatec v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    firmware::mark_running_image_valid();
    let watchdog = Watchdog::default();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. Config from NVS (or defaults) ──────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            DeviceConfig::default()
        }
    };

    let mac = device_id::read_mac();
    let dev_id = device_id::device_id(&mac);
    info!("Device ID: {} ({})", dev_id, config.device_name);

    // ── 3. Adapters ───────────────────────────────────────────
    let mut wifi = WifiAdapter::new(EspWifi::new(peripherals.modem, sysloop, None)?);
    if let Err(e) = wifi.set_credentials(&config.wifi_ssid, &config.wifi_password) {
        warn!("WiFi: {}, staying offline until reconfigured", e);
    }

    let mut broker = MqttAdapter::new(BrokerSettings {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_user.clone(),
        password: config.mqtt_password.clone(),
    });

    // SAFETY: pin numbers come from the validated config and are not
    // claimed by any other driver in this firmware.
    let relay_pin = PinDriver::output(unsafe { AnyIOPin::new(i32::from(config.pulse_pin)) })?;
    let mut relay = RelayDriver::new(relay_pin, config.pulse_inverted);

    let mut sensor: Box<dyn SensorPort> = if config.has_sensor() {
        // SAFETY: as above.
        let pin = PinDriver::input(unsafe { AnyIOPin::new(i32::from(config.sensor_pin)) })?;
        Box::new(LevelSensor::new(pin))
    } else {
        Box::new(NoSensor)
    };

    let mut fw = HttpFirmwareAdapter::new();
    let mut system = SystemAdapter::new();
    let mut sink = LogEventSink::new();
    let sntp = EspSntp::new_default()?;

    // ── 4. Application service ────────────────────────────────
    let mut service = DeviceService::new(config, nvs, &dev_id);
    service.start(&mut sink);

    info!("System ready. Entering main loop.");
    let mut last_sntp_sync: Option<u64> = None;

    loop {
        let now = system.uptime_ms();
        wifi.poll(now);

        let resync_due = last_sntp_sync.is_none_or(|t| now.wrapping_sub(t) >= SNTP_RESYNC_MS);
        if resync_due && sntp.get_sync_status() == SyncStatus::Completed {
            if let Some(epoch) = system.time().wall_clock() {
                service.sync_clock(epoch, now, &mut sink);
                last_sntp_sync = Some(now);
            }
        }

        {
            let mut ports = Ports {
                link: &wifi,
                broker: &mut broker,
                relay: &mut relay,
                sensor: sensor.as_mut(),
                firmware: &mut fw,
                system: &mut system,
            };
            service.tick(now, &mut ports, &mut sink);
        }

        watchdog.feed();
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
