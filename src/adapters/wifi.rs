//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`]: the sync channel only asks whether the link is
//! up and how strong it is.  Association and retries are driven from the
//! main loop through [`WifiAdapter::poll`], which never blocks.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` in STA mode.
//! - **all other targets**: a simulated link for host-side tests.
//!
//! ## Reconnection policy
//!
//! After a failed or lost association the adapter waits an exponential
//! backoff (2 s → 4 s → 8 s … capped at 60 s) before retrying.

use core::fmt;
use log::{info, warn};

use crate::app::ports::LinkPort;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    Driver,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::Driver => write!(f, "WiFi driver error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Backoff { attempt: u32 },
}

const INITIAL_BACKOFF_MS: u64 = 2_000;
const MAX_BACKOFF_MS: u64 = 60_000;
/// Association + DHCP budget per attempt.
const ASSOCIATE_TIMEOUT_MS: u64 = 15_000;

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), WifiError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(WifiError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), WifiError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(WifiError::InvalidPassword);
    }
    Ok(())
}

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    attempts: u32,
    backoff_ms: u64,
    last_attempt_ms: u64,
    last_rssi: Option<i8>,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self {
            wifi,
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            attempts: 0,
            backoff_ms: INITIAL_BACKOFF_MS,
            last_attempt_ms: 0,
            last_rssi: None,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            sim_link_up: false,
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            attempts: 0,
            backoff_ms: INITIAL_BACKOFF_MS,
            last_attempt_ms: 0,
            last_rssi: None,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Validate and apply station credentials.  Takes effect on the next
    /// association attempt.
    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| WifiError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|_| WifiError::InvalidPassword)?;
        self.platform_configure()?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    /// Advance association and retry timers.  Call once per loop tick.
    pub fn poll(&mut self, now_ms: u64) {
        let since_attempt = now_ms.wrapping_sub(self.last_attempt_ms);
        match self.state {
            WifiState::Disconnected => {
                if !self.ssid.is_empty() {
                    self.start_attempt(now_ms);
                }
            }
            WifiState::Connecting => {
                if self.platform_is_up() {
                    self.state = WifiState::Connected;
                    self.attempts = 0;
                    self.backoff_ms = INITIAL_BACKOFF_MS;
                    self.last_rssi = self.platform_rssi();
                    info!("WiFi: connected (RSSI={:?})", self.last_rssi);
                } else if since_attempt >= ASSOCIATE_TIMEOUT_MS {
                    warn!("WiFi: association timed out");
                    self.platform_disconnect();
                    self.enter_backoff();
                }
            }
            WifiState::Backoff { attempt } => {
                if since_attempt >= self.backoff_ms {
                    info!("WiFi: reconnect attempt {} (backoff {} ms)", attempt, self.backoff_ms);
                    self.start_attempt(now_ms);
                }
            }
            WifiState::Connected => {
                if self.platform_is_up() {
                    self.last_rssi = self.platform_rssi();
                } else {
                    warn!("WiFi: connection lost");
                    self.last_rssi = None;
                    self.last_attempt_ms = now_ms;
                    self.backoff_ms = INITIAL_BACKOFF_MS;
                    self.state = WifiState::Backoff { attempt: 0 };
                }
            }
        }
    }

    fn start_attempt(&mut self, now_ms: u64) {
        self.last_attempt_ms = now_ms;
        match self.platform_connect() {
            Ok(()) => self.state = WifiState::Connecting,
            Err(e) => {
                warn!("WiFi: connect failed: {}", e);
                self.enter_backoff();
            }
        }
    }

    fn enter_backoff(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
        self.backoff_ms = (INITIAL_BACKOFF_MS << self.attempts.min(5)).min(MAX_BACKOFF_MS);
        self.state = WifiState::Backoff {
            attempt: self.attempts,
        };
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_configure(&mut self) -> Result<(), WifiError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let conf = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.clone(),
            password: self.password.clone(),
            auth_method,
            ..Default::default()
        });
        self.wifi.set_configuration(&conf).map_err(|e| {
            warn!("WiFi: set_configuration failed: {:?}", e);
            WifiError::Driver
        })?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| WifiError::Driver)?;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_configure(&mut self) -> Result<(), WifiError> {
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        info!("WiFi: connecting to '{}'", self.ssid);
        self.wifi.connect().map_err(|_| WifiError::Driver)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), WifiError> {
        if self.ssid.is_empty() {
            return Err(WifiError::NoCredentials);
        }
        info!("WiFi(sim): connected to '{}'", self.ssid);
        self.sim_link_up = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        let _ = self.wifi.disconnect();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_link_up = false;
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_up(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_up(&self) -> bool {
        self.sim_link_up
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: `ap_info` is a valid out-pointer for the duration of the call.
        let ret = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == esp_idf_svc::sys::ESP_OK as i32).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        self.sim_link_up.then_some(-60)
    }

    /// Simulate the access point going away.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_link_up = false;
    }
}

impl LinkPort for WifiAdapter {
    fn is_link_up(&self) -> bool {
        self.state == WifiState::Connected
    }

    fn rssi(&self) -> Option<i8> {
        self.last_rssi
    }
}
