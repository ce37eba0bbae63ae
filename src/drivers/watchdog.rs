//! Task watchdog (TWDT).
//!
//! Resets the controller when the main loop stops feeding it, e.g. when a
//! blocking firmware transfer or a broker call hangs.  The main loop calls
//! [`Watchdog::feed`] once per tick.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

/// Default reset timeout.  Must exceed the longest blocking step of the
/// loop: an image transfer followed by the reconnect-for-report wait.
pub const DEFAULT_TIMEOUT_MS: u32 = 120_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    timeout_ms: u32,
}

impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: plain ESP-IDF calls with a valid config struct; the null
            // task handle means "current task".
            let subscribed = unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK as i32 {
                    log::warn!("Watchdog: reconfigure returned {}", ret);
                }
                esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK as i32
            };
            if subscribed {
                info!("Watchdog: subscribed ({} ms timeout)", timeout_ms);
            } else {
                log::warn!("Watchdog: failed to subscribe main task");
            }
            Self {
                subscribed,
                timeout_ms,
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): {} ms timeout, no-op", timeout_ms);
            Self { timeout_ms }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: the task was subscribed in `new`.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}
