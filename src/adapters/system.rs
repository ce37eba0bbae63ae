//! SoC services: uptime, heap introspection, delays and reset.

use log::warn;

use super::time::TimeAdapter;
use crate::app::ports::SystemPort;

pub struct SystemAdapter {
    time: TimeAdapter,
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

impl Default for SystemAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self {
            time: TimeAdapter::new(),
            #[cfg(not(target_os = "espidf"))]
            restarts: 0,
        }
    }

    pub fn time(&self) -> &TimeAdapter {
        &self.time
    }

    /// Restart requests seen in simulation.
    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

impl SystemPort for SystemAdapter {
    fn uptime_ms(&self) -> u64 {
        self.time.uptime_ms()
    }

    #[cfg(target_os = "espidf")]
    fn free_heap(&self) -> u32 {
        // SAFETY: read-only heap statistics query.
        unsafe { esp_idf_sys::esp_get_free_heap_size() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn free_heap(&self) -> u32 {
        // Typical free heap of a connected ESP32 station.
        96 * 1024
    }

    #[cfg(target_os = "espidf")]
    fn sleep_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn sleep_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }

    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        warn!("System: restarting");
        // SAFETY: does not return.
        unsafe { esp_idf_sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        warn!("System(sim): restart requested, continuing without reset");
        self.restarts += 1;
    }
}
