//! Time sources.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` for uptime and the
//!   SNTP-disciplined system clock (`gettimeofday`) for wall time.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` / `SystemTime`.

use crate::clock::Timestamp;

/// Anything earlier means the wall clock has not been set yet.
const EPOCH_2020: u64 = 1_577_836_800;

pub struct TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        // SAFETY: reads the monotonic high-resolution timer.
        (unsafe { esp_idf_sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Seconds since the Unix epoch, or `None` before SNTP has set the clock.
    #[cfg(target_os = "espidf")]
    pub fn wall_clock(&self) -> Option<Timestamp> {
        let mut tv = esp_idf_sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: `tv` is a valid out-pointer; the timezone argument may be null.
        if unsafe { esp_idf_sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        let secs = u64::try_from(tv.tv_sec).ok()?;
        (secs >= EPOCH_2020).then_some(secs)
    }

    /// Seconds since the Unix epoch from the host clock.
    #[cfg(not(target_os = "espidf"))]
    pub fn wall_clock(&self) -> Option<Timestamp> {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_secs();
        (secs >= EPOCH_2020).then_some(secs)
    }
}
