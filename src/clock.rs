//! Absolute-time estimator.
//!
//! The device has no battery-backed RTC.  It keeps one absolute time sample
//! together with the uptime at which it was taken and extrapolates from
//! there:
//!
//! ```text
//!   now = absolute + (uptime_now - anchor_uptime) / 1000
//! ```
//!
//! The uptime difference uses wrapping subtraction, so the estimate keeps
//! advancing across a counter wraparound.  Until the first sample arrives
//! the estimator reports no time at all and every time-dependent check
//! fails closed.

use log::{info, warn};

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sample {
    absolute: Timestamp,
    anchor_uptime_ms: u64,
}

/// Single-sample clock estimator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockEstimator {
    sample: Option<Sample>,
}

impl ClockEstimator {
    pub const fn new() -> Self {
        Self { sample: None }
    }

    /// Replace the sample with `absolute`, anchored at `uptime_ms`.
    ///
    /// Zero is the "never set" marker: `sync(0, _)` leaves the estimator
    /// unsynchronised.
    pub fn sync(&mut self, absolute: Timestamp, uptime_ms: u64) {
        if absolute == 0 {
            warn!("Clock: ignoring zero epoch, clock is now unsynchronised");
            self.sample = None;
            return;
        }
        self.sample = Some(Sample {
            absolute,
            anchor_uptime_ms: uptime_ms,
        });
        info!("Clock: synced to {} at uptime {} ms", absolute, uptime_ms);
    }

    /// Estimated absolute time at `uptime_ms`, truncated to whole seconds.
    pub fn now(&self, uptime_ms: u64) -> Option<Timestamp> {
        let s = self.sample?;
        let elapsed_secs = uptime_ms.wrapping_sub(s.anchor_uptime_ms) / 1000;
        Some(s.absolute.saturating_add(elapsed_secs))
    }

    pub fn is_synced(&self) -> bool {
        self.sample.is_some()
    }
}
