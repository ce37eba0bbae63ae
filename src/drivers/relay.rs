//! Strike relay driver.
//!
//! A pulse energises the relay and records a release deadline; the main
//! loop calls [`RelayPort::poll`] every tick to de-energise it once the
//! deadline has passed.  Works on any `embedded-hal` output pin, so the
//! same driver runs against `PinDriver` on the device and a recording pin
//! in tests.
//!
//! ## Polarity
//!
//! With `inverted` set the relay is active-low: energised = pin low.

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::app::ports::RelayPort;

pub struct RelayDriver<P: OutputPin> {
    pin: P,
    inverted: bool,
    /// Uptime at which the current pulse ends.
    release_at: Option<u64>,
}

impl<P: OutputPin> RelayDriver<P> {
    /// Take ownership of `pin` and drive it to the idle level.
    pub fn new(pin: P, inverted: bool) -> Self {
        let mut relay = Self {
            pin,
            inverted,
            release_at: None,
        };
        relay.drive(false);
        relay
    }

    fn drive(&mut self, energised: bool) {
        let high = energised != self.inverted;
        let res = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if res.is_err() {
            warn!("Relay: failed to drive pin {}", if high { "high" } else { "low" });
        }
    }

    /// Give the pin back (tests inspect it).
    pub fn release(mut self) -> P {
        self.drive(false);
        self.pin
    }
}

impl<P: OutputPin> RelayPort for RelayDriver<P> {
    fn pulse(&mut self, now_ms: u64, duration_ms: u32) {
        debug!("Relay: pulse {} ms", duration_ms);
        self.drive(true);
        // A pulse during a pulse extends it.
        self.release_at = Some(now_ms.wrapping_add(u64::from(duration_ms)));
    }

    fn poll(&mut self, now_ms: u64) {
        let Some(deadline) = self.release_at else {
            return;
        };
        // Wrap-safe "now >= deadline": the difference is small when due.
        if now_ms.wrapping_sub(deadline) < u64::MAX / 2 {
            self.drive(false);
            self.release_at = None;
        }
    }

    fn is_active(&self) -> bool {
        self.release_at.is_some()
    }
}
