//! Peripheral drivers on `embedded-hal` traits, plus the task watchdog.

pub mod relay;
pub mod sensor;
pub mod watchdog;
