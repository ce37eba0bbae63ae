//! Application core: domain orchestration with no direct I/O.
//!
//! All interaction with the radio, the relay, flash and the SoC happens
//! through the **port traits** in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
