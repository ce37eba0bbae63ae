//! Portatec relay/access controller firmware library.
//!
//! Exposes the pure-logic modules for integration testing and fuzzing.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module and falls back to a host simulation otherwise.

#![deny(unused_must_use)]

pub mod access;
pub mod app;
pub mod clock;
pub mod config;
pub mod dates;
pub mod error;
pub mod pins;
pub mod sync;

pub mod adapters;
pub mod drivers;
