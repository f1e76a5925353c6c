//! Ventilink driver core.
//!
//! Polls a 4–20 mA current-loop module on I²C and a SAVE VTR ventilation
//! unit over Modbus RTU, and publishes their values as named output
//! channels.  All ESP-IDF-specific code is guarded by
//! `#[cfg(feature = "espidf")]`, the same feature that pulls in the
//! ESP-IDF crates, so everything else builds and tests on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bus;
pub mod climate;
pub mod config;
pub mod error;
pub mod outputs;
pub mod pins;
pub mod registers;
pub mod scheduler;
pub mod sensors;
