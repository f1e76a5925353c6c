//! Sensor drivers.

pub mod current_loop;

pub use current_loop::{CurrentLoopReading, CurrentLoopSensor};
