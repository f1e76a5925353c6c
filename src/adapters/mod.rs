//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements             | Connects to                 |
//! |------------|------------------------|-----------------------------|
//! | `log_sink` | EventSink, PublishSink | Serial log output           |
//! | `time`     | DelayNs                | Thread sleep, system timer  |
//! | `uart`     | SerialLink             | ESP32 UART + RS-485 (espidf) |

pub mod log_sink;
pub mod time;
#[cfg(feature = "espidf")]
pub mod uart;
