//! Outbound application events.
//!
//! The [`PollingService`](super::service::PollingService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.

use crate::error::Error;
use crate::scheduler::SlotStats;

pub use crate::config::Name as DeviceName;

/// Structured events emitted by the polling core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A device passed validation and was scheduled.
    DeviceRegistered { device: DeviceName, interval_ms: u32 },

    /// A device instance was refused at configuration load.
    DeviceRejected { device: DeviceName, reason: Error },

    /// One poll cycle finished and published its channels.
    PollCompleted { device: DeviceName, published: u16 },

    /// One poll cycle failed; channel values are stale.
    PollFailed { device: DeviceName, error: Error },

    /// A control command was applied.
    CommandApplied { device: DeviceName },

    /// A control command was refused or failed on the bus.
    CommandFailed { device: DeviceName, error: Error },

    /// A device was retired; carries its final counters.
    DeviceStopped { device: DeviceName, stats: SlotStats },
}
