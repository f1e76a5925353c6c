//! Inbound control commands.
//!
//! Commands come from the entity surface (setpoint slider, fan-mode select,
//! calibration button) and are applied by the
//! [`PollingService`](super::service::PollingService), either directly via
//! `handle_command` or queued through [`CONTROL_CHANNEL`] from another task.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::climate::ClimateMode;
use crate::climate::fan_mode::FanMode;

use super::events::DeviceName;

/// Depth of the cross-task command queue.
pub const CONTROL_QUEUE_DEPTH: usize = 8;

/// Commands addressed to one device by name.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Target temperature in °C.
    SetSetpoint { device: DeviceName, celsius: f32 },

    SetFanMode { device: DeviceName, mode: FanMode },

    SetMode { device: DeviceName, mode: ClimateMode },

    /// Write a calibration word to a current-loop module.
    Calibrate { device: DeviceName, value: u16 },

    /// Run a poll cycle now, outside the schedule.
    PollNow { device: DeviceName },
}

impl ControlCommand {
    pub fn device(&self) -> &str {
        match self {
            Self::SetSetpoint { device, .. }
            | Self::SetFanMode { device, .. }
            | Self::SetMode { device, .. }
            | Self::Calibrate { device, .. }
            | Self::PollNow { device } => device.as_str(),
        }
    }
}

/// Commands queued from other tasks, drained by the poll loop.
pub static CONTROL_CHANNEL: Channel<CriticalSectionRawMutex, ControlCommand, CONTROL_QUEUE_DEPTH> =
    Channel::new();

/// Queue a command without blocking.  Returns `false` if the queue is full.
pub fn submit(command: ControlCommand) -> bool {
    CONTROL_CHANNEL.try_send(command).is_ok()
}
