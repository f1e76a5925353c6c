//! Port traits: the boundary between the polling core and the outside world.
//!
//! ```text
//!   PollingDevice ──▶ PollingService ──▶ PublishSink / EventSink
//!                           ▲
//!                   SchedulerDelegate
//! ```
//!
//! Drivers implement [`PollingDevice`]; adapters implement the sinks.  The
//! [`PollingService`](super::service::PollingService) only talks to these
//! traits, so the whole core runs on the host against mocks.

use crate::error::Result;
use crate::outputs::{ChannelTable, OutputChannel};
use crate::scheduler::SlotId;

use super::commands::ControlCommand;
use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Device port (driver → core)
// ───────────────────────────────────────────────────────────────

/// Which component a device instance belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    CurrentLoop,
    SaveVtr,
}

impl DeviceKind {
    /// Component name used for startup ordering.
    pub const fn component(self) -> &'static str {
        match self {
            Self::CurrentLoop => "current_loop",
            Self::SaveVtr => "save_vtr",
        }
    }
}

/// A configured driver instance the service can poll.
pub trait PollingDevice: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> DeviceKind;

    fn update_interval_ms(&self) -> u32;

    /// Run one poll cycle: bus transactions, decode, publish.
    ///
    /// On error nothing is published and every channel keeps its last value.
    fn poll(&mut self, sink: &mut dyn PublishSink) -> Result<()>;

    /// Apply a control command addressed to this device.
    fn control(&mut self, command: &ControlCommand) -> Result<()>;

    fn channels(&self) -> &ChannelTable;

    /// Log the effective configuration.
    fn dump_config(&self);
}

// ───────────────────────────────────────────────────────────────
// Publish sink (core → entity surface)
// ───────────────────────────────────────────────────────────────

/// Receives every freshly published channel value.
pub trait PublishSink {
    fn publish(&mut self, device: &str, channel: &OutputChannel);
}

/// Sink for devices polled without a consumer attached.
pub struct NullSink;

impl PublishSink for NullSink {
    fn publish(&mut self, _device: &str, _channel: &OutputChannel) {}
}

// ───────────────────────────────────────────────────────────────
// Event sink (core → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate
// ───────────────────────────────────────────────────────────────

/// Callback the [`Scheduler`](crate::scheduler::Scheduler) invokes when a
/// slot is due.  The scheduler knows nothing about devices or buses.
pub trait SchedulerDelegate {
    fn on_poll_due(&mut self, slot: SlotId, label: &str) -> CycleOutcome;
}

/// How a fired cycle ended, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Succeeded,
    Failed,
    /// Handed off; completion arrives via `Scheduler::complete`.
    Pending,
}
