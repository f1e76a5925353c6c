//! Polling service: the orchestration core.
//!
//! [`PollingService`] owns every registered device and the scheduler that
//! decides when each one polls.  All I/O flows through the
//! [`PollingDevice`] / [`PublishSink`] / [`EventSink`] ports, so the whole
//! service runs against mock adapters on the host.
//!
//! ```text
//!  main loop ──tick(ms)──▶ ┌────────────────────────┐ ──▶ PublishSink
//!                          │     PollingService      │
//!  CONTROL_CHANNEL ──────▶ │  Scheduler · devices    │ ──▶ EventSink
//!                          └────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::name;
use crate::error::{Error, Result};
use crate::outputs::OutputChannel;
use crate::scheduler::{Scheduler, SlotId, SlotState, SlotStats};

use super::commands::{CONTROL_CHANNEL, ControlCommand};
use super::events::{AppEvent, DeviceName};
use super::ports::{CycleOutcome, EventSink, PollingDevice, PublishSink, SchedulerDelegate};

// ───────────────────────────────────────────────────────────────
// PollingService
// ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct PollingService {
    /// Indexed by scheduler slot.
    devices: Vec<Box<dyn PollingDevice>>,
    scheduler: Scheduler,
}

impl PollingService {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Schedule a device.  Names must be unique.
    pub fn register(&mut self, device: Box<dyn PollingDevice>, events: &mut impl EventSink) -> Result<SlotId> {
        if self.slot_of(device.name()).is_some() {
            return Err(Error::Config("duplicate device name"));
        }
        let interval_ms = device.update_interval_ms();
        let slot = self
            .scheduler
            .add(device.name(), interval_ms)
            .ok_or(Error::Config("too many devices"))?;

        info!("{}: {} device on slot {}", device.name(), device.kind().component(), slot);
        device.dump_config();
        events.emit(&AppEvent::DeviceRegistered {
            device: name(device.name()),
            interval_ms,
        });
        self.devices.push(device);
        Ok(slot)
    }

    /// Poll every device once, in registration order.
    pub fn start(&mut self, sink: &mut impl PublishSink, events: &mut impl EventSink) {
        info!("PollingService started with {} device(s)", self.devices.len());
        let mut dispatch = Dispatcher {
            devices: &mut self.devices,
            sink,
            events,
        };
        for slot in 0..self.scheduler.len() {
            self.scheduler.poll_now(slot, &mut dispatch);
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Advance the schedule by `elapsed_ms` and run every cycle that fell due.
    pub fn tick(&mut self, elapsed_ms: u32, sink: &mut impl PublishSink, events: &mut impl EventSink) {
        let mut dispatch = Dispatcher {
            devices: &mut self.devices,
            sink,
            events,
        };
        self.scheduler.tick(elapsed_ms, &mut dispatch);
    }

    // ── Commands ──────────────────────────────────────────────

    /// Apply one control command to the device it names.
    pub fn handle_command(
        &mut self,
        command: &ControlCommand,
        sink: &mut impl PublishSink,
        events: &mut impl EventSink,
    ) -> Result<()> {
        let slot = self
            .slot_of(command.device())
            .ok_or(Error::Config("unknown device"))?;
        let device = name(command.device());

        let result = match command {
            ControlCommand::PollNow { .. } => {
                let mut dispatch = Dispatcher {
                    devices: &mut self.devices,
                    sink,
                    events: &mut *events,
                };
                if self.scheduler.poll_now(slot, &mut dispatch) {
                    Ok(())
                } else {
                    // Stopped, or a cycle is already running.
                    Err(Error::Config("device not idle"))
                }
            }
            _ => self.devices[slot].control(command),
        };

        match result {
            Ok(()) => events.emit(&AppEvent::CommandApplied { device }),
            Err(error) => {
                warn!("{}: command failed: {}", device, error);
                events.emit(&AppEvent::CommandFailed { device, error });
            }
        }
        result
    }

    /// Apply every command queued on [`CONTROL_CHANNEL`].  Returns how many
    /// were taken off the queue.
    pub fn drain_commands(&mut self, sink: &mut impl PublishSink, events: &mut impl EventSink) -> usize {
        let mut handled = 0;
        while let Ok(command) = CONTROL_CHANNEL.try_receive() {
            // Failures are already reported through the event sink.
            let _ = self.handle_command(&command, sink, events);
            handled += 1;
        }
        handled
    }

    /// Retire one device.  It never polls again.
    pub fn stop(&mut self, device: &str, events: &mut impl EventSink) -> Result<()> {
        let slot = self.slot_of(device).ok_or(Error::Config("unknown device"))?;
        self.retire(slot, events);
        Ok(())
    }

    pub fn stop_all(&mut self, events: &mut impl EventSink) {
        for slot in 0..self.devices.len() {
            self.retire(slot, events);
        }
    }

    fn retire(&mut self, slot: SlotId, events: &mut impl EventSink) {
        if self.scheduler.state(slot) == Some(SlotState::Stopped) {
            return;
        }
        self.scheduler.stop(slot);
        events.emit(&AppEvent::DeviceStopped {
            device: name(self.devices[slot].name()),
            stats: self.scheduler.stats(slot).unwrap_or_default(),
        });
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn device(&self, device: &str) -> Option<&dyn PollingDevice> {
        self.slot_of(device).map(|slot| self.devices[slot].as_ref())
    }

    pub fn state(&self, device: &str) -> Option<SlotState> {
        self.slot_of(device).and_then(|slot| self.scheduler.state(slot))
    }

    pub fn stats(&self, device: &str) -> Option<SlotStats> {
        self.slot_of(device).and_then(|slot| self.scheduler.stats(slot))
    }

    pub fn device_names(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|d| d.name())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn slot_of(&self, device: &str) -> Option<SlotId> {
        self.devices.iter().position(|d| d.name() == device)
    }
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate
// ───────────────────────────────────────────────────────────────

/// Runs a due cycle on the slot's device, inline.
struct Dispatcher<'a, P, E> {
    devices: &'a mut [Box<dyn PollingDevice>],
    sink: &'a mut P,
    events: &'a mut E,
}

impl<P: PublishSink, E: EventSink> SchedulerDelegate for Dispatcher<'_, P, E> {
    fn on_poll_due(&mut self, slot: SlotId, label: &str) -> CycleOutcome {
        let Some(device) = self.devices.get_mut(slot) else {
            return CycleOutcome::Failed;
        };
        let mut counting = CountingSink {
            inner: &mut *self.sink,
            published: 0,
        };
        let device_name: DeviceName = name(label);
        match device.poll(&mut counting) {
            Ok(()) => {
                self.events.emit(&AppEvent::PollCompleted {
                    device: device_name,
                    published: counting.published,
                });
                CycleOutcome::Succeeded
            }
            Err(error) => {
                warn!("{}: poll failed: {}", label, error);
                self.events.emit(&AppEvent::PollFailed {
                    device: device_name,
                    error,
                });
                CycleOutcome::Failed
            }
        }
    }
}

struct CountingSink<'a, P> {
    inner: &'a mut P,
    published: u16,
}

impl<P: PublishSink> PublishSink for CountingSink<'_, P> {
    fn publish(&mut self, device: &str, channel: &OutputChannel) {
        self.published = self.published.saturating_add(1);
        self.inner.publish(device, channel);
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
