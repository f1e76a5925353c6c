//! Poll scheduler.
//!
//! One slot per device.  The main loop feeds elapsed time into
//! [`Scheduler::tick`]; when a slot's interval has elapsed the scheduler
//! hands it to a [`SchedulerDelegate`], which runs the poll cycle.
//!
//! ```text
//!            interval elapsed
//!   ┌──────┐ ───────────────▶ ┌─────────┐
//!   │ Idle │                  │ Polling │──┐ due again: skipped
//!   └──────┘ ◀─────────────── └─────────┘◀─┘ (coalesced, not queued)
//!      │      cycle complete       │
//!      └────────── stop ───────────┴──────▶ Stopped (terminal)
//! ```
//!
//! A delegate may finish the cycle inline ([`CycleOutcome::Succeeded`] /
//! [`CycleOutcome::Failed`]) or hand it to a worker and report back later
//! through [`Scheduler::complete`] ([`CycleOutcome::Pending`]).

use log::{debug, info, warn};

use crate::app::ports::{CycleOutcome, SchedulerDelegate};

/// Maximum number of polled devices (stack-allocated).
pub const MAX_SLOTS: usize = 8;

/// Index of a scheduled device.
pub type SlotId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Polling,
    Stopped,
}

/// Per-slot counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    /// Cycles that completed successfully.
    pub cycles: u32,
    /// Cycles that ended in an error.
    pub failures: u32,
    /// Due fires dropped because the previous cycle was still running.
    pub skipped: u32,
}

#[derive(Debug, Clone)]
struct PollSlot {
    label: heapless::String<32>,
    interval_ms: u32,
    elapsed_ms: u32,
    state: SlotState,
    /// A pending cycle has not reported back yet.  Survives `stop`.
    in_flight: bool,
    stats: SlotStats,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct Scheduler {
    slots: heapless::Vec<PollSlot, MAX_SLOTS>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device.  Returns `None` when full, when `interval_ms` is 0
    /// or when the label does not fit.
    pub fn add(&mut self, label: &str, interval_ms: u32) -> Option<SlotId> {
        if interval_ms == 0 {
            return None;
        }
        self.slots
            .push(PollSlot {
                label: heapless::String::try_from(label).ok()?,
                interval_ms,
                elapsed_ms: 0,
                state: SlotState::Idle,
                in_flight: false,
                stats: SlotStats::default(),
            })
            .ok()?;
        let slot = self.slots.len() - 1;
        info!("Scheduler: '{}' at slot {} every {} ms", label, slot, interval_ms);
        Some(slot)
    }

    /// Advance time by `elapsed_ms` and fire every slot that became due.
    pub fn tick(&mut self, elapsed_ms: u32, delegate: &mut dyn SchedulerDelegate) {
        for slot in 0..self.slots.len() {
            let entry = &mut self.slots[slot];
            if entry.state == SlotState::Stopped {
                continue;
            }

            entry.elapsed_ms = entry.elapsed_ms.saturating_add(elapsed_ms);
            if entry.elapsed_ms < entry.interval_ms {
                continue;
            }
            // However many intervals were missed, fire at most once.
            entry.elapsed_ms = 0;

            if entry.state == SlotState::Polling {
                entry.stats.skipped += 1;
                debug!("Scheduler: '{}' still polling, fire skipped", entry.label);
                continue;
            }
            self.fire(slot, delegate);
        }
    }

    /// Run a cycle for `slot` immediately, outside its schedule.
    ///
    /// Returns `false` (and does nothing) if the slot is unknown, stopped,
    /// or already polling.
    pub fn poll_now(&mut self, slot: SlotId, delegate: &mut dyn SchedulerDelegate) -> bool {
        match self.slots.get(slot).map(|s| s.state) {
            Some(SlotState::Idle) => {
                self.fire(slot, delegate);
                true
            }
            _ => false,
        }
    }

    /// Report the end of a cycle that the delegate left [`CycleOutcome::Pending`].
    ///
    /// A completion with no cycle in flight is ignored.
    pub fn complete(&mut self, slot: SlotId, ok: bool) {
        let Some(entry) = self.slots.get_mut(slot) else {
            return;
        };
        if !entry.in_flight {
            debug!("Scheduler: '{}' stray completion ignored", entry.label);
            return;
        }
        entry.in_flight = false;
        Self::record(entry, ok);
        if entry.state == SlotState::Polling {
            entry.state = SlotState::Idle;
        }
    }

    /// Retire a slot for good.  An in-flight cycle may still complete.
    pub fn stop(&mut self, slot: SlotId) {
        if let Some(entry) = self.slots.get_mut(slot) {
            if entry.state != SlotState::Stopped {
                info!("Scheduler: '{}' stopped", entry.label);
            }
            entry.state = SlotState::Stopped;
        }
    }

    pub fn stop_all(&mut self) {
        for slot in 0..self.slots.len() {
            self.stop(slot);
        }
    }

    pub fn state(&self, slot: SlotId) -> Option<SlotState> {
        self.slots.get(slot).map(|s| s.state)
    }

    pub fn stats(&self, slot: SlotId) -> Option<SlotStats> {
        self.slots.get(slot).map(|s| s.stats)
    }

    pub fn label(&self, slot: SlotId) -> Option<&str> {
        self.slots.get(slot).map(|s| s.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of slots that will still fire.
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state != SlotState::Stopped)
            .count()
    }

    fn fire(&mut self, slot: SlotId, delegate: &mut dyn SchedulerDelegate) {
        let entry = &mut self.slots[slot];
        entry.state = SlotState::Polling;
        entry.in_flight = true;
        let outcome = delegate.on_poll_due(slot, &entry.label);

        let entry = &mut self.slots[slot];
        match outcome {
            CycleOutcome::Pending => {}
            CycleOutcome::Succeeded | CycleOutcome::Failed => {
                entry.in_flight = false;
                Self::record(entry, outcome == CycleOutcome::Succeeded);
                if entry.state == SlotState::Polling {
                    entry.state = SlotState::Idle;
                }
            }
        }
    }

    fn record(entry: &mut PollSlot, ok: bool) {
        if ok {
            entry.stats.cycles += 1;
        } else {
            entry.stats.failures += 1;
            warn!(
                "Scheduler: '{}' cycle failed ({} so far)",
                entry.label, entry.stats.failures
            );
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
