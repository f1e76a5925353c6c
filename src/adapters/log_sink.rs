//! Log-based sink adapters.
//!
//! [`LogEventSink`] writes lifecycle events and [`LogPublishSink`] writes
//! every published channel value to the logger (UART / USB-CDC console in
//! production).  A network adapter would implement the same traits.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, PublishSink};
use crate::outputs::OutputChannel;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::DeviceRegistered { device, interval_ms } => {
                info!("DEVICE | {} registered, every {} ms", device, interval_ms);
            }
            AppEvent::DeviceRejected { device, reason } => {
                error!("DEVICE | {} rejected: {}", device, reason);
            }
            AppEvent::PollCompleted { device, published } => {
                info!("POLL | {} ok, {} value(s)", device, published);
            }
            AppEvent::PollFailed { device, error } => {
                warn!("POLL | {} failed: {}", device, error);
            }
            AppEvent::CommandApplied { device } => {
                info!("CMD | {} applied", device);
            }
            AppEvent::CommandFailed { device, error } => {
                warn!("CMD | {} failed: {}", device, error);
            }
            AppEvent::DeviceStopped { device, stats } => {
                info!(
                    "DEVICE | {} stopped | cycles={} failures={} skipped={}",
                    device, stats.cycles, stats.failures, stats.skipped
                );
            }
        }
    }
}

/// Adapter that logs every published channel value.
#[derive(Default)]
pub struct LogPublishSink {
    published: u32,
}

impl LogPublishSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values logged since start-up.
    pub fn published(&self) -> u32 {
        self.published
    }
}

impl PublishSink for LogPublishSink {
    fn publish(&mut self, device: &str, channel: &OutputChannel) {
        self.published = self.published.wrapping_add(1);
        info!("VALUE | {}.{} = {}", device, channel.name, channel.formatted());
    }
}
