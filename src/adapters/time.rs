//! Time adapters.
//!
//! - [`MonotonicClock`] answers "milliseconds since boot" for the main loop.
//!   With the `espidf` feature it reads `esp_timer_get_time()`; elsewhere it
//!   uses `std::time::Instant`.
//! - [`ThreadDelay`] implements [`DelayNs`] by sleeping the calling thread.
//!   Bus retry backoff runs with the bus lock released, so sleeping the
//!   thread (a FreeRTOS task on target) is what we want.

use embedded_hal::delay::DelayNs;

pub struct MonotonicClock {
    #[cfg(not(feature = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(feature = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(feature = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(feature = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Blocking delay on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl DelayNs for ThreadDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

/// Tracks elapsed time between main-loop iterations.
#[derive(Debug, Default)]
pub struct TickTimer {
    last_ms: Option<u64>,
}

impl TickTimer {
    /// Milliseconds since the previous call (0 on the first call).
    pub fn elapsed(&mut self, now_ms: u64) -> u32 {
        let elapsed = match self.last_ms {
            Some(last) => now_ms.saturating_sub(last),
            None => 0,
        };
        self.last_ms = Some(now_ms);
        u32::try_from(elapsed).unwrap_or(u32::MAX)
    }
}
