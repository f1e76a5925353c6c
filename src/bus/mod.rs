//! Bus transport layer.
//!
//! ```text
//!  CurrentLoopSensor ──┐                       ┌──▶ I2cBus<I2C>
//!  CurrentLoopSensor ──┼──▶ SharedBus (mutex) ─┤
//!  SaveVtrClimate ─────┘    retry · backoff    └──▶ ModbusRtuBus<L>
//! ```
//!
//! A [`BusTransport`] performs one register-addressed read or write.
//! [`SharedBus`] owns the transport behind a mutex so that every driver on
//! the same physical bus gets exclusive access for exactly one attempt,
//! and applies the retry policy between attempts with the lock released.

pub mod i2c;
pub mod modbus;

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::delay::DelayNs;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

// ───────────────────────────────────────────────────────────────
// Register addressing
// ───────────────────────────────────────────────────────────────

/// Modbus register table.  I2C transports ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterSpace {
    Holding,
    Input,
}

/// A register location on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register {
    pub space: RegisterSpace,
    pub offset: u16,
}

impl Register {
    pub const fn holding(offset: u16) -> Self {
        Self {
            space: RegisterSpace::Holding,
            offset,
        }
    }

    pub const fn input(offset: u16) -> Self {
        Self {
            space: RegisterSpace::Input,
            offset,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Transport trait
// ───────────────────────────────────────────────────────────────

/// One addressed bus.  Implementations perform a single attempt and never
/// retry on their own.
pub trait BusTransport {
    /// Fill `buf` from `register` on the device at `address`.
    fn read(&mut self, address: u8, register: Register, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Write `data` starting at `register` on the device at `address`.
    fn write(&mut self, address: u8, register: Register, data: &[u8]) -> Result<(), TransportError>;

    /// Largest payload (bytes) a single transaction may carry.
    fn max_transfer(&self) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Retry policy
// ───────────────────────────────────────────────────────────────

/// Bounded retry applied by [`SharedBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u8,
    /// First backoff interval for busy responses; doubles per retry.
    pub backoff_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: 20,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u8) -> u32 {
        let shift = u32::from(attempt.saturating_sub(1)).min(8);
        self.backoff_ms.saturating_mul(1 << shift)
    }
}

// ───────────────────────────────────────────────────────────────
// SharedBus
// ───────────────────────────────────────────────────────────────

/// Reference-counted handle drivers hold onto.
pub type BusHandle<B, D> = Arc<SharedBus<B, D>>;

/// A transport shared by every driver on one physical bus.
pub struct SharedBus<B, D> {
    label: &'static str,
    transport: Mutex<B>,
    delay: D,
    policy: RetryPolicy,
    /// Attempts issued on the wire (including retries).
    attempts: AtomicU32,
}

impl<B: BusTransport, D: DelayNs + Clone> SharedBus<B, D> {
    pub fn new(label: &'static str, transport: B, delay: D, policy: RetryPolicy) -> Self {
        Self {
            label,
            transport: Mutex::new(transport),
            delay,
            policy,
            attempts: AtomicU32::new(0),
        }
    }

    /// Wrap into the handle type drivers take.
    pub fn into_handle(self) -> BusHandle<B, D> {
        Arc::new(self)
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Number of bus attempts issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Largest payload the underlying transport accepts.
    pub fn max_transfer(&self) -> usize {
        self.lock().max_transfer()
    }

    pub fn read(&self, address: u8, register: Register, buf: &mut [u8]) -> Result<(), TransportError> {
        if buf.len() > self.max_transfer() {
            return Err(TransportError::RequestTooLarge);
        }
        self.transact(|t| t.read(address, register, &mut *buf))
    }

    pub fn write(&self, address: u8, register: Register, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > self.max_transfer() {
            return Err(TransportError::RequestTooLarge);
        }
        self.transact(|t| t.write(address, register, data))
    }

    /// Run `op` with exclusive access, retrying per [`RetryPolicy`].
    ///
    /// The lock is held for one attempt only; backoff sleeps happen with
    /// the bus released so other drivers can use it meanwhile.
    fn transact<T>(
        &self,
        mut op: impl FnMut(&mut B) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let mut attempt: u8 = 0;
        loop {
            let result = {
                let mut transport = self.lock();
                self.attempts.fetch_add(1, Ordering::Relaxed);
                op(&mut transport)
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        "{}: {}, retry {}/{}",
                        self.label, e, attempt, self.policy.max_retries
                    );
                    if e.needs_backoff() {
                        self.delay.clone().delay_ms(self.policy.backoff_for(attempt));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// A panic mid-transaction leaves nothing half-updated in the transport
    /// worth protecting, so a poisoned lock is simply taken over.
    fn lock(&self) -> MutexGuard<'_, B> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
