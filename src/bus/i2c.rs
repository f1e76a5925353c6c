//! I²C transport over any `embedded-hal` 1.0 bus.
//!
//! Register-addressed devices: a read is `write([reg]) + read(n)` in one
//! repeated-start transaction, a write is `write([reg, data..])`.
//! On ESP-IDF the bus is an `esp_idf_hal::i2c::I2cDriver`; on the host any
//! mock implementing [`embedded_hal::i2c::I2c`] works.

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use super::{BusTransport, Register};
use crate::error::TransportError;

/// Largest payload the module firmware accepts in one transfer.
const MAX_TRANSFER: usize = 32;

/// Lowest and highest non-reserved 7-bit addresses.
pub const ADDRESS_RANGE: core::ops::RangeInclusive<u8> = 0x08..=0x77;

/// Validate a 7-bit device address.
pub fn is_valid_address(address: u8) -> bool {
    ADDRESS_RANGE.contains(&address)
}

pub struct I2cBus<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> I2cBus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Hand the underlying bus back (test teardown, bus re-init).
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn register_byte(register: Register) -> Result<u8, TransportError> {
        u8::try_from(register.offset).map_err(|_| TransportError::RequestTooLarge)
    }
}

impl<I2C: I2c> BusTransport for I2cBus<I2C> {
    fn read(&mut self, address: u8, register: Register, buf: &mut [u8]) -> Result<(), TransportError> {
        if buf.len() > MAX_TRANSFER {
            return Err(TransportError::RequestTooLarge);
        }
        let reg = Self::register_byte(register)?;
        self.i2c
            .write_read(address, &[reg], buf)
            .map_err(|e| map_kind(e.kind()))
    }

    fn write(&mut self, address: u8, register: Register, data: &[u8]) -> Result<(), TransportError> {
        if data.len() > MAX_TRANSFER {
            return Err(TransportError::RequestTooLarge);
        }
        let mut frame: heapless::Vec<u8, { MAX_TRANSFER + 1 }> = heapless::Vec::new();
        // Capacity checked above; neither push can fail.
        let _ = frame.push(Self::register_byte(register)?);
        let _ = frame.extend_from_slice(data);
        self.i2c
            .write(address, &frame)
            .map_err(|e| map_kind(e.kind()))
    }

    fn max_transfer(&self) -> usize {
        MAX_TRANSFER
    }
}

/// HAL error kind → transport taxonomy.
fn map_kind(kind: ErrorKind) -> TransportError {
    match kind {
        ErrorKind::NoAcknowledge(_) => TransportError::Nack,
        ErrorKind::Bus | ErrorKind::ArbitrationLoss => TransportError::BusBusy,
        _ => TransportError::Timeout,
    }
}
