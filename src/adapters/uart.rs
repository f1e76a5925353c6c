//! ESP-IDF UART adapter for the RS-485 Modbus link.
//!
//! Wraps `esp_idf_hal::uart::UartDriver` as a [`SerialLink`].  The driver
//! runs the transceiver in RS-485 half-duplex mode, so no manual DE/RE
//! toggling happens here.

use esp_idf_hal::delay::TickType;
use esp_idf_hal::uart::UartDriver;
use log::debug;

use crate::bus::modbus::{LinkError, SerialLink};

pub struct UartLink<'d> {
    uart: UartDriver<'d>,
}

impl<'d> UartLink<'d> {
    pub fn new(uart: UartDriver<'d>) -> Self {
        Self { uart }
    }
}

impl SerialLink for UartLink<'_> {
    fn write_all(&mut self, mut data: &[u8]) -> Result<(), LinkError> {
        while !data.is_empty() {
            let n = self.uart.write(data).map_err(|_| LinkError::Io)?;
            data = &data[n..];
        }
        self.uart
            .wait_tx_done(TickType::new_millis(100).ticks())
            .map_err(|_| LinkError::Io)
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<(), LinkError> {
        let ticks = TickType::new_millis(u64::from(timeout_ms)).ticks();
        let mut filled = 0;
        while filled < buf.len() {
            match self.uart.read(&mut buf[filled..], ticks) {
                Ok(0) => {
                    debug!("uart: timeout after {}/{} bytes", filled, buf.len());
                    return Err(LinkError::Timeout);
                }
                Ok(n) => filled += n,
                Err(_) => return Err(LinkError::Io),
            }
        }
        Ok(())
    }

    fn discard_input(&mut self) {
        let _ = self.uart.clear_rx();
    }
}
