//! Default GPIO / peripheral assignments for the controller board.
//!
//! These are the fallbacks used when the configuration does not name a pin.
//! Every bus builder references this module rather than hard-coding numbers.

// ---------------------------------------------------------------------------
// I²C bus (current-loop sensor module, Grove port A)
// ---------------------------------------------------------------------------

/// Software-bus SDA default.
pub const I2C_SDA_GPIO: u8 = 2;
/// Software-bus SCL default.
pub const I2C_SCL_GPIO: u8 = 1;
/// Standard-mode clock.
pub const I2C_FREQ_KHZ: u32 = 100;

// ---------------------------------------------------------------------------
// RS-485 Modbus link (ventilation unit)
// ---------------------------------------------------------------------------

pub const MODBUS_UART_TX_GPIO: u8 = 17;
pub const MODBUS_UART_RX_GPIO: u8 = 18;
/// Factory baud rate of the SAVE VTR Modbus interface.
pub const MODBUS_BAUD: u32 = 9_600;
