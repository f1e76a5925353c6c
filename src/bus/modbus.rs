//! Modbus RTU transport.
//!
//! Frames are built and validated by `rmodbus`; this module only moves
//! bytes over a [`SerialLink`] and maps protocol failures onto the
//! transport taxonomy.
//!
//! Wire exchange per attempt:
//! ```text
//!  ──▶ [unit][func][payload..][crc lo][crc hi]
//!  ◀── [unit][func][len|code] ── guess frame length ──▶ read remainder
//! ```

use log::debug;
use rmodbus::client::ModbusRequest;
use rmodbus::{guess_response_frame_len, ErrorKind, ModbusProto};

use super::{BusTransport, Register, RegisterSpace};
use crate::error::{ExceptionCode, TransportError};

/// 125 registers: the function 0x03/0x04 limit.
const MAX_TRANSFER: usize = 250;

/// Longest RTU frame on the wire.
const MAX_FRAME: usize = 256;

/// Bytes needed before the response length is known.
const HEADER_LEN: usize = 3;

/// Unicast unit ids (0 is broadcast and never answers).
pub fn is_valid_unit_id(unit: u8) -> bool {
    (1..=247).contains(&unit)
}

// ───────────────────────────────────────────────────────────────
// Serial link abstraction
// ───────────────────────────────────────────────────────────────

/// Failure of the underlying byte link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Fewer bytes than requested arrived within the timeout.
    Timeout,
    /// Driver-level I/O failure.
    Io,
}

impl From<LinkError> for TransportError {
    fn from(e: LinkError) -> Self {
        match e {
            LinkError::Timeout | LinkError::Io => TransportError::Timeout,
        }
    }
}

/// Half-duplex byte link (UART + RS-485 transceiver on target).
pub trait SerialLink {
    fn write_all(&mut self, data: &[u8]) -> Result<(), LinkError>;

    /// Fill `buf` completely or fail with [`LinkError::Timeout`].
    fn read_exact(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<(), LinkError>;

    /// Drop stale bytes left over from an earlier, abandoned exchange.
    fn discard_input(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

pub struct ModbusRtuBus<L> {
    link: L,
    timeout_ms: u32,
}

impl<L: SerialLink> ModbusRtuBus<L> {
    pub fn new(link: L, timeout_ms: u32) -> Self {
        Self { link, timeout_ms }
    }

    pub fn release(self) -> L {
        self.link
    }

    /// Send `request`, collect one complete response frame into `response`.
    fn exchange(&mut self, request: &[u8], response: &mut Vec<u8>) -> Result<(), TransportError> {
        self.link.discard_input();
        self.link.write_all(request)?;

        let mut header = [0u8; HEADER_LEN];
        self.link.read_exact(&mut header, self.timeout_ms)?;
        let total = guess_response_frame_len(&header, ModbusProto::Rtu).map_err(map_modbus)? as usize;
        if !(HEADER_LEN + 2..=MAX_FRAME).contains(&total) {
            return Err(TransportError::FrameCorrupt);
        }

        response.clear();
        response.extend_from_slice(&header);
        response.resize(total, 0);
        self.link.read_exact(&mut response[HEADER_LEN..], self.timeout_ms)?;
        Ok(())
    }
}

impl<L: SerialLink> BusTransport for ModbusRtuBus<L> {
    fn read(&mut self, address: u8, register: Register, buf: &mut [u8]) -> Result<(), TransportError> {
        if buf.is_empty() || buf.len() % 2 != 0 || buf.len() > MAX_TRANSFER {
            return Err(TransportError::RequestTooLarge);
        }
        let count = (buf.len() / 2) as u16;

        let mut mreq = ModbusRequest::new(address, ModbusProto::Rtu);
        let mut request = Vec::new();
        let generated = match register.space {
            RegisterSpace::Holding => mreq.generate_get_holdings(register.offset, count, &mut request),
            RegisterSpace::Input => mreq.generate_get_inputs(register.offset, count, &mut request),
        };
        generated.map_err(map_modbus)?;

        let mut response = Vec::with_capacity(MAX_FRAME);
        self.exchange(&request, &mut response)?;

        let mut words: Vec<u16> = Vec::with_capacity(count as usize);
        mreq.parse_u16(&response, &mut words).map_err(map_modbus)?;
        if words.len() != count as usize {
            return Err(TransportError::FrameCorrupt);
        }
        for (chunk, word) in buf.chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        debug!(
            "modbus: unit {} {:?} {} x{} ok",
            address, register.space, register.offset, count
        );
        Ok(())
    }

    fn write(&mut self, address: u8, register: Register, data: &[u8]) -> Result<(), TransportError> {
        if register.space != RegisterSpace::Holding {
            // Input registers are read-only; the device would answer 0x01.
            return Err(TransportError::Exception(ExceptionCode::IllegalFunction));
        }
        if data.is_empty() || data.len() % 2 != 0 || data.len() > MAX_TRANSFER {
            return Err(TransportError::RequestTooLarge);
        }

        let words: Vec<u16> = data
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();

        let mut mreq = ModbusRequest::new(address, ModbusProto::Rtu);
        let mut request = Vec::new();
        let generated = if let [single] = words.as_slice() {
            mreq.generate_set_holding(register.offset, *single, &mut request)
        } else {
            mreq.generate_set_holdings_bulk(register.offset, &words, &mut request)
        };
        generated.map_err(map_modbus)?;

        let mut response = Vec::with_capacity(MAX_FRAME);
        self.exchange(&request, &mut response)?;
        mreq.parse_ok(&response).map_err(map_modbus)
    }

    fn max_transfer(&self) -> usize {
        MAX_TRANSFER
    }
}

/// `rmodbus` error / exception → transport taxonomy.
fn map_modbus(err: ErrorKind) -> TransportError {
    match err {
        ErrorKind::IllegalFunction => TransportError::Exception(ExceptionCode::IllegalFunction),
        ErrorKind::IllegalDataAddress => TransportError::Exception(ExceptionCode::IllegalDataAddress),
        ErrorKind::IllegalDataValue => TransportError::Exception(ExceptionCode::IllegalDataValue),
        ErrorKind::SlaveDeviceFailure => TransportError::Exception(ExceptionCode::DeviceFailure),
        ErrorKind::Acknowledge | ErrorKind::SlaveDeviceBusy => TransportError::BusBusy,
        ErrorKind::OOB | ErrorKind::OOBContext => TransportError::RequestTooLarge,
        _ => TransportError::FrameCorrupt,
    }
}
