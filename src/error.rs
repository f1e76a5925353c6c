//! Unified error types for the driver core.
//!
//! A single [`Error`] enum that every driver funnels into, with the
//! transport-level taxonomy split out into [`TransportError`] so the shared
//! bus can decide what is worth retrying.  All variants are `Copy` so they
//! can be passed through the scheduler and event sink without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level driver error
// ---------------------------------------------------------------------------

/// Every fallible driver operation returns this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A bus transaction failed (after any retries).
    Transport(TransportError),
    /// A write was rejected locally; no bus transaction was issued.
    OutOfRange,
    /// Invalid configuration.  Fatal to the affected device instance only.
    Config(&'static str),
}

impl Error {
    /// True when the failure came from the bus rather than local validation.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::OutOfRange => write!(f, "value out of range"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No response within the configured window.
    Timeout,
    /// The addressed device did not acknowledge.
    Nack,
    /// The device answered with a Modbus exception.
    Exception(ExceptionCode),
    /// Bus or device temporarily busy.
    BusBusy,
    /// Response arrived but failed CRC or framing checks.
    FrameCorrupt,
    /// Request exceeds the transport frame size.
    RequestTooLarge,
}

impl TransportError {
    /// Whether the shared bus should retry the transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::BusBusy | Self::FrameCorrupt)
    }

    /// Whether a retry should wait for the backoff interval first.
    pub fn needs_backoff(&self) -> bool {
        matches!(self, Self::BusBusy)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Nack => write!(f, "no acknowledge"),
            Self::Exception(code) => write!(f, "exception response: {code}"),
            Self::BusBusy => write!(f, "bus busy"),
            Self::FrameCorrupt => write!(f, "corrupt frame"),
            Self::RequestTooLarge => write!(f, "request exceeds frame size"),
        }
    }
}

// ---------------------------------------------------------------------------
// Modbus exception codes
// ---------------------------------------------------------------------------

/// Exception codes a Modbus device may answer with.  Busy / acknowledge
/// codes never reach this type: they are reported as [`TransportError::BusBusy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCode {
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    DeviceFailure,
    Other(u8),
}

impl ExceptionCode {
    pub const fn code(self) -> u8 {
        match self {
            Self::IllegalFunction => 0x01,
            Self::IllegalDataAddress => 0x02,
            Self::IllegalDataValue => 0x03,
            Self::DeviceFailure => 0x04,
            Self::Other(c) => c,
        }
    }
}

impl std::error::Error for TransportError {}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalFunction => write!(f, "illegal function"),
            Self::IllegalDataAddress => write!(f, "illegal data address"),
            Self::IllegalDataValue => write!(f, "illegal data value"),
            Self::DeviceFailure => write!(f, "device failure"),
            Self::Other(c) => write!(f, "code 0x{c:02X}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
