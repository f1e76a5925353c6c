//! Register / channel decoding.
//!
//! Pure functions from raw register contents to engineering values.
//! Every function here is total: out-of-range input is clamped, never
//! rejected, because the inputs come from bounded hardware (ADC counts,
//! 16-bit registers).

use serde::{Deserialize, Serialize};

/// Full-scale current of the loop.
pub const LOOP_FULL_SCALE_MA: f32 = 20.0;
/// Live-zero of a 4–20 mA loop.
pub const LOOP_LIVE_ZERO_MA: f32 = 4.0;

// ───────────────────────────────────────────────────────────────
// Channel specification
// ───────────────────────────────────────────────────────────────

/// Raw sample width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitWidth {
    Bits10,
    Bits12,
    Bits16,
}

impl BitWidth {
    /// Largest raw value representable at this width.
    pub const fn max_raw(self) -> u16 {
        match self {
            Self::Bits10 => 1023,
            Self::Bits12 => 4095,
            Self::Bits16 => u16::MAX,
        }
    }

    pub const fn bits(self) -> u32 {
        match self {
            Self::Bits10 => 10,
            Self::Bits12 => 12,
            Self::Bits16 => 16,
        }
    }
}

/// How one raw register becomes an engineering value:
/// `value = raw * scale + offset` after width clamping / sign extension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSpec {
    pub width: BitWidth,
    pub signed: bool,
    pub scale: f32,
    pub offset: f32,
    pub unit: &'static str,
}

impl ChannelSpec {
    /// 0..max_raw → 0..20 mA.
    pub const fn current_loop(width: BitWidth) -> Self {
        Self {
            width,
            signed: false,
            scale: LOOP_FULL_SCALE_MA / width.max_raw() as f32,
            offset: 0.0,
            unit: "mA",
        }
    }

    /// Signed tenths of a degree (SAVE VTR temperature registers).
    pub const fn deci_celsius() -> Self {
        Self {
            width: BitWidth::Bits16,
            signed: true,
            scale: 0.1,
            offset: 0.0,
            unit: "°C",
        }
    }

    /// Unsigned word used as-is, in `unit`.
    pub const fn plain(unit: &'static str) -> Self {
        Self {
            width: BitWidth::Bits16,
            signed: false,
            scale: 1.0,
            offset: 0.0,
            unit,
        }
    }

    /// Unsigned word multiplied by `scale`.
    pub const fn scaled(scale: f32, unit: &'static str) -> Self {
        Self {
            width: BitWidth::Bits16,
            signed: false,
            scale,
            offset: 0.0,
            unit,
        }
    }
}

/// A decoded value with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineeringValue {
    pub value: f32,
    pub unit: &'static str,
}

/// Decode one raw sample according to `spec`.
///
/// Signed samples are two's complement at their own width: bits above the
/// width are dropped and the top bit of the width is the sign.  Unsigned
/// samples clamp at `max_raw`.
pub fn decode(raw: u16, spec: &ChannelSpec) -> EngineeringValue {
    let value = if spec.signed {
        let shift = 16 - spec.width.bits();
        ((raw << shift) as i16 >> shift) as f32
    } else {
        raw.min(spec.width.max_raw()) as f32
    };
    EngineeringValue {
        value: value * spec.scale + spec.offset,
        unit: spec.unit,
    }
}

/// Convenience: raw ADC counts → loop current in mA.
pub fn adc_to_milliamps(raw: u16, width: BitWidth) -> f32 {
    decode(raw, &ChannelSpec::current_loop(width)).value
}

// ───────────────────────────────────────────────────────────────
// Process-value scaling
// ───────────────────────────────────────────────────────────────

/// Linear 4–20 mA → process range mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessScale {
    /// Process value at 4 mA.
    pub min: f32,
    /// Process value at 20 mA.
    pub max: f32,
}

impl ProcessScale {
    /// Map a loop current to the process range, clamped to `[min, max]`.
    pub fn apply(&self, milliamps: f32) -> f32 {
        let span = LOOP_FULL_SCALE_MA - LOOP_LIVE_ZERO_MA;
        let fraction = ((milliamps - LOOP_LIVE_ZERO_MA) / span).clamp(0.0, 1.0);
        self.min + fraction * (self.max - self.min)
    }
}

// ───────────────────────────────────────────────────────────────
// Word helpers
// ───────────────────────────────────────────────────────────────

/// Big-endian word (Modbus byte order).
pub fn be_word(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// Little-endian word (I²C module byte order).
pub fn le_word(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// Two big-endian registers, high word first.
pub fn be_dword(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// Encode a temperature for a deci-degree register.  Rounds to the
/// nearest tenth and saturates at the i16 range.
pub fn encode_deci_celsius(celsius: f32) -> [u8; 2] {
    let tenths = (celsius * 10.0).round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
    tenths.to_be_bytes()
}
