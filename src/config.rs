//! System configuration parameters
//!
//! Everything the builder needs to create buses and device instances.
//! Loaded from JSON; every field has a default so a minimal document only
//! names what differs.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bus::{Register, RetryPolicy};
use crate::error::{Error, Result};
use crate::pins;
use crate::registers::ProcessScale;

pub type Name = heapless::String<32>;

/// Copy `s` into a [`Name`], truncating at capacity.
pub fn name(s: &str) -> Name {
    let mut out = Name::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Maximum current-loop modules on the I2C bus.
///
/// Entries past this count are rejected one by one by the builder.
pub const MAX_CURRENT_LOOPS: usize = 4;

/// One device entry, decoded on its own.
///
/// An entry that does not fit its schema (an address above 255, a negative
/// interval, a name over 32 characters) becomes [`Instance::Malformed`]
/// instead of failing the surrounding document.
#[derive(Debug, Clone, PartialEq)]
pub enum Instance<T> {
    Valid(T),
    Malformed { name: Name, reason: Error },
}

impl<T> Instance<T> {
    pub fn get(&self) -> Result<&T> {
        match self {
            Self::Valid(cfg) => Ok(cfg),
            Self::Malformed { reason, .. } => Err(*reason),
        }
    }
}

impl<T> From<T> for Instance<T> {
    fn from(cfg: T) -> Self {
        Self::Valid(cfg)
    }
}

impl<T: Default> Default for Instance<T> {
    fn default() -> Self {
        Self::Valid(T::default())
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Instance<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let label = value
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| name("unnamed"), name);
        Ok(match serde_json::from_value::<T>(value) {
            Ok(cfg) => Self::Valid(cfg),
            Err(_) => Self::Malformed {
                name: label,
                reason: Error::Config("malformed device entry"),
            },
        })
    }
}

impl<T: Serialize> Serialize for Instance<T> {
    /// A malformed entry writes back as its name only.
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        match self {
            Self::Valid(cfg) => cfg.serialize(serializer),
            Self::Malformed { name, .. } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("name", name.as_str())?;
                map.end()
            }
        }
    }
}

impl Instance<CurrentLoopConfig> {
    pub fn name(&self) -> &str {
        match self {
            Self::Valid(cfg) => &cfg.name,
            Self::Malformed { name, .. } => name,
        }
    }
}

impl Instance<ClimateConfig> {
    pub fn name(&self) -> &str {
        match self {
            Self::Valid(cfg) => &cfg.name,
            Self::Malformed { name, .. } => name,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Main loop tick (milliseconds)
    pub tick_interval_ms: u32,
    pub i2c: Option<I2cBusConfig>,
    pub modbus: Option<ModbusBusConfig>,
    pub current_loops: Vec<Instance<CurrentLoopConfig>>,
    pub climate: Option<Instance<ClimateConfig>>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            i2c: None,
            modbus: None,
            current_loops: Vec::new(),
            climate: None,
        }
    }
}

impl SystemConfig {
    /// Parse and validate the bus-level settings.
    ///
    /// Device entries are decoded one by one into [`Instance`]s and
    /// validated by the builder, so a bad instance does not take the rest
    /// down with it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed configuration JSON"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be > 0"));
        }
        if let Some(i2c) = &self.i2c {
            i2c.validate()?;
        }
        if let Some(modbus) = &self.modbus {
            modbus.validate()?;
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Buses
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct I2cBusConfig {
    pub sda_pin: u8,
    pub scl_pin: u8,
    pub frequency_khz: u32,
    /// Per-transaction timeout (milliseconds)
    pub timeout_ms: u32,
    pub retry: RetryPolicy,
}

impl Default for I2cBusConfig {
    fn default() -> Self {
        Self {
            sda_pin: pins::I2C_SDA_GPIO,
            scl_pin: pins::I2C_SCL_GPIO,
            frequency_khz: pins::I2C_FREQ_KHZ,
            timeout_ms: 50,
            retry: RetryPolicy::default(),
        }
    }
}

impl I2cBusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sda_pin == self.scl_pin {
            return Err(Error::Config("i2c: SDA and SCL must be different pins"));
        }
        if !(10..=1000).contains(&self.frequency_khz) {
            return Err(Error::Config("i2c: frequency_khz out of range (10-1000)"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("i2c: timeout_ms must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusBusConfig {
    pub tx_pin: u8,
    pub rx_pin: u8,
    pub baud_rate: u32,
    /// Response timeout (milliseconds)
    pub timeout_ms: u32,
    pub retry: RetryPolicy,
}

impl Default for ModbusBusConfig {
    fn default() -> Self {
        Self {
            tx_pin: pins::MODBUS_UART_TX_GPIO,
            rx_pin: pins::MODBUS_UART_RX_GPIO,
            baud_rate: pins::MODBUS_BAUD,
            timeout_ms: 500,
            retry: RetryPolicy::default(),
        }
    }
}

impl ModbusBusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tx_pin == self.rx_pin {
            return Err(Error::Config("modbus: TX and RX must be different pins"));
        }
        if !(1_200..=115_200).contains(&self.baud_rate) {
            return Err(Error::Config("modbus: baud_rate out of range (1200-115200)"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Config("modbus: timeout_ms must be > 0"));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Output channel binding
// ───────────────────────────────────────────────────────────────

/// Binds one output channel, optionally overriding its presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: Name,
    #[serde(default)]
    pub unit: Option<heapless::String<8>>,
    #[serde(default)]
    pub icon: Option<heapless::String<32>>,
    #[serde(default)]
    pub accuracy_decimals: Option<u8>,
}

impl ChannelConfig {
    pub fn named(channel: &str) -> Self {
        Self {
            name: name(channel),
            unit: None,
            icon: None,
            accuracy_decimals: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("channel name must not be empty"));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Current-loop module
// ───────────────────────────────────────────────────────────────

/// Default 7-bit address of the current-loop module.
pub const CURRENT_LOOP_ADDRESS: u8 = 0x55;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrentLoopConfig {
    pub name: Name,
    pub address: u8,
    /// Poll interval (milliseconds)
    pub update_interval_ms: u32,
    pub enable_12bit_mode: bool,
    /// Loop current in mA.
    pub current: Option<ChannelConfig>,
    /// Raw ADC counts.
    pub raw_adc: Option<ChannelConfig>,
    /// Loop current mapped to a process range.
    pub process_value: Option<ProcessValueConfig>,
}

impl Default for CurrentLoopConfig {
    fn default() -> Self {
        Self {
            name: name("current_loop"),
            address: CURRENT_LOOP_ADDRESS,
            update_interval_ms: 5_000,
            enable_12bit_mode: true,
            current: Some(ChannelConfig::named("current_value")),
            raw_adc: None,
            process_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessValueConfig {
    pub channel: ChannelConfig,
    pub scale: ProcessScale,
}

impl CurrentLoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("current_loop: name must not be empty"));
        }
        if !crate::bus::i2c::is_valid_address(self.address) {
            return Err(Error::Config("current_loop: address outside 0x08-0x77"));
        }
        if self.update_interval_ms == 0 {
            return Err(Error::Config("current_loop: update_interval_ms must be > 0"));
        }
        for channel in [&self.current, &self.raw_adc].into_iter().flatten() {
            channel.validate()?;
        }
        if let Some(pv) = &self.process_value {
            pv.channel.validate()?;
            if !(pv.scale.min.is_finite() && pv.scale.max.is_finite()) || pv.scale.min == pv.scale.max {
                return Err(Error::Config("current_loop: process_value range must be finite and non-empty"));
            }
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// SAVE VTR climate controller
// ───────────────────────────────────────────────────────────────

/// Register addresses of the controller.  Defaults match SAVE VTR units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateRegisterMap {
    pub fan_mode: Register,
    pub fan_mode_request: Register,
    pub setpoint: Register,
    pub room_temp: Register,
    pub heat_demand: Register,
    pub outdoor_air_temp: Register,
    pub supply_air_temp: Register,
    pub extract_air_temp: Register,
    pub supply_airflow: Register,
    pub extract_airflow: Register,
    pub boolean_alarms: Register,
    /// First of two consecutive registers, high word first.
    pub categorical_alarms: Register,
    /// Operating-mode register (0 = off, 1 = heat, 2 = auto), if the unit has one.
    pub mode: Option<Register>,
}

impl Default for ClimateRegisterMap {
    fn default() -> Self {
        Self {
            fan_mode: Register::input(1160),
            fan_mode_request: Register::holding(1161),
            setpoint: Register::holding(2000),
            room_temp: Register::holding(2001),
            heat_demand: Register::input(2148),
            outdoor_air_temp: Register::holding(12101),
            supply_air_temp: Register::holding(12102),
            extract_air_temp: Register::holding(12543),
            supply_airflow: Register::input(14000),
            extract_airflow: Register::input(14001),
            boolean_alarms: Register::input(15900),
            categorical_alarms: Register::input(15901),
            mode: None,
        }
    }
}

/// Capacity for bound alarm names (5 boolean + 32 categorical).
pub const MAX_ALARM_BINDINGS: usize = 40;
/// Capacity for bound sensor names.
pub const MAX_SENSOR_BINDINGS: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    pub name: Name,
    pub unit_id: u8,
    /// Poll interval (milliseconds)
    pub update_interval_ms: u32,
    pub setpoint_min_c: f32,
    pub setpoint_max_c: f32,
    pub registers: ClimateRegisterMap,
    /// Optional sensor channels to publish (e.g. `"outdoor_air_temp"`).
    pub sensors: heapless::Vec<Name, MAX_SENSOR_BINDINGS>,
    /// Alarm channels to publish (e.g. `"alarm_fire"`).
    pub alarms: heapless::Vec<Name, MAX_ALARM_BINDINGS>,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            name: name("save_vtr"),
            unit_id: 1,
            update_interval_ms: 30_000,
            setpoint_min_c: 12.0,
            setpoint_max_c: 30.0,
            registers: ClimateRegisterMap::default(),
            sensors: heapless::Vec::new(),
            alarms: heapless::Vec::new(),
        }
    }
}

impl ClimateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("climate: name must not be empty"));
        }
        if !crate::bus::modbus::is_valid_unit_id(self.unit_id) {
            return Err(Error::Config("climate: unit_id outside 1-247"));
        }
        if self.update_interval_ms == 0 {
            return Err(Error::Config("climate: update_interval_ms must be > 0"));
        }
        if !(self.setpoint_min_c.is_finite() && self.setpoint_max_c.is_finite())
            || self.setpoint_min_c >= self.setpoint_max_c
        {
            return Err(Error::Config("climate: setpoint_min_c must be below setpoint_max_c"));
        }
        if self.sensors.iter().any(|s| crate::climate::sensor_spec(s).is_none()) {
            return Err(Error::Config("climate: unknown sensor name"));
        }
        if self.alarms.iter().any(|a| crate::climate::alarms::lookup(a).is_none()) {
            return Err(Error::Config("climate: unknown alarm name"));
        }
        Ok(())
    }
}
