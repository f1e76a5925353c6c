//! SAVE VTR ventilation unit as a climate device (Modbus RTU).
//!
//! ```text
//!   refresh():  room ─ setpoint ─ fan mode ─ [bound optional regs] ─ alarms
//!                 │  all staged locally; first failure aborts the cycle  │
//!                 └──────────────── commit + publish ◀─────────────────────┘
//! ```
//!
//! Temperatures are signed tenths of a degree.  Airflow registers carry
//! the fan level in percent; the volume is derived as `percent × 3` m³/h.

pub mod alarms;
pub mod fan_mode;

use embedded_hal::delay::DelayNs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::app::commands::ControlCommand;
use crate::app::ports::{DeviceKind, PollingDevice, PublishSink};
use crate::bus::{BusHandle, BusTransport, Register};
use crate::config::{ClimateConfig, ClimateRegisterMap, MAX_ALARM_BINDINGS, MAX_SENSOR_BINDINGS, Name};
use crate::error::{Error, Result};
use crate::outputs::{ChannelHandle, ChannelMeta, ChannelTable, OutputValue};
use crate::registers::{ChannelSpec, be_dword, be_word, decode, encode_deci_celsius};

use self::alarms::{AlarmKind, AlarmState};
use self::fan_mode::FanMode;

/// m³/h per percent of fan level.
pub const AIRFLOW_M3H_PER_PERCENT: f32 = 3.0;

// ───────────────────────────────────────────────────────────────
// Modes
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimateMode {
    Off,
    Heat,
    Auto,
}

impl ClimateMode {
    pub fn code(self) -> u16 {
        match self {
            Self::Off => 0,
            Self::Heat => 1,
            Self::Auto => 2,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Off),
            1 => Some(Self::Heat),
            2 => Some(Self::Auto),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Optional sensor channels
// ───────────────────────────────────────────────────────────────

/// Where a sensor channel's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSource {
    RoomTemp,
    Setpoint,
    FanMode,
    OutdoorAirTemp,
    SupplyAirTemp,
    ExtractAirTemp,
    HeatDemand,
    SupplyAirflowPercent,
    SupplyAirflowVolume,
    ExtractAirflowPercent,
    ExtractAirflowVolume,
}

#[derive(Debug, Clone, Copy)]
pub struct SensorSpec {
    pub name: &'static str,
    pub unit: &'static str,
    pub icon: &'static str,
    pub accuracy_decimals: u8,
    pub source: SensorSource,
}

impl SensorSpec {
    fn meta(&self) -> ChannelMeta {
        match self.source {
            SensorSource::FanMode => ChannelMeta::text(self.icon),
            _ => ChannelMeta::numeric(self.unit, self.icon, self.accuracy_decimals),
        }
    }
}

const fn spec(
    name: &'static str,
    unit: &'static str,
    icon: &'static str,
    accuracy_decimals: u8,
    source: SensorSource,
) -> SensorSpec {
    SensorSpec {
        name,
        unit,
        icon,
        accuracy_decimals,
        source,
    }
}

/// Every sensor channel the climate device can publish.
pub const SENSORS: [SensorSpec; 11] = [
    spec("room_temp", "°C", "mdi:thermometer", 1, SensorSource::RoomTemp),
    spec("setpoint", "°C", "mdi:thermometer", 1, SensorSource::Setpoint),
    spec("fan_mode", "", "mdi:fan", 0, SensorSource::FanMode),
    spec("saf_percent", "%", "mdi:fan", 0, SensorSource::SupplyAirflowPercent),
    spec("saf_volume", "m³/h", "mdi:fan", 1, SensorSource::SupplyAirflowVolume),
    spec("eaf_percent", "%", "mdi:fan", 0, SensorSource::ExtractAirflowPercent),
    spec("eaf_volume", "m³/h", "mdi:fan", 1, SensorSource::ExtractAirflowVolume),
    spec("heat_demand", "%", "mdi:fire", 0, SensorSource::HeatDemand),
    spec("outdoor_air_temp", "°C", "mdi:thermometer", 1, SensorSource::OutdoorAirTemp),
    spec("supply_air_temp", "°C", "mdi:thermometer", 1, SensorSource::SupplyAirTemp),
    spec("extract_air_temp", "°C", "mdi:thermometer", 1, SensorSource::ExtractAirTemp),
];

pub fn sensor_spec(name: &str) -> Option<&'static SensorSpec> {
    SENSORS.iter().find(|s| s.name == name)
}

// ───────────────────────────────────────────────────────────────
// Snapshot
// ───────────────────────────────────────────────────────────────

/// Result of one successful refresh.  Optional fields are `None` when no
/// bound channel needs them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSnapshot {
    pub room_temp: f32,
    pub setpoint: f32,
    pub fan_mode: FanMode,
    pub mode: ClimateMode,
    pub outdoor_air_temp: Option<f32>,
    pub supply_air_temp: Option<f32>,
    pub extract_air_temp: Option<f32>,
    pub heat_demand: Option<f32>,
    /// Supply fan level, percent.
    pub supply_airflow: Option<f32>,
    /// Extract fan level, percent.
    pub extract_airflow: Option<f32>,
    pub alarms: AlarmState,
}

impl ClimateSnapshot {
    fn value_of(&self, source: SensorSource) -> Option<OutputValue> {
        let numeric = |v: Option<f32>| v.map(OutputValue::Numeric);
        match source {
            SensorSource::RoomTemp => numeric(Some(self.room_temp)),
            SensorSource::Setpoint => numeric(Some(self.setpoint)),
            SensorSource::FanMode => Some(OutputValue::text(self.fan_mode.name())),
            SensorSource::OutdoorAirTemp => numeric(self.outdoor_air_temp),
            SensorSource::SupplyAirTemp => numeric(self.supply_air_temp),
            SensorSource::ExtractAirTemp => numeric(self.extract_air_temp),
            SensorSource::HeatDemand => numeric(self.heat_demand),
            SensorSource::SupplyAirflowPercent => numeric(self.supply_airflow),
            SensorSource::SupplyAirflowVolume => numeric(self.supply_airflow.map(|p| p * AIRFLOW_M3H_PER_PERCENT)),
            SensorSource::ExtractAirflowPercent => numeric(self.extract_airflow),
            SensorSource::ExtractAirflowVolume => numeric(self.extract_airflow.map(|p| p * AIRFLOW_M3H_PER_PERCENT)),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Setpoint writer
// ───────────────────────────────────────────────────────────────

/// Cloneable handle that writes the setpoint register.
///
/// Safe to use from another task while the owning device refreshes; the
/// shared bus serializes the transactions.
pub struct SetpointWriter<B, D> {
    bus: BusHandle<B, D>,
    unit_id: u8,
    register: Register,
    min_c: f32,
    max_c: f32,
}

impl<B, D> Clone for SetpointWriter<B, D> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            unit_id: self.unit_id,
            register: self.register,
            min_c: self.min_c,
            max_c: self.max_c,
        }
    }
}

impl<B: BusTransport, D: DelayNs + Clone> SetpointWriter<B, D> {
    /// Range-check and write.  Out-of-range values never reach the bus.
    pub fn write(&self, celsius: f32) -> Result<()> {
        if !celsius.is_finite() || celsius < self.min_c || celsius > self.max_c {
            return Err(Error::OutOfRange);
        }
        self.bus
            .write(self.unit_id, self.register, &encode_deci_celsius(celsius))?;
        info!("Setpoint {:.1} °C written to unit {}", celsius, self.unit_id);
        Ok(())
    }

    pub fn limits(&self) -> (f32, f32) {
        (self.min_c, self.max_c)
    }
}

// ───────────────────────────────────────────────────────────────
// Driver
// ───────────────────────────────────────────────────────────────

pub struct SaveVtrClimate<B, D> {
    name: Name,
    bus: BusHandle<B, D>,
    unit_id: u8,
    update_interval_ms: u32,
    registers: ClimateRegisterMap,
    writer: SetpointWriter<B, D>,
    channels: ChannelTable,
    sensors: heapless::Vec<(ChannelHandle, SensorSource), MAX_SENSOR_BINDINGS>,
    alarms: heapless::Vec<(ChannelHandle, AlarmKind), MAX_ALARM_BINDINGS>,
    mode: ClimateMode,
    fan_mode: Option<FanMode>,
    target_setpoint: Option<f32>,
    last: Option<ClimateSnapshot>,
}

impl<B: BusTransport, D: DelayNs + Clone> SaveVtrClimate<B, D> {
    pub fn new(config: &ClimateConfig, bus: BusHandle<B, D>) -> Result<Self> {
        config.validate()?;

        let mut channels = ChannelTable::new();
        let mut sensors = heapless::Vec::new();
        for name in &config.sensors {
            let spec = sensor_spec(name).ok_or(Error::Config("climate: unknown sensor name"))?;
            let handle = channels.bind(spec.name, spec.meta())?;
            sensors
                .push((handle, spec.source))
                .map_err(|_| Error::Config("climate: too many sensors"))?;
        }
        let mut alarm_bindings = heapless::Vec::new();
        for name in &config.alarms {
            let kind = alarms::lookup(name).ok_or(Error::Config("climate: unknown alarm name"))?;
            let meta = match kind {
                AlarmKind::Boolean(_) => ChannelMeta::binary("mdi:alert"),
                AlarmKind::Categorical(_) => ChannelMeta::text("mdi:alert-circle"),
            };
            let handle = channels.bind(name, meta)?;
            alarm_bindings
                .push((handle, kind))
                .map_err(|_| Error::Config("climate: too many alarms"))?;
        }

        let writer = SetpointWriter {
            bus: bus.clone(),
            unit_id: config.unit_id,
            register: config.registers.setpoint,
            min_c: config.setpoint_min_c,
            max_c: config.setpoint_max_c,
        };

        Ok(Self {
            name: config.name.clone(),
            bus,
            unit_id: config.unit_id,
            update_interval_ms: config.update_interval_ms,
            registers: config.registers,
            writer,
            channels,
            sensors,
            alarms: alarm_bindings,
            mode: ClimateMode::Heat,
            fan_mode: None,
            target_setpoint: None,
            last: None,
        })
    }

    // ── Reads ─────────────────────────────────────────────────

    fn read_word(&self, register: Register) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.bus.read(self.unit_id, register, &mut buf)?;
        Ok(be_word(buf))
    }

    fn read_temp(&self, register: Register) -> Result<f32> {
        Ok(decode(self.read_word(register)?, &ChannelSpec::deci_celsius()).value)
    }

    fn read_temp_if(&self, needed: bool, register: Register) -> Result<Option<f32>> {
        if needed { self.read_temp(register).map(Some) } else { Ok(None) }
    }

    fn read_word_if(&self, needed: bool, register: Register) -> Result<Option<f32>> {
        if needed {
            self.read_word(register).map(|w| Some(f32::from(w)))
        } else {
            Ok(None)
        }
    }

    fn bound(&self, sources: &[SensorSource]) -> bool {
        self.sensors.iter().any(|(_, s)| sources.contains(s))
    }

    /// Read everything one cycle needs.  Nothing is committed unless every
    /// read succeeds.
    pub fn refresh(&mut self) -> Result<ClimateSnapshot> {
        use SensorSource as S;

        let room_temp = self.read_temp(self.registers.room_temp)?;
        let setpoint = self.read_temp(self.registers.setpoint)?;
        let fan_mode = FanMode::from_register(self.read_word(self.registers.fan_mode)?);
        let mode = match self.registers.mode {
            Some(reg) => ClimateMode::from_code(self.read_word(reg)?).unwrap_or(self.mode),
            None => self.mode,
        };

        let outdoor_air_temp = self.read_temp_if(self.bound(&[S::OutdoorAirTemp]), self.registers.outdoor_air_temp)?;
        let supply_air_temp = self.read_temp_if(self.bound(&[S::SupplyAirTemp]), self.registers.supply_air_temp)?;
        let extract_air_temp = self.read_temp_if(self.bound(&[S::ExtractAirTemp]), self.registers.extract_air_temp)?;
        let heat_demand = self.read_word_if(self.bound(&[S::HeatDemand]), self.registers.heat_demand)?;
        let supply_airflow = self.read_word_if(
            self.bound(&[S::SupplyAirflowPercent, S::SupplyAirflowVolume]),
            self.registers.supply_airflow,
        )?;
        let extract_airflow = self.read_word_if(
            self.bound(&[S::ExtractAirflowPercent, S::ExtractAirflowVolume]),
            self.registers.extract_airflow,
        )?;

        let boolean_word = self.read_word(self.registers.boolean_alarms)?;
        let mut categorical = [0u8; 4];
        self.bus
            .read(self.unit_id, self.registers.categorical_alarms, &mut categorical)?;
        let alarm_state = alarms::decode(boolean_word, be_dword(categorical));

        let snapshot = ClimateSnapshot {
            room_temp,
            setpoint,
            fan_mode,
            mode,
            outdoor_air_temp,
            supply_air_temp,
            extract_air_temp,
            heat_demand,
            supply_airflow,
            extract_airflow,
            alarms: alarm_state,
        };

        self.target_setpoint = Some(setpoint);
        self.fan_mode = Some(fan_mode);
        self.mode = mode;
        self.last = Some(snapshot);
        debug!(
            "{}: room {:.1} °C, setpoint {:.1} °C, fan {}",
            self.name, room_temp, setpoint, fan_mode
        );
        Ok(snapshot)
    }

    // ── Writes ────────────────────────────────────────────────

    pub fn set_setpoint(&mut self, celsius: f32) -> Result<()> {
        self.writer.write(celsius)?;
        self.target_setpoint = Some(celsius);
        Ok(())
    }

    /// COOKERHOOD cannot be requested and is refused without a bus write.
    pub fn set_fan_mode(&mut self, mode: FanMode) -> Result<()> {
        let code = mode.request_code().ok_or(Error::OutOfRange)?;
        self.bus
            .write(self.unit_id, self.registers.fan_mode_request, &code.to_be_bytes())?;
        info!("{}: fan mode {} requested", self.name, mode);
        self.fan_mode = Some(mode);
        Ok(())
    }

    /// Writes the mode register when the unit has one; otherwise the mode
    /// is only tracked locally.
    pub fn set_mode(&mut self, mode: ClimateMode) -> Result<()> {
        if let Some(reg) = self.registers.mode {
            self.bus
                .write(self.unit_id, reg, &mode.code().to_be_bytes())?;
        }
        info!("{}: mode {:?}", self.name, mode);
        self.mode = mode;
        Ok(())
    }

    pub fn setpoint_writer(&self) -> SetpointWriter<B, D> {
        self.writer.clone()
    }

    // ── State ─────────────────────────────────────────────────

    pub fn current_temperature(&self) -> Option<f32> {
        self.last.map(|s| s.room_temp)
    }

    pub fn target_temperature(&self) -> Option<f32> {
        self.target_setpoint
    }

    pub fn mode(&self) -> ClimateMode {
        self.mode
    }

    pub fn fan_mode(&self) -> Option<FanMode> {
        self.fan_mode
    }

    pub fn snapshot(&self) -> Option<&ClimateSnapshot> {
        self.last.as_ref()
    }
}

impl<B, D> PollingDevice for SaveVtrClimate<B, D>
where
    B: BusTransport + Send,
    D: DelayNs + Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::SaveVtr
    }

    fn update_interval_ms(&self) -> u32 {
        self.update_interval_ms
    }

    fn poll(&mut self, sink: &mut dyn PublishSink) -> Result<()> {
        let snapshot = self.refresh()?;

        for (handle, source) in &self.sensors {
            if let Some(value) = snapshot.value_of(*source) {
                sink.publish(&self.name, self.channels.set(*handle, value));
            }
        }
        for (handle, kind) in &self.alarms {
            let active = snapshot.alarms.get(*kind);
            let value = match kind {
                AlarmKind::Boolean(_) => OutputValue::Binary(active),
                AlarmKind::Categorical(_) => OutputValue::text(alarms::categorical_text(active)),
            };
            sink.publish(&self.name, self.channels.set(*handle, value));
        }
        Ok(())
    }

    fn control(&mut self, command: &ControlCommand) -> Result<()> {
        match command {
            ControlCommand::SetSetpoint { celsius, .. } => self.set_setpoint(*celsius),
            ControlCommand::SetFanMode { mode, .. } => self.set_fan_mode(*mode),
            ControlCommand::SetMode { mode, .. } => self.set_mode(*mode),
            _ => Err(Error::Config("command not supported by climate device")),
        }
    }

    fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    fn dump_config(&self) {
        let (min, max) = self.writer.limits();
        info!("SaveVTR climate '{}':", self.name);
        info!("  Bus: {}, unit {}", self.bus.label(), self.unit_id);
        info!("  Update interval: {} ms", self.update_interval_ms);
        info!("  Setpoint range: {:.1}-{:.1} °C", min, max);
        match self.registers.mode {
            Some(reg) => info!("  Mode register: {:?} {}", reg.space, reg.offset),
            None => info!("  Mode register: none (tracked locally)"),
        }
        info!(
            "  Channels: {} sensors, {} alarms",
            self.sensors.len(),
            self.alarms.len()
        );
        if let Some(s) = &self.last {
            info!("  Room: {:.1} °C, setpoint {:.1} °C, fan {}", s.room_temp, s.setpoint, s.fan_mode);
        }
    }
}
