//! 4–20 mA current-loop input module (I2C, default address 0x55).
//!
//! Register map of the module firmware:
//!
//! | reg  | width | content                                 |
//! |------|-------|-----------------------------------------|
//! | 0x00 | u16 LE | 12-bit ADC reading                     |
//! | 0x10 | u8     | 8-bit ADC reading                      |
//! | 0x20 | u16 LE | loop current, hundredths of a mA       |
//! | 0x30 | u16 LE | calibration word (write)               |
//! | 0xFE | u8     | firmware version                       |
//! | 0xFF | u8     | I2C address                            |
//!
//! Each poll reads the 12-bit ADC register once.  In 10-bit mode the
//! sample is reduced to 10 bits before scaling, so both modes span the
//! same 0–20 mA range.

use embedded_hal::delay::DelayNs;
use log::{debug, info};

use crate::app::commands::ControlCommand;
use crate::app::ports::{DeviceKind, PollingDevice, PublishSink};
use crate::bus::{BusHandle, BusTransport, Register};
use crate::config::{CurrentLoopConfig, Name};
use crate::error::{Error, Result};
use crate::outputs::{ChannelHandle, ChannelMeta, ChannelTable, OutputValue};
use crate::registers::{BitWidth, ProcessScale, adc_to_milliamps, le_word};

pub const REG_ADC_12BIT: Register = Register::holding(0x00);
pub const REG_ADC_8BIT: Register = Register::holding(0x10);
pub const REG_CURRENT: Register = Register::holding(0x20);
pub const REG_CALIBRATION: Register = Register::holding(0x30);
pub const REG_FIRMWARE_VERSION: Register = Register::holding(0xFE);
pub const REG_I2C_ADDRESS: Register = Register::holding(0xFF);

const ADC_MASK: u16 = 0x0FFF;

/// One decoded sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentLoopReading {
    /// ADC counts at the configured resolution.
    pub raw: u16,
    pub milliamps: f32,
    /// Loop current mapped through the process scale, if configured.
    pub process_value: Option<f32>,
}

pub struct CurrentLoopSensor<B, D> {
    name: Name,
    bus: BusHandle<B, D>,
    address: u8,
    width: BitWidth,
    update_interval_ms: u32,
    channels: ChannelTable,
    current: Option<ChannelHandle>,
    raw_adc: Option<ChannelHandle>,
    process: Option<(ChannelHandle, ProcessScale)>,
    last: Option<CurrentLoopReading>,
}

impl<B: BusTransport, D: DelayNs + Clone> CurrentLoopSensor<B, D> {
    /// Validate `config` and bind its channels.
    pub fn new(config: &CurrentLoopConfig, bus: BusHandle<B, D>) -> Result<Self> {
        config.validate()?;

        let mut channels = ChannelTable::new();
        let current = config
            .current
            .as_ref()
            .map(|c| channels.bind_config(c, ChannelMeta::numeric("mA", "mdi:current-dc", 1)))
            .transpose()?;
        let raw_adc = config
            .raw_adc
            .as_ref()
            .map(|c| channels.bind_config(c, ChannelMeta::numeric("", "mdi:chip", 0)))
            .transpose()?;
        let process = config
            .process_value
            .as_ref()
            .map(|pv| {
                channels
                    .bind_config(&pv.channel, ChannelMeta::numeric("", "mdi:gauge", 1))
                    .map(|h| (h, pv.scale))
            })
            .transpose()?;

        Ok(Self {
            name: config.name.clone(),
            bus,
            address: config.address,
            width: if config.enable_12bit_mode {
                BitWidth::Bits12
            } else {
                BitWidth::Bits10
            },
            update_interval_ms: config.update_interval_ms,
            channels,
            current,
            raw_adc,
            process,
            last: None,
        })
    }

    pub fn resolution(&self) -> BitWidth {
        self.width
    }

    pub fn last_reading(&self) -> Option<CurrentLoopReading> {
        self.last
    }

    /// Read and decode one sample without publishing it.
    pub fn acquire(&self) -> Result<CurrentLoopReading> {
        let mut buf = [0u8; 2];
        self.bus.read(self.address, REG_ADC_12BIT, &mut buf)?;
        let sample = le_word(buf) & ADC_MASK;
        let raw = match self.width {
            BitWidth::Bits10 => sample >> 2,
            _ => sample,
        };
        let milliamps = adc_to_milliamps(raw, self.width);
        Ok(CurrentLoopReading {
            raw,
            milliamps,
            process_value: self.process.map(|(_, scale)| scale.apply(milliamps)),
        })
    }

    /// Coarse 8-bit ADC sample, outside the polled path.
    pub fn read_adc_8bit(&self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.bus.read(self.address, REG_ADC_8BIT, &mut buf)?;
        Ok(buf[0])
    }

    /// Loop current as computed by the module firmware.
    pub fn read_module_current(&self) -> Result<f32> {
        let mut buf = [0u8; 2];
        self.bus.read(self.address, REG_CURRENT, &mut buf)?;
        Ok(f32::from(le_word(buf)) / 100.0)
    }

    /// Write the module's calibration word.
    pub fn calibrate(&self, value: u16) -> Result<()> {
        self.bus
            .write(self.address, REG_CALIBRATION, &value.to_le_bytes())?;
        info!("{}: calibration word {:#06x} written", self.name, value);
        Ok(())
    }

    pub fn firmware_version(&self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.bus.read(self.address, REG_FIRMWARE_VERSION, &mut buf)?;
        Ok(buf[0])
    }

    /// Address the module reports for itself.
    pub fn read_i2c_address(&self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.bus.read(self.address, REG_I2C_ADDRESS, &mut buf)?;
        Ok(buf[0])
    }
}

impl<B, D> PollingDevice for CurrentLoopSensor<B, D>
where
    B: BusTransport + Send,
    D: DelayNs + Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::CurrentLoop
    }

    fn update_interval_ms(&self) -> u32 {
        self.update_interval_ms
    }

    fn poll(&mut self, sink: &mut dyn PublishSink) -> Result<()> {
        let reading = self.acquire()?;
        debug!(
            "{}: raw={} current={:.2} mA",
            self.name, reading.raw, reading.milliamps
        );

        if let Some(h) = self.raw_adc {
            sink.publish(&self.name, self.channels.set(h, OutputValue::Numeric(f32::from(reading.raw))));
        }
        if let Some(h) = self.current {
            sink.publish(&self.name, self.channels.set(h, OutputValue::Numeric(reading.milliamps)));
        }
        if let (Some((h, _)), Some(value)) = (self.process, reading.process_value) {
            sink.publish(&self.name, self.channels.set(h, OutputValue::Numeric(value)));
        }
        self.last = Some(reading);
        Ok(())
    }

    fn control(&mut self, command: &ControlCommand) -> Result<()> {
        match command {
            ControlCommand::Calibrate { value, .. } => self.calibrate(*value),
            _ => Err(Error::Config("command not supported by current-loop sensor")),
        }
    }

    fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    fn dump_config(&self) {
        info!("Current-loop sensor '{}':", self.name);
        info!("  Bus: {}, address {:#04x}", self.bus.label(), self.address);
        info!("  Resolution: {:?}", self.width);
        info!("  Update interval: {} ms", self.update_interval_ms);
        for channel in self.channels.iter() {
            info!(
                "  Channel '{}' [{}] accuracy {}",
                channel.name, channel.meta.unit, channel.meta.accuracy_decimals
            );
        }
    }
}
