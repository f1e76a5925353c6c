//! Ventilink firmware: main entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │  I2cDriver ─▶ I2cBus      UartLink ─▶ ModbusRtuBus            │
//! │  LogEventSink · LogPublishSink · MonotonicClock · ThreadDelay  │
//! │                                                               │
//! │  ──────────────── Port Trait Boundary ──────────────────      │
//! │                                                               │
//! │  ┌─────────────────────────────────────────────────────────┐  │
//! │  │  PollingService: Scheduler · CurrentLoopSensor ·        │  │
//! │  │                  SaveVtrClimate                          │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use embedded_hal::delay::DelayNs;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{self, UartDriver};
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use ventilink::adapters::log_sink::{LogEventSink, LogPublishSink};
use ventilink::adapters::time::{MonotonicClock, ThreadDelay, TickTimer};
use ventilink::adapters::uart::UartLink;
use ventilink::app::builder::{Buses, build_service};
use ventilink::bus::SharedBus;
use ventilink::bus::i2c::I2cBus;
use ventilink::bus::modbus::ModbusRtuBus;
use ventilink::config::SystemConfig;

const DEFAULT_CONFIG: &str = include_str!("../config/default.json");

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Ventilink v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = match SystemConfig::from_json(DEFAULT_CONFIG) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config rejected ({}), running with no devices", e);
            SystemConfig::default()
        }
    };

    // ── 3. Buses ──────────────────────────────────────────────
    let peripherals = Peripherals::take()?;

    let i2c = match &config.i2c {
        Some(bus) => {
            let cfg = I2cConfig::new().baudrate(Hertz(bus.frequency_khz * 1_000));
            // SAFETY: pin numbers come from validated configuration and each
            // is handed to exactly one driver.
            let (sda, scl) = unsafe {
                (AnyIOPin::new(i32::from(bus.sda_pin)), AnyIOPin::new(i32::from(bus.scl_pin)))
            };
            let driver = I2cDriver::new(peripherals.i2c0, sda, scl, &cfg)?;
            info!("I2C up: SDA={} SCL={} {} kHz", bus.sda_pin, bus.scl_pin, bus.frequency_khz);
            Some(SharedBus::new("i2c", I2cBus::new(driver), ThreadDelay, bus.retry).into_handle())
        }
        None => None,
    };

    let modbus = match &config.modbus {
        Some(bus) => {
            let cfg = uart::config::Config::new().baudrate(Hertz(bus.baud_rate));
            // SAFETY: as above.
            let (tx, rx) = unsafe {
                (AnyIOPin::new(i32::from(bus.tx_pin)), AnyIOPin::new(i32::from(bus.rx_pin)))
            };
            let driver = UartDriver::new(
                peripherals.uart1,
                tx,
                rx,
                Option::<AnyIOPin>::None,
                Option::<AnyIOPin>::None,
                &cfg,
            )?;
            info!("Modbus up: TX={} RX={} {} baud", bus.tx_pin, bus.rx_pin, bus.baud_rate);
            let transport = ModbusRtuBus::new(UartLink::new(driver), bus.timeout_ms);
            Some(SharedBus::new("modbus", transport, ThreadDelay, bus.retry).into_handle())
        }
        None => None,
    };

    // ── 4. Devices ────────────────────────────────────────────
    let mut events = LogEventSink::new();
    let mut values = LogPublishSink::new();
    let mut service = build_service(&config, &Buses { i2c, modbus }, &mut events)?;
    service.start(&mut values, &mut events);

    info!("System ready. Entering poll loop.");

    // ── 5. Poll loop ──────────────────────────────────────────
    let clock = MonotonicClock::new();
    let mut timer = TickTimer::default();
    let mut delay = ThreadDelay;
    loop {
        let elapsed = timer.elapsed(clock.uptime_ms());
        service.tick(elapsed, &mut values, &mut events);
        service.drain_commands(&mut values, &mut events);
        delay.delay_ms(config.tick_interval_ms);
    }
}
