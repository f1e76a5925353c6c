//! SAVE VTR climate device against a simulated register file.

use ventilink::app::ports::PollingDevice;
use ventilink::bus::{Register, RetryPolicy};
use ventilink::climate::fan_mode::FanMode;
use ventilink::climate::{ClimateMode, SaveVtrClimate};
use ventilink::config::{ClimateConfig, name};
use ventilink::error::{Error, TransportError};
use ventilink::outputs::OutputValue;

use super::mock_bus::{Collector, UnitBus};

fn policy() -> RetryPolicy {
    RetryPolicy { max_retries: 1, backoff_ms: 1 }
}

fn config(sensors: &[&str], alarms: &[&str]) -> ClimateConfig {
    let mut cfg = ClimateConfig::default();
    for s in sensors {
        cfg.sensors.push(name(s)).unwrap();
    }
    for a in alarms {
        cfg.alarms.push(name(a)).unwrap();
    }
    cfg
}

fn numeric(sink: &Collector, channel: &str) -> f32 {
    sink.last(channel).and_then(OutputValue::as_f32).unwrap()
}

// ── Setpoint writes ───────────────────────────────────────────

#[test]
fn out_of_range_setpoint_never_touches_the_bus() {
    let unit = UnitBus::save_vtr();
    let tracer = unit.tracer();
    let mut climate = SaveVtrClimate::new(&ClimateConfig::default(), unit.handle(policy())).unwrap();

    for bad in [11.9, 30.1, f32::NAN, f32::INFINITY] {
        assert_eq!(climate.set_setpoint(bad), Err(Error::OutOfRange));
    }
    assert_eq!(tracer.transactions(), 0);
    assert!(unit.writes().is_empty());
    assert_eq!(climate.target_temperature(), None);
}

#[test]
fn setpoint_limits_are_inclusive_and_encoded_in_tenths() {
    let unit = UnitBus::save_vtr();
    let mut climate = SaveVtrClimate::new(&ClimateConfig::default(), unit.handle(policy())).unwrap();

    climate.set_setpoint(12.0).unwrap();
    climate.set_setpoint(30.0).unwrap();
    climate.set_setpoint(22.5).unwrap();
    assert_eq!(
        unit.writes(),
        vec![
            (Register::holding(2000), 120),
            (Register::holding(2000), 300),
            (Register::holding(2000), 225),
        ]
    );
    assert_eq!(climate.target_temperature(), Some(22.5));
}

#[test]
fn custom_setpoint_range_applies() {
    let unit = UnitBus::save_vtr();
    let cfg = ClimateConfig {
        setpoint_min_c: 15.0,
        setpoint_max_c: 25.0,
        ..ClimateConfig::default()
    };
    let mut climate = SaveVtrClimate::new(&cfg, unit.handle(policy())).unwrap();
    assert_eq!(climate.set_setpoint(14.0), Err(Error::OutOfRange));
    assert_eq!(climate.set_setpoint(26.0), Err(Error::OutOfRange));
    assert!(climate.set_setpoint(25.0).is_ok());
}

// ── Refresh ───────────────────────────────────────────────────

#[test]
fn poll_publishes_sensors_and_derived_volume() {
    let unit = UnitBus::save_vtr();
    let cfg = config(
        &["room_temp", "setpoint", "fan_mode", "saf_percent", "saf_volume", "eaf_volume", "outdoor_air_temp"],
        &[],
    );
    let mut climate = SaveVtrClimate::new(&cfg, unit.handle(policy())).unwrap();
    let mut sink = Collector::default();
    climate.poll(&mut sink).unwrap();

    assert!((numeric(&sink, "room_temp") - 21.5).abs() < 1e-3);
    assert!((numeric(&sink, "setpoint") - 22.0).abs() < 1e-3);
    assert_eq!(sink.last("fan_mode").and_then(OutputValue::as_text), Some("MANUAL"));
    assert!((numeric(&sink, "saf_percent") - 40.0).abs() < 1e-3);
    assert!((numeric(&sink, "saf_volume") - 120.0).abs() < 1e-3);
    assert!((numeric(&sink, "eaf_volume") - 105.0).abs() < 1e-3);
    assert!((numeric(&sink, "outdoor_air_temp") + 3.5).abs() < 1e-3);

    assert_eq!(climate.current_temperature(), Some(21.5));
    assert_eq!(climate.fan_mode(), Some(FanMode::Manual));
}

#[test]
fn timeout_leaves_previous_values_in_place() {
    let unit = UnitBus::save_vtr();
    let cfg = config(&["room_temp", "setpoint"], &["alarm_fire"]);
    let mut climate = SaveVtrClimate::new(&cfg, unit.handle(policy())).unwrap();
    let mut sink = Collector::default();
    climate.poll(&mut sink).unwrap();
    let published = sink.values.len();

    unit.set(Register::holding(2001), 250);
    unit.fail_at(Register::input(15901), TransportError::Timeout);

    assert_eq!(
        climate.poll(&mut sink),
        Err(Error::Transport(TransportError::Timeout))
    );
    assert_eq!(sink.values.len(), published, "nothing published on failure");
    assert_eq!(climate.current_temperature(), Some(21.5), "snapshot not partially updated");
    let room = climate.channels().find("room_temp").unwrap();
    assert_eq!(room.value(), Some(&OutputValue::Numeric(21.5)));

    unit.heal(Register::input(15901));
    climate.poll(&mut sink).unwrap();
    assert_eq!(climate.current_temperature(), Some(25.0));
}

#[test]
fn unbound_optional_registers_are_not_read() {
    let unit = UnitBus::save_vtr();
    let tracer = unit.tracer();
    let mut climate = SaveVtrClimate::new(&config(&["room_temp"], &[]), unit.handle(policy())).unwrap();
    climate.refresh().unwrap();
    // room, setpoint, fan mode, boolean alarms, categorical alarms
    assert_eq!(tracer.transactions(), 5);
}

// ── Alarms ────────────────────────────────────────────────────

#[test]
fn alarms_publish_binary_and_text() {
    let unit = UnitBus::save_vtr();
    // Boolean bit 0 (filter_alarm_was_detected); categorical bit 30 (alarm_fire)
    // lives in the high word.
    unit.set(Register::input(15900), 0b1);
    unit.set(Register::input(15901), 1 << 14);
    unit.set(Register::input(15902), 0);

    let cfg = config(&[], &["filter_alarm_was_detected", "output_alarm", "alarm_fire", "alarm_saf_ctrl"]);
    let mut climate = SaveVtrClimate::new(&cfg, unit.handle(policy())).unwrap();
    let mut sink = Collector::default();
    climate.poll(&mut sink).unwrap();

    assert_eq!(sink.last("filter_alarm_was_detected"), Some(&OutputValue::Binary(true)));
    assert_eq!(sink.last("output_alarm"), Some(&OutputValue::Binary(false)));
    assert_eq!(sink.last("alarm_fire").and_then(OutputValue::as_text), Some("Active"));
    assert_eq!(sink.last("alarm_saf_ctrl").and_then(OutputValue::as_text), Some("Inactive"));
}

#[test]
fn unknown_alarm_name_rejects_device() {
    let unit = UnitBus::save_vtr();
    let cfg = config(&[], &["alarm_does_not_exist"]);
    assert!(matches!(
        SaveVtrClimate::new(&cfg, unit.handle(policy())),
        Err(Error::Config(_))
    ));
}

// ── Fan mode and operating mode ───────────────────────────────

#[test]
fn fan_mode_request_written_and_cookerhood_refused() {
    let unit = UnitBus::save_vtr();
    let tracer = unit.tracer();
    let mut climate = SaveVtrClimate::new(&ClimateConfig::default(), unit.handle(policy())).unwrap();

    climate.set_fan_mode(FanMode::Away).unwrap();
    assert_eq!(unit.writes(), vec![(Register::holding(1161), 6)]);
    assert_eq!(climate.fan_mode(), Some(FanMode::Away));

    let before = tracer.transactions();
    assert_eq!(climate.set_fan_mode(FanMode::CookerHood), Err(Error::OutOfRange));
    assert_eq!(tracer.transactions(), before);
    assert_eq!(climate.fan_mode(), Some(FanMode::Away));
}

#[test]
fn mode_without_register_is_local() {
    let unit = UnitBus::save_vtr();
    let mut climate = SaveVtrClimate::new(&ClimateConfig::default(), unit.handle(policy())).unwrap();
    assert_eq!(climate.mode(), ClimateMode::Heat);
    climate.set_mode(ClimateMode::Off).unwrap();
    assert_eq!(climate.mode(), ClimateMode::Off);
    assert!(unit.writes().is_empty());
    climate.refresh().unwrap();
    assert_eq!(climate.mode(), ClimateMode::Off);
}

#[test]
fn mode_register_written_and_read_back() {
    let unit = UnitBus::save_vtr();
    let mode_reg = Register::holding(1800);
    unit.set(mode_reg, 2);
    let mut cfg = ClimateConfig::default();
    cfg.registers.mode = Some(mode_reg);
    let mut climate = SaveVtrClimate::new(&cfg, unit.handle(policy())).unwrap();

    climate.refresh().unwrap();
    assert_eq!(climate.mode(), ClimateMode::Auto);

    climate.set_mode(ClimateMode::Off).unwrap();
    assert_eq!(unit.get(mode_reg), Some(0));
}
