//! Drivers sharing one physical bus from several threads never interleave
//! transactions.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ventilink::app::ports::{NullSink, PollingDevice};
use ventilink::bus::{Register, RetryPolicy};
use ventilink::climate::SaveVtrClimate;
use ventilink::config::{ClimateConfig, CurrentLoopConfig, name};
use ventilink::sensors::CurrentLoopSensor;

use super::mock_bus::{ModuleBus, UnitBus};

const ROUNDS: usize = 20;

#[test]
fn two_modules_on_one_i2c_bus_never_overlap() {
    let modules = ModuleBus::new().with_hold(Duration::from_micros(200));
    modules.add_module(0x55, 1000);
    modules.add_module(0x56, 3000);
    let tracer = modules.tracer();
    let bus = modules.handle(RetryPolicy::default());

    let handles: Vec<_> = [(0x55u8, "a"), (0x56, "b")]
        .into_iter()
        .map(|(address, label)| {
            let config = CurrentLoopConfig {
                name: name(label),
                address,
                ..CurrentLoopConfig::default()
            };
            let mut sensor = CurrentLoopSensor::new(&config, Arc::clone(&bus)).unwrap();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    sensor.poll(&mut NullSink).unwrap();
                }
                sensor.last_reading().unwrap().raw
            })
        })
        .collect();

    let raws: Vec<u16> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(raws, [1000, 3000]);
    assert_eq!(tracer.transactions(), 2 * ROUNDS as u32);
    assert_eq!(tracer.overlaps(), 0);
    assert_eq!(bus.attempts(), 2 * ROUNDS as u32);
}

#[test]
fn setpoint_writer_and_refresh_serialize() {
    let unit = UnitBus::save_vtr().with_hold(Duration::from_micros(200));
    let tracer = unit.tracer();
    let mut climate = SaveVtrClimate::new(&ClimateConfig::default(), unit.handle(RetryPolicy::default())).unwrap();
    let writer = climate.setpoint_writer();

    let writes = thread::spawn(move || {
        for i in 0..ROUNDS {
            writer.write(18.0 + i as f32 * 0.5).unwrap();
        }
    });
    for _ in 0..ROUNDS {
        climate.refresh().unwrap();
    }
    writes.join().unwrap();

    assert_eq!(tracer.overlaps(), 0);
    assert_eq!(unit.get(Register::holding(2000)), Some(275));
    let setpoint_writes = unit
        .writes()
        .iter()
        .filter(|(reg, _)| *reg == Register::holding(2000))
        .count();
    assert_eq!(setpoint_writes, ROUNDS);
}
