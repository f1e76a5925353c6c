//! End-to-end: configuration → builder → service → scheduled polls.

use embedded_hal::i2c::ErrorKind;
use ventilink::adapters::time::ThreadDelay;
use ventilink::app::builder::{Buses, build_service};
use ventilink::app::commands::{ControlCommand, submit};
use ventilink::app::events::AppEvent;
use ventilink::app::service::PollingService;
use ventilink::bus::i2c::I2cBus;
use ventilink::bus::{Register, RetryPolicy};
use ventilink::config::{SystemConfig, name};
use ventilink::error::{Error, TransportError};
use ventilink::outputs::OutputValue;
use ventilink::scheduler::SlotState;

use super::mock_bus::{Collector, EventLog, ModuleBus, UnitBus};

type TestBuses = Buses<I2cBus<ModuleBus>, ThreadDelay, UnitBus, ThreadDelay>;

const CONFIG: &str = r#"{
    "i2c": {},
    "modbus": {},
    "current_loops": [
        { "name": "tank", "address": 85, "update_interval_ms": 1000 }
    ],
    "climate": {
        "name": "vent",
        "update_interval_ms": 3000,
        "sensors": ["room_temp", "fan_mode"],
        "alarms": ["alarm_filter"]
    }
}"#;

fn policy() -> RetryPolicy {
    RetryPolicy { max_retries: 1, backoff_ms: 1 }
}

fn setup() -> (PollingService, ModuleBus, UnitBus, Collector, EventLog) {
    let modules = ModuleBus::new();
    modules.add_module(0x55, 2048);
    let unit = UnitBus::save_vtr();
    let buses: TestBuses = Buses {
        i2c: Some(modules.handle(policy())),
        modbus: Some(unit.handle(policy())),
    };
    let config = SystemConfig::from_json(CONFIG).unwrap();
    let mut events = EventLog::default();
    let service = build_service(&config, &buses, &mut events).unwrap();
    (service, modules, unit, Collector::default(), events)
}

fn run_for(service: &mut PollingService, ms: u32, sink: &mut Collector, events: &mut EventLog) {
    for _ in 0..ms / 100 {
        service.tick(100, sink, events);
    }
}

#[test]
fn start_polls_every_device_once() {
    let (mut service, _, _, mut sink, mut events) = setup();
    assert_eq!(service.len(), 2);
    service.start(&mut sink, &mut events);

    assert_eq!(sink.count("current_value"), 1);
    assert_eq!(sink.count("room_temp"), 1);
    assert_eq!(sink.last("alarm_filter").and_then(OutputValue::as_text), Some("Inactive"));
    let current = sink.last("current_value").and_then(OutputValue::as_f32).unwrap();
    assert!((current - 10.0).abs() < 0.01);
}

#[test]
fn devices_poll_at_their_own_intervals() {
    let (mut service, _, _, mut sink, mut events) = setup();
    service.start(&mut sink, &mut events);
    run_for(&mut service, 3_000, &mut sink, &mut events);

    assert_eq!(sink.count("current_value"), 4);
    assert_eq!(sink.count("room_temp"), 2);
    assert_eq!(service.stats("tank").unwrap().cycles, 4);
    assert_eq!(service.stats("vent").unwrap().cycles, 2);
}

#[test]
fn failing_device_keeps_being_polled_and_recovers() {
    let (mut service, modules, _, mut sink, mut events) = setup();
    service.start(&mut sink, &mut events);

    // Two attempts per cycle (one retry); both fail.
    modules.fail_next(ErrorKind::Other);
    modules.fail_next(ErrorKind::Other);
    run_for(&mut service, 1_000, &mut sink, &mut events);
    assert_eq!(events.poll_failures("tank"), 1);
    assert_eq!(service.stats("tank").unwrap().failures, 1);
    assert_eq!(service.state("tank"), Some(SlotState::Idle));

    modules.set_raw(0x55, 4095);
    run_for(&mut service, 1_000, &mut sink, &mut events);
    let current = sink.last("current_value").and_then(OutputValue::as_f32).unwrap();
    assert!((current - 20.0).abs() < 0.01);
}

#[test]
fn nack_is_not_retried() {
    let (mut service, modules, _, mut sink, mut events) = setup();
    let tracer = modules.tracer();
    modules.fail_next(ErrorKind::NoAcknowledge(embedded_hal::i2c::NoAcknowledgeSource::Data));
    service.start(&mut sink, &mut events);

    assert_eq!(tracer.transactions(), 1);
    assert!(events.events.iter().any(|e| matches!(
        e,
        AppEvent::PollFailed { error: Error::Transport(TransportError::Nack), .. }
    )));
}

#[test]
fn commands_route_to_the_named_device() {
    let (mut service, _, unit, mut sink, mut events) = setup();

    let cmd = ControlCommand::SetSetpoint { device: name("vent"), celsius: 19.5 };
    service.handle_command(&cmd, &mut sink, &mut events).unwrap();
    assert_eq!(unit.get(Register::holding(2000)), Some(195));

    let bad = ControlCommand::SetSetpoint { device: name("vent"), celsius: 40.0 };
    assert_eq!(service.handle_command(&bad, &mut sink, &mut events), Err(Error::OutOfRange));
    assert_eq!(unit.get(Register::holding(2000)), Some(195));

    let wrong = ControlCommand::SetSetpoint { device: name("tank"), celsius: 20.0 };
    assert!(matches!(
        service.handle_command(&wrong, &mut sink, &mut events),
        Err(Error::Config(_))
    ));

    let unknown = ControlCommand::PollNow { device: name("nobody") };
    assert_eq!(
        service.handle_command(&unknown, &mut sink, &mut events),
        Err(Error::Config("unknown device"))
    );
}

#[test]
fn queued_commands_are_drained_by_the_loop() {
    let (mut service, modules, _, mut sink, mut events) = setup();

    assert!(submit(ControlCommand::PollNow { device: name("tank") }));
    assert!(submit(ControlCommand::Calibrate { device: name("tank"), value: 0x1234 }));
    assert_eq!(service.drain_commands(&mut sink, &mut events), 2);

    assert_eq!(sink.count("current_value"), 1);
    assert_eq!(modules.writes(), vec![(0x55, 0x30, vec![0x34, 0x12])]);
    assert_eq!(service.drain_commands(&mut sink, &mut events), 0);
}

#[test]
fn stopped_device_never_polls_again() {
    let (mut service, _, _, mut sink, mut events) = setup();
    service.start(&mut sink, &mut events);
    service.stop("tank", &mut events).unwrap();
    run_for(&mut service, 5_000, &mut sink, &mut events);

    assert_eq!(sink.count("current_value"), 1);
    assert_eq!(service.state("tank"), Some(SlotState::Stopped));
    assert!(events.events.iter().any(|e| matches!(
        e,
        AppEvent::DeviceStopped { device, stats } if device == "tank" && stats.cycles == 1
    )));

    let poll = ControlCommand::PollNow { device: name("tank") };
    assert_eq!(
        service.handle_command(&poll, &mut sink, &mut events),
        Err(Error::Config("device not idle"))
    );
}
