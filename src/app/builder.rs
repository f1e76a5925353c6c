//! Configuration → running service.
//!
//! Each component declares the components it needs; buses come up before
//! the devices on them.  A device instance that is malformed, fails
//! validation, names a missing bus, reuses a bus address, or exceeds the
//! module limit is rejected on its own and the rest of the configuration
//! still loads.

use embedded_hal::delay::DelayNs;
use log::{error, info};

use crate::bus::{BusHandle, BusTransport};
use crate::climate::SaveVtrClimate;
use crate::config::{MAX_CURRENT_LOOPS, SystemConfig, name};
use crate::error::{Error, Result};
use crate::sensors::CurrentLoopSensor;

use super::events::AppEvent;
use super::ports::{DeviceKind, EventSink, PollingDevice};
use super::service::PollingService;

pub const I2C_COMPONENT: &str = "i2c";
pub const MODBUS_COMPONENT: &str = "modbus_controller";
pub const CURRENT_LOOP_COMPONENT: &str = DeviceKind::CurrentLoop.component();
pub const SAVE_VTR_COMPONENT: &str = DeviceKind::SaveVtr.component();

/// A component and the components it depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub name: &'static str,
    pub depends_on: &'static [&'static str],
}

pub const fn component(name: &'static str, depends_on: &'static [&'static str]) -> Component {
    Component { name, depends_on }
}

/// Order `components` so every component follows its dependencies.
///
/// Ties keep the input order.  A dependency that is not in the list, or a
/// cycle, is a configuration error.
pub fn resolve_startup_order(components: &[Component]) -> Result<Vec<&'static str>> {
    for c in components {
        if c.depends_on.iter().any(|d| !components.iter().any(|o| o.name == *d)) {
            return Err(Error::Config("component depends on a missing component"));
        }
    }

    let mut order: Vec<&'static str> = Vec::with_capacity(components.len());
    while order.len() < components.len() {
        let next = components.iter().find(|c| {
            !order.contains(&c.name) && c.depends_on.iter().all(|d| order.contains(d))
        });
        match next {
            Some(c) => order.push(c.name),
            None => return Err(Error::Config("component dependency cycle")),
        }
    }
    Ok(order)
}

/// Components present in `config`, with their dependencies.
pub fn components_for(config: &SystemConfig) -> Vec<Component> {
    let mut list = Vec::new();
    if config.i2c.is_some() {
        list.push(component(I2C_COMPONENT, &[]));
    }
    if config.modbus.is_some() {
        list.push(component(MODBUS_COMPONENT, &[]));
    }
    if !config.current_loops.is_empty() {
        list.push(component(CURRENT_LOOP_COMPONENT, &[I2C_COMPONENT]));
    }
    if config.climate.is_some() {
        list.push(component(SAVE_VTR_COMPONENT, &[MODBUS_COMPONENT]));
    }
    list
}

/// Buses available to the builder.  `None` when the bus is not configured.
pub struct Buses<I, DI, M, DM> {
    pub i2c: Option<BusHandle<I, DI>>,
    pub modbus: Option<BusHandle<M, DM>>,
}

/// Build a service from `config`, registering every valid device.
///
/// Rejections are logged and emitted as [`AppEvent::DeviceRejected`]; they
/// never fail the whole build.
pub fn build_service<I, DI, M, DM>(
    config: &SystemConfig,
    buses: &Buses<I, DI, M, DM>,
    events: &mut impl EventSink,
) -> Result<PollingService>
where
    I: BusTransport + Send + 'static,
    DI: DelayNs + Clone + Send + Sync + 'static,
    M: BusTransport + Send + 'static,
    DM: DelayNs + Clone + Send + Sync + 'static,
{
    let bus_ready = |bus: &str| match bus {
        I2C_COMPONENT => config.i2c.is_some() && buses.i2c.is_some(),
        MODBUS_COMPONENT => config.modbus.is_some() && buses.modbus.is_some(),
        _ => false,
    };
    let mut components = Vec::new();
    for c in components_for(config) {
        if c.depends_on.iter().all(|d| bus_ready(d)) {
            components.push(c);
        } else {
            reject_component(config, c.name, events);
        }
    }
    let order = resolve_startup_order(&components)?;
    info!("Startup order: {:?}", order);

    let mut service = PollingService::new();
    for component in order {
        match component {
            CURRENT_LOOP_COMPONENT => {
                let mut addresses: Vec<u8> = Vec::new();
                for entry in &config.current_loops {
                    let built = entry.get().and_then(|cfg| match &buses.i2c {
                        _ if addresses.len() >= MAX_CURRENT_LOOPS => {
                            Err(Error::Config("too many current-loop modules"))
                        }
                        _ if addresses.contains(&cfg.address) => {
                            Err(Error::Config("bus address already in use"))
                        }
                        Some(bus) => CurrentLoopSensor::new(cfg, bus.clone())
                            .map(|d| Box::new(d) as Box<dyn PollingDevice>),
                        None => Err(Error::Config("i2c bus not configured")),
                    });
                    if admit(&mut service, entry.name(), built, events) {
                        if let Ok(cfg) = entry.get() {
                            addresses.push(cfg.address);
                        }
                    }
                }
            }
            SAVE_VTR_COMPONENT => {
                if let Some(entry) = &config.climate {
                    let built = entry.get().and_then(|cfg| match &buses.modbus {
                        Some(bus) => SaveVtrClimate::new(cfg, bus.clone())
                            .map(|d| Box::new(d) as Box<dyn PollingDevice>),
                        None => Err(Error::Config("modbus bus not configured")),
                    });
                    admit(&mut service, entry.name(), built, events);
                }
            }
            _ => {}
        }
    }

    info!("{} device(s) registered", service.len());
    Ok(service)
}

fn reject_component(config: &SystemConfig, component: &str, events: &mut impl EventSink) {
    let reason = Error::Config("required bus not available");
    match component {
        CURRENT_LOOP_COMPONENT => {
            for entry in &config.current_loops {
                reject(entry.name(), reason, events);
            }
        }
        SAVE_VTR_COMPONENT => {
            if let Some(entry) = &config.climate {
                reject(entry.name(), reason, events);
            }
        }
        _ => {}
    }
}

/// Register `built`, or reject it.  Returns whether the device is now live.
fn admit(
    service: &mut PollingService,
    device: &str,
    built: Result<Box<dyn PollingDevice>>,
    events: &mut impl EventSink,
) -> bool {
    match built.and_then(|d| service.register(d, events)) {
        Ok(_) => true,
        Err(reason) => {
            reject(device, reason, events);
            false
        }
    }
}

fn reject(device: &str, reason: Error, events: &mut impl EventSink) {
    error!("{}: rejected: {}", device, reason);
    events.emit(&AppEvent::DeviceRejected {
        device: name(device),
        reason,
    });
}
