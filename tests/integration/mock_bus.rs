//! Mock buses and sinks for integration tests.
//!
//! - [`ModuleBus`]: an `embedded-hal` I²C bus populated with current-loop
//!   modules, driven through the real `I2cBus` transport.
//! - [`UnitBus`]: a word-addressed SAVE VTR register file implementing
//!   `BusTransport` directly.
//! - [`Tracer`]: shared by both, flags any two transactions that overlap.
//!
//! State lives behind `Arc<Mutex<..>>` so a test can inspect it after the
//! bus has been moved into a `SharedBus`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use ventilink::adapters::time::ThreadDelay;
use ventilink::app::events::AppEvent;
use ventilink::app::ports::{EventSink, PublishSink};
use ventilink::bus::i2c::I2cBus;
use ventilink::bus::{BusHandle, BusTransport, Register, RetryPolicy, SharedBus};
use ventilink::error::{ExceptionCode, TransportError};
use ventilink::outputs::{OutputChannel, OutputValue};

// ── Overlap tracer ────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct Tracer {
    in_flight: Arc<AtomicBool>,
    overlaps: Arc<AtomicU32>,
    transactions: Arc<AtomicU32>,
}

#[allow(dead_code)]
impl Tracer {
    fn enter(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.transactions.fetch_add(1, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }

    pub fn overlaps(&self) -> u32 {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn transactions(&self) -> u32 {
        self.transactions.load(Ordering::SeqCst)
    }
}

// ── I²C current-loop modules ──────────────────────────────────

#[derive(Default)]
struct ModuleState {
    /// address → register → bytes
    modules: HashMap<u8, HashMap<u8, Vec<u8>>>,
    writes: Vec<(u8, u8, Vec<u8>)>,
    fail: VecDeque<ErrorKind>,
}

#[derive(Clone, Default)]
pub struct ModuleBus {
    state: Arc<Mutex<ModuleState>>,
    tracer: Tracer,
    hold: Duration,
}

#[allow(dead_code)]
impl ModuleBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep each transaction open for `hold` so overlaps become visible.
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Attach a module at `address` reporting the 12-bit sample `raw`.
    pub fn add_module(&self, address: u8, raw: u16) {
        let mut state = self.state.lock().unwrap();
        let regs = state.modules.entry(address).or_default();
        regs.insert(0x00, raw.to_le_bytes().to_vec());
        regs.insert(0xFE, vec![3]);
    }

    pub fn set_raw(&self, address: u8, raw: u16) {
        self.add_module(address, raw);
    }

    pub fn fail_next(&self, kind: ErrorKind) {
        self.state.lock().unwrap().fail.push_back(kind);
    }

    /// `(address, register, data)` for every write seen.
    pub fn writes(&self) -> Vec<(u8, u8, Vec<u8>)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn tracer(&self) -> Tracer {
        self.tracer.clone()
    }

    pub fn handle(&self, policy: RetryPolicy) -> BusHandle<I2cBus<ModuleBus>, ThreadDelay> {
        SharedBus::new("i2c", I2cBus::new(self.clone()), ThreadDelay, policy).into_handle()
    }

    fn apply(&self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        let mut state = self.state.lock().unwrap();
        if let Some(kind) = state.fail.pop_front() {
            return Err(kind);
        }
        let mut pointer = 0u8;
        let mut written: Option<(u8, Vec<u8>)> = None;
        {
            let Some(regs) = state.modules.get_mut(&address) else {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            };
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => {
                        pointer = bytes[0];
                        if bytes.len() > 1 {
                            regs.insert(pointer, bytes[1..].to_vec());
                            written = Some((pointer, bytes[1..].to_vec()));
                        }
                    }
                    Operation::Read(buf) => {
                        let stored = regs.get(&pointer).cloned().unwrap_or_default();
                        for (i, b) in buf.iter_mut().enumerate() {
                            *b = stored.get(i).copied().unwrap_or(0);
                        }
                    }
                }
            }
        }
        if let Some((reg, data)) = written {
            state.writes.push((address, reg, data));
        }
        Ok(())
    }
}

impl ErrorType for ModuleBus {
    type Error = ErrorKind;
}

impl I2c for ModuleBus {
    fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        self.tracer.enter();
        if !self.hold.is_zero() {
            thread::sleep(self.hold);
        }
        let result = self.apply(address, operations);
        self.tracer.exit();
        result
    }
}

// ── SAVE VTR register file ────────────────────────────────────

#[derive(Default)]
struct UnitState {
    words: HashMap<Register, u16>,
    writes: Vec<(Register, u16)>,
    failing: HashMap<Register, TransportError>,
}

#[derive(Clone, Default)]
pub struct UnitBus {
    state: Arc<Mutex<UnitState>>,
    tracer: Tracer,
    hold: Duration,
}

#[allow(dead_code)]
impl UnitBus {
    /// A unit with plausible values in every default register: 21.5 °C
    /// room, 22.0 °C setpoint, fan mode MANUAL, fans at 40 / 35 %.
    pub fn save_vtr() -> Self {
        let bus = Self::default();
        for (reg, word) in [
            (Register::holding(2001), 215),
            (Register::holding(2000), 220),
            (Register::input(1160), 1),
            (Register::input(2148), 12),
            (Register::holding(12101), (-35i16) as u16),
            (Register::holding(12102), 180),
            (Register::holding(12543), 205),
            (Register::input(14000), 40),
            (Register::input(14001), 35),
            (Register::input(15900), 0),
            (Register::input(15901), 0),
            (Register::input(15902), 0),
        ] {
            bus.set(reg, word);
        }
        bus
    }

    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn set(&self, register: Register, word: u16) {
        self.state.lock().unwrap().words.insert(register, word);
    }

    pub fn get(&self, register: Register) -> Option<u16> {
        self.state.lock().unwrap().words.get(&register).copied()
    }

    /// Every read touching `register` fails with `error` until [`heal`](Self::heal).
    pub fn fail_at(&self, register: Register, error: TransportError) {
        self.state.lock().unwrap().failing.insert(register, error);
    }

    pub fn heal(&self, register: Register) {
        self.state.lock().unwrap().failing.remove(&register);
    }

    pub fn writes(&self) -> Vec<(Register, u16)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn tracer(&self) -> Tracer {
        self.tracer.clone()
    }

    pub fn handle(&self, policy: RetryPolicy) -> BusHandle<UnitBus, ThreadDelay> {
        SharedBus::new("modbus", self.clone(), ThreadDelay, policy).into_handle()
    }

    fn offset(register: Register, i: usize) -> Register {
        Register {
            space: register.space,
            offset: register.offset + i as u16,
        }
    }

    fn traced<T>(&self, op: impl FnOnce(&mut UnitState) -> T) -> T {
        self.tracer.enter();
        if !self.hold.is_zero() {
            thread::sleep(self.hold);
        }
        let result = op(&mut self.state.lock().unwrap());
        self.tracer.exit();
        result
    }
}

impl BusTransport for UnitBus {
    fn read(&mut self, _unit: u8, register: Register, buf: &mut [u8]) -> Result<(), TransportError> {
        self.traced(|state| {
            for (i, chunk) in buf.chunks_exact_mut(2).enumerate() {
                let reg = Self::offset(register, i);
                if let Some(e) = state.failing.get(&reg) {
                    return Err(*e);
                }
                let word = state
                    .words
                    .get(&reg)
                    .ok_or(TransportError::Exception(ExceptionCode::IllegalDataAddress))?;
                chunk.copy_from_slice(&word.to_be_bytes());
            }
            Ok(())
        })
    }

    fn write(&mut self, _unit: u8, register: Register, data: &[u8]) -> Result<(), TransportError> {
        self.traced(|state| {
            for (i, chunk) in data.chunks_exact(2).enumerate() {
                let reg = Self::offset(register, i);
                let word = u16::from_be_bytes([chunk[0], chunk[1]]);
                state.words.insert(reg, word);
                state.writes.push((reg, word));
            }
            Ok(())
        })
    }

    fn max_transfer(&self) -> usize {
        250
    }
}

// ── Sinks ─────────────────────────────────────────────────────

/// Records every published value as `(device, channel, value)`.
#[derive(Default)]
pub struct Collector {
    pub values: Vec<(String, String, OutputValue)>,
}

#[allow(dead_code)]
impl Collector {
    pub fn last(&self, channel: &str) -> Option<&OutputValue> {
        self.values
            .iter()
            .rev()
            .find(|(_, c, _)| c == channel)
            .map(|(_, _, v)| v)
    }

    pub fn count(&self, channel: &str) -> usize {
        self.values.iter().filter(|(_, c, _)| c == channel).count()
    }

    pub fn from_device(&self, device: &str) -> usize {
        self.values.iter().filter(|(d, _, _)| d == device).count()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl PublishSink for Collector {
    fn publish(&mut self, device: &str, channel: &OutputChannel) {
        if let Some(value) = channel.value() {
            self.values
                .push((device.to_string(), channel.name.to_string(), value.clone()));
        }
    }
}

#[derive(Default)]
pub struct EventLog {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl EventLog {
    pub fn rejected(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::DeviceRejected { device, .. } => Some(device.to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn poll_failures(&self, device: &str) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::PollFailed { device: d, .. } if d == device))
            .count()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
