//! Alarm word decoding.
//!
//! The controller exposes two alarm bit-fields: a 16-bit word with five
//! boolean summary alarms and a 32-bit word (two registers, high word
//! first) with one bit per alarm condition.  Bit `i` maps to entry `i` of
//! the matching table below; bits past the end of a table are ignored.

/// Boolean summary alarms, in bit order.
pub const BOOLEAN_ALARMS: [&str; 5] = [
    "filter_alarm_was_detected",
    "output_alarm",
    "alarm_type_a",
    "alarm_type_b",
    "alarm_type_c",
];

/// Alarm conditions, in bit order.
pub const CATEGORICAL_ALARMS: [&str; 32] = [
    "alarm_saf_ctrl",
    "alarm_eaf_ctrl",
    "alarm_frost_prot",
    "alarm_defrosting",
    "alarm_saf_rpm",
    "alarm_eaf_rpm",
    "alarm_fpt",
    "alarm_oat",
    "alarm_sat",
    "alarm_rat",
    "alarm_eat",
    "alarm_ect",
    "alarm_eft",
    "alarm_oht",
    "alarm_emt",
    "alarm_rgs",
    "alarm_bys",
    "alarm_secondary_air",
    "alarm_filter",
    "alarm_extra_controller",
    "alarm_external_stop",
    "alarm_rh",
    "alarm_co2",
    "alarm_low_sat",
    "alarm_byf",
    "alarm_manual_override_outputs",
    "alarm_pdm_rhs",
    "alarm_pdm_eat",
    "alarm_manual_fan_stop",
    "alarm_overheat_temperature",
    "alarm_fire",
    "alarm_filter_warning",
];

/// Text published for a categorical alarm.
pub const ACTIVE_TEXT: &str = "Active";
pub const INACTIVE_TEXT: &str = "Inactive";

/// Which alarm table a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmKind {
    Boolean(usize),
    Categorical(usize),
}

/// Look a configured alarm name up in both tables.
pub fn lookup(name: &str) -> Option<AlarmKind> {
    if let Some(i) = BOOLEAN_ALARMS.iter().position(|n| *n == name) {
        return Some(AlarmKind::Boolean(i));
    }
    CATEGORICAL_ALARMS
        .iter()
        .position(|n| *n == name)
        .map(AlarmKind::Categorical)
}

/// Decoded state of both alarm words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlarmState {
    pub boolean: [bool; BOOLEAN_ALARMS.len()],
    pub categorical: [bool; CATEGORICAL_ALARMS.len()],
}

impl AlarmState {
    pub fn get(&self, kind: AlarmKind) -> bool {
        match kind {
            AlarmKind::Boolean(i) => self.boolean[i],
            AlarmKind::Categorical(i) => self.categorical[i],
        }
    }

    /// Names of every active alarm, boolean table first.
    pub fn active(&self) -> impl Iterator<Item = &'static str> + '_ {
        let boolean = BOOLEAN_ALARMS
            .iter()
            .zip(self.boolean)
            .filter_map(|(name, on)| on.then_some(*name));
        let categorical = CATEGORICAL_ALARMS
            .iter()
            .zip(self.categorical)
            .filter_map(|(name, on)| on.then_some(*name));
        boolean.chain(categorical)
    }

    pub fn any_active(&self) -> bool {
        self.boolean.iter().chain(self.categorical.iter()).any(|b| *b)
    }
}

/// Decode both words.  Total and order-preserving.
pub fn decode(boolean_word: u16, categorical_word: u32) -> AlarmState {
    let mut state = AlarmState::default();
    for (i, slot) in state.boolean.iter_mut().enumerate() {
        *slot = boolean_word & (1 << i) != 0;
    }
    for (i, slot) in state.categorical.iter_mut().enumerate() {
        *slot = categorical_word & (1 << i) != 0;
    }
    state
}

pub fn categorical_text(active: bool) -> &'static str {
    if active { ACTIVE_TEXT } else { INACTIVE_TEXT }
}
