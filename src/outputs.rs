//! Named output channels.
//!
//! Each device owns a [`ChannelTable`].  Channels are bound by name once at
//! configuration load and addressed by [`ChannelHandle`] afterwards, so a
//! poll cycle never does string lookups.  Only the owning device writes a
//! channel; anyone holding a shared reference may read it.

use core::fmt::Write as _;

use crate::config::ChannelConfig;
use crate::error::{Error, Result};

/// Enough for the climate driver: 11 sensors + 5 binary + 32 text alarms.
pub const MAX_CHANNELS: usize = 64;

pub type ChannelName = heapless::String<32>;
pub type TextValue = heapless::String<24>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCategory {
    Numeric,
    Binary,
    Text,
}

/// Presentation metadata carried alongside the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMeta {
    pub category: ChannelCategory,
    pub unit: heapless::String<8>,
    pub icon: heapless::String<32>,
    pub accuracy_decimals: u8,
}

impl ChannelMeta {
    pub fn numeric(unit: &str, icon: &str, accuracy_decimals: u8) -> Self {
        Self {
            category: ChannelCategory::Numeric,
            unit: truncated(unit),
            icon: truncated(icon),
            accuracy_decimals,
        }
    }

    pub fn binary(icon: &str) -> Self {
        Self {
            category: ChannelCategory::Binary,
            unit: heapless::String::new(),
            icon: truncated(icon),
            accuracy_decimals: 0,
        }
    }

    pub fn text(icon: &str) -> Self {
        Self {
            category: ChannelCategory::Text,
            unit: heapless::String::new(),
            icon: truncated(icon),
            accuracy_decimals: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Numeric(f32),
    Binary(bool),
    Text(TextValue),
}

impl OutputValue {
    pub fn text(s: &str) -> Self {
        Self::Text(truncated(s))
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Binary(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// One named output slot.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputChannel {
    pub name: ChannelName,
    pub meta: ChannelMeta,
    /// `None` until the first successful publish.
    value: Option<OutputValue>,
    publish_count: u32,
}

impl OutputChannel {
    pub fn value(&self) -> Option<&OutputValue> {
        self.value.as_ref()
    }

    pub fn publish_count(&self) -> u32 {
        self.publish_count
    }

    /// Render the value with the channel's precision and unit, e.g. `"12.3 mA"`.
    pub fn formatted(&self) -> heapless::String<48> {
        let mut out = heapless::String::new();
        let _ = match &self.value {
            None => write!(out, "n/a"),
            Some(OutputValue::Numeric(v)) => {
                let precision = self.meta.accuracy_decimals as usize;
                if self.meta.unit.is_empty() {
                    write!(out, "{:.*}", precision, v)
                } else {
                    write!(out, "{:.*} {}", precision, v, self.meta.unit)
                }
            }
            Some(OutputValue::Binary(b)) => write!(out, "{}", if *b { "ON" } else { "OFF" }),
            Some(OutputValue::Text(s)) => write!(out, "{}", s),
        };
        out
    }
}

/// Index of a bound channel in its device's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelHandle(usize);

#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: heapless::Vec<OutputChannel, MAX_CHANNELS>,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a new channel.  Names are unique per device.
    pub fn bind(&mut self, name: &str, meta: ChannelMeta) -> Result<ChannelHandle> {
        if self.find(name).is_some() {
            return Err(Error::Config("duplicate output channel name"));
        }
        let mut stored = ChannelName::new();
        stored
            .push_str(name)
            .map_err(|_| Error::Config("output channel name too long"))?;
        self.channels
            .push(OutputChannel {
                name: stored,
                meta,
                value: None,
                publish_count: 0,
            })
            .map_err(|_| Error::Config("too many output channels"))?;
        Ok(ChannelHandle(self.channels.len() - 1))
    }

    /// Bind a configured channel, applying its presentation overrides on
    /// top of `default`.
    pub fn bind_config(&mut self, config: &ChannelConfig, default: ChannelMeta) -> Result<ChannelHandle> {
        let mut meta = default;
        if let Some(unit) = &config.unit {
            meta.unit = unit.clone();
        }
        if let Some(icon) = &config.icon {
            meta.icon = icon.clone();
        }
        if let Some(decimals) = config.accuracy_decimals {
            meta.accuracy_decimals = decimals;
        }
        self.bind(&config.name, meta)
    }

    pub fn get(&self, handle: ChannelHandle) -> &OutputChannel {
        &self.channels[handle.0]
    }

    pub fn find(&self, name: &str) -> Option<&OutputChannel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputChannel> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Store a freshly published value and hand the channel back for
    /// forwarding to the publish sink.
    pub(crate) fn set(&mut self, handle: ChannelHandle, value: OutputValue) -> &OutputChannel {
        let channel = &mut self.channels[handle.0];
        channel.value = Some(value);
        channel.publish_count = channel.publish_count.wrapping_add(1);
        channel
    }
}

/// Copy as much of `s` as fits, cutting on a char boundary.
fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}
