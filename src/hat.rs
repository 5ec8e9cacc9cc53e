use serde::Serialize;

use crate::error::AppError;

/// Channel groups exposed by the Automation HAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    Output,
    Relay,
    Input,
    Analog,
}

impl Bank {
    pub fn is_writable(&self) -> bool {
        matches!(self, Bank::Output | Bank::Relay)
    }

    pub fn is_analog(&self) -> bool {
        matches!(self, Bank::Analog)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Bank::Output => "output",
            Bank::Relay => "relay",
            Bank::Input => "input",
            Bank::Analog => "analog",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelIndex {
    One,
    Two,
    Three,
}

impl ChannelIndex {
    pub const ALL: [ChannelIndex; 3] = [ChannelIndex::One, ChannelIndex::Two, ChannelIndex::Three];

    pub fn position(&self) -> usize {
        match self {
            ChannelIndex::One => 0,
            ChannelIndex::Two => 1,
            ChannelIndex::Three => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    pub bank: Bank,
    pub index: ChannelIndex,
}

impl Channel {
    pub const fn new(bank: Bank, index: ChannelIndex) -> Self {
        Self { bank, index }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = match self.index {
            ChannelIndex::One => "one",
            ChannelIndex::Two => "two",
            ChannelIndex::Three => "three",
        };
        write!(f, "{}.{}", self.bank.name(), index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Light {
    Power,
    Comms,
    Warn,
}

/// `{one, two, three}` readings of a bank, in channel order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Readings<T> {
    pub one: T,
    pub two: T,
    pub three: T,
}

impl<T> Readings<T> {
    pub fn try_collect<F>(mut read: F) -> Result<Self, AppError>
    where
        F: FnMut(ChannelIndex) -> Result<T, AppError>,
    {
        Ok(Self {
            one: read(ChannelIndex::One)?,
            two: read(ChannelIndex::Two)?,
            three: read(ChannelIndex::Three)?,
        })
    }
}

/// Named channels of the HAT. Implementations serialize their own bus access.
pub trait HatDriver: Send + Sync {
    fn is_present(&self) -> bool;
    fn read_level(&self, channel: Channel) -> Result<u8, AppError>;
    fn read_analog(&self, channel: Channel) -> Result<f64, AppError>;
    fn write_level(&self, channel: Channel, value: u8) -> Result<(), AppError>;
    fn set_light(&self, light: Light, value: u8) -> Result<(), AppError>;
}

pub(crate) fn ensure_digital(channel: Channel) -> Result<(), AppError> {
    if channel.bank.is_analog() {
        return Err(AppError::InvalidState(format!(
            "{channel} is analog and has no digital level"
        )));
    }
    Ok(())
}

pub(crate) fn ensure_writable(channel: Channel) -> Result<(), AppError> {
    if !channel.bank.is_writable() {
        return Err(AppError::InvalidState(format!("{channel} is read-only")));
    }
    Ok(())
}

pub(crate) fn ensure_analog(channel: Channel) -> Result<(), AppError> {
    if !channel.bank.is_analog() {
        return Err(AppError::InvalidState(format!("{channel} is not analog")));
    }
    Ok(())
}
