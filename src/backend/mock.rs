use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::AppError;
use crate::gpio::{Direction, GpioBackend};
use crate::hat::{
    Bank, Channel, ChannelIndex, HatDriver, Light, ensure_analog, ensure_digital, ensure_writable,
};

#[derive(Default)]
pub struct MockGpioBackend {
    lines: RwLock<FxHashMap<u32, MockLineState>>, // keyed by line offset
}

#[derive(Debug, Clone, Copy)]
struct MockLineState {
    direction: Direction,
    value: u8,
}

impl MockGpioBackend {
    pub fn direction(&self, line: u32) -> Option<Direction> {
        self.lines.read().get(&line).map(|l| l.direction)
    }
}

impl GpioBackend for MockGpioBackend {
    fn configure(&self, line: u32, direction: Direction, initial: u8) -> Result<(), AppError> {
        let value = if direction.is_writable() { initial } else { 0 };
        self.lines
            .write()
            .insert(line, MockLineState { direction, value });
        Ok(())
    }

    fn read_value(&self, line: u32) -> Result<u8, AppError> {
        self.lines
            .read()
            .get(&line)
            .map(|l| l.value)
            .ok_or_else(|| AppError::InvalidState(format!("line {line} not configured")))
    }

    fn write_value(&self, line: u32, value: u8) -> Result<(), AppError> {
        let mut lines = self.lines.write();
        let state = lines
            .get_mut(&line)
            .ok_or_else(|| AppError::InvalidState(format!("line {line} not configured")))?;

        if !state.direction.is_writable() {
            return Err(AppError::InvalidState(format!(
                "line {line} must be an output to set value"
            )));
        }
        state.value = u8::from(value != 0);
        Ok(())
    }
}

/// In-memory Automation HAT. Inputs and analog readings can be driven by
/// tests through [`MockHat::set_input`] and [`MockHat::set_analog`].
pub struct MockHat {
    present: bool,
    levels: RwLock<FxHashMap<Channel, u8>>,
    analog: RwLock<[f64; 3]>,
    lights: RwLock<FxHashMap<Light, u8>>,
    light_writes: AtomicUsize,
    fail_lights: AtomicBool,
}

impl Default for MockHat {
    fn default() -> Self {
        Self::new(true)
    }
}

impl MockHat {
    pub fn new(present: bool) -> Self {
        Self {
            present,
            levels: RwLock::new(FxHashMap::default()),
            analog: RwLock::new([0.0; 3]),
            lights: RwLock::new(FxHashMap::default()),
            light_writes: AtomicUsize::new(0),
            fail_lights: AtomicBool::new(false),
        }
    }

    pub fn light(&self, light: Light) -> u8 {
        self.lights.read().get(&light).copied().unwrap_or(0)
    }

    pub fn light_writes(&self) -> usize {
        self.light_writes.load(Ordering::Relaxed)
    }

    /// Makes every subsequent light write fail as a bus error would.
    pub fn set_fail_lights(&self, fail: bool) {
        self.fail_lights.store(fail, Ordering::Relaxed);
    }

    pub fn set_input(&self, index: ChannelIndex, value: u8) {
        self.levels
            .write()
            .insert(Channel::new(Bank::Input, index), u8::from(value != 0));
    }

    pub fn set_analog(&self, index: ChannelIndex, volts: f64) {
        self.analog.write()[index.position()] = volts;
    }

    fn ensure_present(&self) -> Result<(), AppError> {
        if self.present {
            Ok(())
        } else {
            Err(AppError::HatNotFound)
        }
    }
}

impl HatDriver for MockHat {
    fn is_present(&self) -> bool {
        self.present
    }

    fn read_level(&self, channel: Channel) -> Result<u8, AppError> {
        self.ensure_present()?;
        ensure_digital(channel)?;
        Ok(self.levels.read().get(&channel).copied().unwrap_or(0))
    }

    fn read_analog(&self, channel: Channel) -> Result<f64, AppError> {
        self.ensure_present()?;
        ensure_analog(channel)?;
        Ok(self.analog.read()[channel.index.position()])
    }

    fn write_level(&self, channel: Channel, value: u8) -> Result<(), AppError> {
        self.ensure_present()?;
        ensure_writable(channel)?;
        self.levels.write().insert(channel, u8::from(value != 0));
        Ok(())
    }

    fn set_light(&self, light: Light, value: u8) -> Result<(), AppError> {
        self.light_writes.fetch_add(1, Ordering::Relaxed);
        self.ensure_present()?;
        if self.fail_lights.load(Ordering::Relaxed) {
            return Err(AppError::I2c(format!("{light:?} light write rejected")));
        }
        self.lights.write().insert(light, u8::from(value != 0));
        Ok(())
    }
}
