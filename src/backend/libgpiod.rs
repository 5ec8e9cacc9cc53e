use std::path::PathBuf;

use libgpiod::{chip::Chip, line, request};
use log::debug;
use parking_lot::{FairMutex, RwLock, RwLockUpgradableReadGuard};
use rustc_hash::FxHashMap;

use crate::error::AppError;
use crate::gpio::{Direction, GpioBackend};

/// Lines of one GPIO character device, each requested on first configure.
pub struct LibgpiodBackend {
    chip: String,
    lines: RwLock<FxHashMap<u32, LineHandle>>, // keyed by line offset
}

struct LineHandle {
    direction: Direction,
    request: FairMutex<request::Request>,
}

impl LibgpiodBackend {
    pub fn new(chip: impl Into<String>) -> Result<Self, AppError> {
        let chip = chip.into();
        // fail early if the device node is missing
        Self::open_chip(&chip)?;
        Ok(Self {
            chip,
            lines: RwLock::new(FxHashMap::default()),
        })
    }

    fn open_chip(path: &str) -> Result<Chip, AppError> {
        let p = PathBuf::from(path);
        Chip::open(&p).map_err(|e| AppError::Gpio(format!("open chip {path}: {e}")))
    }

    fn request_lines(chip: &Chip, line_cfg: &line::Config) -> Result<request::Request, AppError> {
        let mut req_cfg =
            request::Config::new().map_err(|e| AppError::Gpio(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| AppError::Gpio(format!("request consumer: {e}")))?;
        chip.request_lines(Some(&req_cfg), line_cfg)
            .map_err(|e| AppError::Gpio(format!("request lines: {e}")))
    }

    fn make_line_settings(direction: Direction, initial: u8) -> Result<line::Settings, AppError> {
        let mut ls =
            line::Settings::new().map_err(|e| AppError::Gpio(format!("libgpiod settings: {e}")))?;

        match direction {
            Direction::Output => {
                ls.set_direction(line::Direction::Output)
                    .map_err(|e| AppError::Gpio(format!("set direction: {e}")))?;
                ls.set_drive(line::Drive::PushPull)
                    .map_err(|e| AppError::Gpio(format!("set drive: {e}")))?;
                ls.set_output_value(to_line_value(initial))
                    .map_err(|e| AppError::Gpio(format!("set output value: {e}")))?;
            }
            Direction::Input => {
                ls.set_direction(line::Direction::Input)
                    .map_err(|e| AppError::Gpio(format!("set direction: {e}")))?;
                ls.set_bias(None)
                    .map_err(|e| AppError::Gpio(format!("set bias: {e}")))?;
            }
        }

        Ok(ls)
    }

    fn make_line_config(offset: u32, settings: line::Settings) -> Result<line::Config, AppError> {
        let mut cfg =
            line::Config::new().map_err(|e| AppError::Gpio(format!("line config: {e}")))?;
        cfg.add_line_settings(&[offset], settings)
            .map_err(|e| AppError::Gpio(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }
}

fn to_line_value(value: u8) -> line::Value {
    match value {
        0 => line::Value::InActive,
        _ => line::Value::Active,
    }
}

impl GpioBackend for LibgpiodBackend {
    fn configure(&self, offset: u32, direction: Direction, initial: u8) -> Result<(), AppError> {
        let line_settings = Self::make_line_settings(direction, initial)?;
        let line_cfg = Self::make_line_config(offset, line_settings)?;

        let lines = self.lines.upgradable_read();
        match lines.get(&offset) {
            Some(_) => {
                let mut lines = RwLockUpgradableReadGuard::upgrade(lines);
                if let Some(handle) = lines.get_mut(&offset) {
                    handle
                        .request
                        .lock()
                        .reconfigure_lines(&line_cfg)
                        .map_err(|e| AppError::Gpio(format!("reconfigure lines: {e}")))?;
                    handle.direction = direction;
                }
            }
            None => {
                let chip = Self::open_chip(&self.chip)?;
                let request = Self::request_lines(&chip, &line_cfg)?;
                let mut lines = RwLockUpgradableReadGuard::upgrade(lines);
                lines.insert(
                    offset,
                    LineHandle {
                        direction,
                        request: FairMutex::new(request),
                    },
                );
            }
        }

        debug!("configured line {offset} as {direction:?} (initial {initial})");
        Ok(())
    }

    fn read_value(&self, offset: u32) -> Result<u8, AppError> {
        let lines = self.lines.read();
        let handle = lines
            .get(&offset)
            .ok_or_else(|| AppError::InvalidState(format!("line {offset} not configured")))?;

        let value = handle
            .request
            .lock()
            .value(offset)
            .map_err(|e| AppError::Gpio(format!("get value: {e}")))?;
        Ok(match value {
            line::Value::InActive => 0,
            line::Value::Active => 1,
        })
    }

    fn write_value(&self, offset: u32, value: u8) -> Result<(), AppError> {
        let lines = self.lines.read();
        let handle = lines
            .get(&offset)
            .ok_or_else(|| AppError::InvalidState(format!("line {offset} not configured")))?;

        if !handle.direction.is_writable() {
            return Err(AppError::InvalidState(format!(
                "line {offset} must be an output to set value"
            )));
        }

        handle
            .request
            .lock()
            .set_value(offset, to_line_value(value))
            .map_err(|e| AppError::Gpio(format!("set value: {e}")))?;
        Ok(())
    }
}
