use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::gpio::AuxPin;

pub const DEFAULT_HOST: &str = "0.0.0.0:5002";
pub const DEFAULT_PATH: &str = "/api";
pub const DEFAULT_GPIO_CHIP: &str = "/dev/gpiochip0";

pub const PORCH_LIGHT_LINE: u32 = 17;
pub const SPARE1_LINE: u32 = 27;
pub const SPARE2_LINE: u32 = 22;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub path: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            path: DEFAULT_PATH.to_string(),
        }
    }
}

/// Lines driven directly by this service, outside the HAT's own set.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GpioConfig {
    pub chip: String,
    pub porch_light: u32,
    pub spare1: u32,
    pub spare2: u32,
}

impl GpioConfig {
    pub fn line(&self, pin: AuxPin) -> u32 {
        match pin {
            AuxPin::PorchLight => self.porch_light,
            AuxPin::Spare1 => self.spare1,
            AuxPin::Spare2 => self.spare2,
        }
    }
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            chip: DEFAULT_GPIO_CHIP.to_string(),
            porch_light: PORCH_LIGHT_LINE,
            spare1: SPARE1_LINE,
            spare2: SPARE2_LINE,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HatConfig {
    pub i2c_bus: u8,
}

impl Default for HatConfig {
    fn default() -> Self {
        Self { i2c_bus: 1 }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct IndicatorConfig {
    pub comms_off_ms: u64,
    pub warn_off_ms: u64,
}

impl IndicatorConfig {
    pub fn comms_off(&self) -> Duration {
        Duration::from_millis(self.comms_off_ms)
    }

    pub fn warn_off(&self) -> Duration {
        Duration::from_millis(self.warn_off_ms)
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            comms_off_ms: 500,
            warn_off_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub gpio: GpioConfig,
    pub hat: HatConfig,
    pub indicators: IndicatorConfig,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))
    }
}
