pub mod backend;
mod board;
mod config;
mod error;
mod gpio;
mod hat;
mod indicator;
mod payload;
mod routes;

pub use board::{AuxReadings, Board, PorchLight};
pub use config::{AppConfig, GpioConfig, HatConfig, HttpConfig, IndicatorConfig};
pub use error::AppError;
pub use gpio::{AuxPin, Direction, GpioBackend};
pub use hat::{Bank, Channel, ChannelIndex, HatDriver, Light, Readings};
pub use indicator::{Indicators, RuntimeScheduler, Scheduler, Task};
pub use payload::{
    AuxPinsPayload, BankPayload, Geofence, LocationPayload, PinState, parse_payload,
};
pub use routes::AppState;

#[cfg(feature = "hardware-gpio")]
pub use backend::{AutomationHat, LibgpiodBackend};
pub use backend::{MockGpioBackend, MockHat};
