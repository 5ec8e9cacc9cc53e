use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::FairMutex;
use serde::Serialize;

use crate::config::{AppConfig, GpioConfig};
use crate::error::AppError;
use crate::gpio::{AuxPin, Direction, GpioBackend};
use crate::hat::{Bank, Channel, ChannelIndex, HatDriver, Readings};
use crate::indicator::{Indicators, Scheduler};
use crate::payload::{AuxPinsPayload, BankPayload, Geofence, PinState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PorchLight {
    pub porch_light: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxReadings {
    pub porch_light: u8,
    pub spare1: u8,
    pub spare2: u8,
}

/// Hardware handles plus the per-request protocol around them: light the
/// indicators, touch the pins under the hardware lock, read back, then
/// schedule the indicators off.
pub struct Board<H: HatDriver, G: GpioBackend> {
    hat: Arc<H>,
    gpio: Arc<G>,
    lines: GpioConfig,
    present: bool,
    indicators: Indicators<H>,
    comms_off: Duration,
    warn_off: Duration,
    hardware: FairMutex<()>,
}

impl<H: HatDriver + 'static, G: GpioBackend> Board<H, G> {
    /// Resolves HAT presence once, lights the power indicator when present
    /// and claims the auxiliary lines as low outputs.
    pub fn new(
        config: &AppConfig,
        hat: Arc<H>,
        gpio: Arc<G>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, AppError> {
        let present = hat.is_present();
        let indicators = Indicators::new(Arc::clone(&hat), present, scheduler);

        if present {
            indicators.power_on();
        } else {
            warn!("Automation HAT not found, only auxiliary pins are available");
        }

        for pin in AuxPin::ALL {
            gpio.configure(config.gpio.line(pin), Direction::Output, 0)?;
        }
        info!(
            "auxiliary lines ready: porch light {}, spare1 {}, spare2 {}",
            config.gpio.porch_light, config.gpio.spare1, config.gpio.spare2
        );

        Ok(Self {
            hat,
            gpio,
            lines: config.gpio.clone(),
            present,
            indicators,
            comms_off: config.indicators.comms_off(),
            warn_off: config.indicators.warn_off(),
            hardware: FairMutex::new(()),
        })
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn location(&self, event: Geofence) -> Result<PorchLight, AppError> {
        debug!("location event: {event:?}");
        self.write_pulse(|| {
            let line = self.lines.line(AuxPin::PorchLight);
            match event {
                Geofence::Entered => self.gpio.write_value(line, 1)?,
                Geofence::Exited => self.gpio.write_value(line, 0)?,
                Geofence::Other => {}
            }
            Ok(PorchLight {
                porch_light: self.gpio.read_value(line)?,
            })
        })
    }

    pub fn aux_pins(&self) -> Result<AuxReadings, AppError> {
        self.read_pulse(|| self.read_aux())
    }

    pub fn set_aux_pins(&self, payload: &AuxPinsPayload) -> Result<AuxReadings, AppError> {
        debug!("aux pins request: {payload:?}");
        self.write_pulse(|| {
            self.write_aux(AuxPin::PorchLight, payload.porch_light)?;
            self.write_aux(AuxPin::Spare1, payload.spare1)?;
            self.write_aux(AuxPin::Spare2, payload.spare2)?;
            self.read_aux()
        })
    }

    pub fn analog(&self) -> Result<Readings<f64>, AppError> {
        self.ensure_present()?;
        self.read_pulse(|| {
            Readings::try_collect(|index| {
                self.hat.read_analog(Channel::new(Bank::Analog, index))
            })
        })
    }

    /// Levels of a digital bank (inputs, outputs or relays).
    pub fn bank(&self, bank: Bank) -> Result<Readings<u8>, AppError> {
        self.ensure_present()?;
        self.read_pulse(|| self.read_bank(bank))
    }

    /// Applies the requested levels to a writable bank and reads it back.
    pub fn set_bank(&self, bank: Bank, payload: &BankPayload) -> Result<Readings<u8>, AppError> {
        self.ensure_present()?;
        debug!("{} request: {payload:?}", bank.name());
        self.write_pulse(|| {
            let requested = [payload.one, payload.two, payload.three];
            for (index, state) in ChannelIndex::ALL.into_iter().zip(requested) {
                if let Some(level) = state.level() {
                    let channel = Channel::new(bank, index);
                    self.hat.write_level(channel, level)?;
                    debug!("{channel} <- {level}");
                }
            }
            self.read_bank(bank)
        })
    }

    fn ensure_present(&self) -> Result<(), AppError> {
        if self.present {
            Ok(())
        } else {
            Err(AppError::HatNotFound)
        }
    }

    fn read_pulse<T>(&self, op: impl FnOnce() -> Result<T, AppError>) -> Result<T, AppError> {
        self.indicators.signal_read();
        let result = {
            let _hw = self.hardware.lock();
            op()
        };
        self.indicators.schedule_off(self.comms_off, None);
        result
    }

    fn write_pulse<T>(&self, op: impl FnOnce() -> Result<T, AppError>) -> Result<T, AppError> {
        self.indicators.signal_write();
        let result = {
            let _hw = self.hardware.lock();
            op()
        };
        self.indicators
            .schedule_off(self.comms_off, Some(self.warn_off));
        result
    }

    fn write_aux(&self, pin: AuxPin, state: PinState) -> Result<(), AppError> {
        if let Some(level) = state.level() {
            let line = self.lines.line(pin);
            self.gpio.write_value(line, level)?;
            debug!("{pin:?} (line {line}) <- {level}");
        }
        Ok(())
    }

    fn read_aux(&self) -> Result<AuxReadings, AppError> {
        Ok(AuxReadings {
            porch_light: self.gpio.read_value(self.lines.line(AuxPin::PorchLight))?,
            spare1: self.gpio.read_value(self.lines.line(AuxPin::Spare1))?,
            spare2: self.gpio.read_value(self.lines.line(AuxPin::Spare2))?,
        })
    }

    fn read_bank(&self, bank: Bank) -> Result<Readings<u8>, AppError> {
        Readings::try_collect(|index| self.hat.read_level(Channel::new(bank, index)))
    }
}
