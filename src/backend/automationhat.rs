use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::info;
use parking_lot::Mutex;
use rppal::i2c::I2c;

use crate::config::HatConfig;
use crate::error::AppError;
use crate::gpio::{Direction, GpioBackend};
use crate::hat::{
    Bank, Channel, ChannelIndex, HatDriver, Light, ensure_analog, ensure_digital, ensure_writable,
};

const ADS1015_ADDRESS: u16 = 0x48;
const ADS1015_REG_CONVERSION: u8 = 0x00;
const ADS1015_REG_CONFIG: u8 = 0x01;
const ADS1015_OS_SINGLE: u16 = 0x8000;
const ADS1015_MUX_SINGLE_0: u16 = 0x4000;
const ADS1015_PGA_4096: u16 = 0x0200;
const ADS1015_MODE_SINGLE: u16 = 0x0100;
const ADS1015_DR_1600: u16 = 0x0080;
const ADS1015_COMP_DISABLE: u16 = 0x0003;
const ADS1015_GAIN_VOLTS: f64 = 4.096;
const ADS1015_CONVERSION_WAIT: Duration = Duration::from_micros(800);

// Inputs one to three are divided down from 25.85V to the ADC's 3.3V range.
const ANALOG_MAX_VOLTS: f64 = 25.85;
const ANALOG_ADC_VOLTS: f64 = 3.3;

const SN3218_ADDRESS: u16 = 0x54;
const SN3218_REG_SHUTDOWN: u8 = 0x00;
const SN3218_REG_PWM: u8 = 0x01;
const SN3218_REG_ENABLE: u8 = 0x13;
const SN3218_REG_UPDATE: u8 = 0x16;
const SN3218_BRIGHTNESS: u8 = 0xFF;

/// BCM line behind a digital channel.
fn bcm_line(channel: Channel) -> Option<u32> {
    let lines = match channel.bank {
        Bank::Relay => [13, 19, 16],
        Bank::Input => [26, 20, 21],
        Bank::Output => [5, 12, 6],
        Bank::Analog => return None,
    };
    Some(lines[channel.index.position()])
}

fn led_index(light: Light) -> u8 {
    match light {
        Light::Warn => 15,
        Light::Comms => 16,
        Light::Power => 17,
    }
}

/// Pimoroni Automation HAT: digital banks on GPIO lines, ADS1015 ADC and
/// SN3218 LED driver on a shared I2C bus.
pub struct AutomationHat<G: GpioBackend> {
    gpio: Arc<G>,
    bus: Option<Mutex<I2c>>,
}

impl<G: GpioBackend> AutomationHat<G> {
    /// Probes the ADC and, when it answers, claims the HAT's lines and
    /// enables the LED driver.
    pub fn new(gpio: Arc<G>, config: &HatConfig) -> Result<Self, AppError> {
        let bus = match Self::probe(config.i2c_bus) {
            Ok(bus) => Some(Mutex::new(bus)),
            Err(e) => {
                info!("Automation HAT not detected on i2c bus {}: {e}", config.i2c_bus);
                None
            }
        };

        let hat = Self { gpio, bus };
        if hat.bus.is_some() {
            hat.claim_lines()?;
            hat.enable_lights()?;
            info!("Automation HAT detected on i2c bus {}", config.i2c_bus);
        }
        Ok(hat)
    }

    fn probe(bus_number: u8) -> Result<I2c, AppError> {
        let mut bus =
            I2c::with_bus(bus_number).map_err(|e| AppError::I2c(format!("open bus: {e}")))?;
        bus.set_slave_address(ADS1015_ADDRESS)
            .map_err(|e| AppError::I2c(format!("select adc: {e}")))?;
        let mut buf = [0u8; 2];
        bus.write_read(&[ADS1015_REG_CONFIG], &mut buf)
            .map_err(|e| AppError::I2c(format!("probe adc: {e}")))?;
        Ok(bus)
    }

    fn claim_lines(&self) -> Result<(), AppError> {
        for bank in [Bank::Output, Bank::Relay, Bank::Input] {
            let direction = if bank.is_writable() {
                Direction::Output
            } else {
                Direction::Input
            };
            for index in ChannelIndex::ALL {
                if let Some(line) = bcm_line(Channel::new(bank, index)) {
                    self.gpio.configure(line, direction, 0)?;
                }
            }
        }
        Ok(())
    }

    fn enable_lights(&self) -> Result<(), AppError> {
        let bus = self.bus()?;
        let mut bus = bus.lock();
        bus.set_slave_address(SN3218_ADDRESS)
            .map_err(|e| AppError::I2c(format!("select led driver: {e}")))?;
        bus.smbus_write_byte(SN3218_REG_SHUTDOWN, 0x01)
            .map_err(|e| AppError::I2c(format!("led driver wake: {e}")))?;
        bus.block_write(SN3218_REG_ENABLE, &[0x3F, 0x3F, 0x3F])
            .map_err(|e| AppError::I2c(format!("led driver enable: {e}")))?;
        bus.smbus_write_byte(SN3218_REG_UPDATE, 0xFF)
            .map_err(|e| AppError::I2c(format!("led driver update: {e}")))?;
        Ok(())
    }

    fn bus(&self) -> Result<&Mutex<I2c>, AppError> {
        self.bus.as_ref().ok_or(AppError::HatNotFound)
    }

    fn digital_line(&self, channel: Channel) -> Result<u32, AppError> {
        self.bus()?;
        ensure_digital(channel)?;
        bcm_line(channel).ok_or_else(|| AppError::InvalidState(format!("{channel} has no line")))
    }
}

impl<G: GpioBackend> HatDriver for AutomationHat<G> {
    fn is_present(&self) -> bool {
        self.bus.is_some()
    }

    fn read_level(&self, channel: Channel) -> Result<u8, AppError> {
        let line = self.digital_line(channel)?;
        self.gpio.read_value(line)
    }

    fn read_analog(&self, channel: Channel) -> Result<f64, AppError> {
        ensure_analog(channel)?;
        let mux = ADS1015_MUX_SINGLE_0 + ((channel.index.position() as u16) << 12);
        let config = ADS1015_OS_SINGLE
            | mux
            | ADS1015_PGA_4096
            | ADS1015_MODE_SINGLE
            | ADS1015_DR_1600
            | ADS1015_COMP_DISABLE;

        let bus = self.bus()?;
        let mut bus = bus.lock();
        bus.set_slave_address(ADS1015_ADDRESS)
            .map_err(|e| AppError::I2c(format!("select adc: {e}")))?;
        let [hi, lo] = config.to_be_bytes();
        bus.write(&[ADS1015_REG_CONFIG, hi, lo])
            .map_err(|e| AppError::I2c(format!("start conversion on {channel}: {e}")))?;
        // blocks the calling worker for one conversion, under a millisecond at 1600 SPS
        thread::sleep(ADS1015_CONVERSION_WAIT);

        let mut buf = [0u8; 2];
        bus.write_read(&[ADS1015_REG_CONVERSION], &mut buf)
            .map_err(|e| AppError::I2c(format!("read conversion on {channel}: {e}")))?;

        // 12-bit left-aligned two's complement
        let raw = i16::from_be_bytes(buf) >> 4;
        let volts = f64::from(raw) * ADS1015_GAIN_VOLTS / 2048.0;
        let scaled = volts * ANALOG_MAX_VOLTS / ANALOG_ADC_VOLTS;
        Ok((scaled * 100.0).round() / 100.0)
    }

    fn write_level(&self, channel: Channel, value: u8) -> Result<(), AppError> {
        ensure_writable(channel)?;
        let line = self.digital_line(channel)?;
        self.gpio.write_value(line, value)
    }

    fn set_light(&self, light: Light, value: u8) -> Result<(), AppError> {
        let brightness = if value == 0 { 0 } else { SN3218_BRIGHTNESS };
        let bus = self.bus()?;
        let mut bus = bus.lock();
        bus.set_slave_address(SN3218_ADDRESS)
            .map_err(|e| AppError::I2c(format!("select led driver: {e}")))?;
        bus.smbus_write_byte(SN3218_REG_PWM + led_index(light), brightness)
            .map_err(|e| AppError::I2c(format!("set {light:?} light: {e}")))?;
        bus.smbus_write_byte(SN3218_REG_UPDATE, 0xFF)
            .map_err(|e| AppError::I2c(format!("led driver update: {e}")))?;
        Ok(())
    }
}
