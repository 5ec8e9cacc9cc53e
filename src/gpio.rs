use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn is_writable(&self) -> bool {
        matches!(self, Direction::Output)
    }
}

/// Auxiliary lines wired to the Pi header next to the HAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxPin {
    PorchLight,
    Spare1,
    Spare2,
}

impl AuxPin {
    pub const ALL: [AuxPin; 3] = [AuxPin::PorchLight, AuxPin::Spare1, AuxPin::Spare2];
}

/// Raw line I/O keyed by line offset on a single chip.
pub trait GpioBackend: Send + Sync {
    fn configure(&self, line: u32, direction: Direction, initial: u8) -> Result<(), AppError>;
    fn read_value(&self, line: u32) -> Result<u8, AppError>;
    fn write_value(&self, line: u32, value: u8) -> Result<(), AppError>;
}
