#[cfg(feature = "defmt")]
use defmt::Format;
use thiserror::Error;

use crate::regs::LfClockSource;

/// Optional board device a [`ConfigError`] refers to.
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Uart0,
    Spi0Master,
    Spi1Slave,
}

/// Request rejected before any register is touched.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tick rate must be nonzero")]
    ZeroTickRate,
    #[error("tick rate {requested} Hz exceeds base frequency {base} Hz")]
    TickRateTooHigh { requested: u32, base: u32 },
    #[error("prescaler {value} does not fit a {bits}-bit prescaler register")]
    PrescalerOverflow { value: u32, bits: u32 },
    #[error("interrupt priority {priority} outside 0..={lowest}")]
    PriorityOutOfRange { priority: u8, lowest: u8 },
    #[error("no vector slot for interrupt {irq}")]
    NoSuchVector { irq: u16 },
    #[error("{device:?}: pin {pin} does not exist")]
    InvalidPin { device: Device, pin: u8 },
    #[error("{device:?}: pin {pin} assigned twice")]
    PinConflict { device: Device, pin: u8 },
    #[error("{device:?}: interrupt priority {priority} outside 0..={lowest}")]
    DevicePriority { device: Device, priority: u8, lowest: u8 },
}

/// The low-frequency clock did not report running from the requested source in time.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("low-frequency clock did not report {requested:?} running before the deadline")]
pub struct ClockStartTimeout {
    pub requested: LfClockSource,
}

#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    ClockStartTimeout(#[from] ClockStartTimeout),
}
