#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! Board-level RTC heartbeat.
//!
//! Starts the low-frequency clock, derives a fixed tick rate from it with the RTC prescaler,
//! installs the tick handler and forwards every RTC TICK event to the system heartbeat.
//!
//! Everything here talks to the hardware through the traits in [`regs`], so the same code runs
//! on the nRF peripherals (see `rtc_tick_firmware`) and on the simulated register block in
//! [`mock`].

#[macro_use]
mod fmt;

pub mod bringup;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod oscillator;
pub mod prescaler;
pub mod regs;
pub mod timer;
pub mod vector;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use bringup::{bring_up, TickConfig, TickHardware};
pub use config::{BoardConfig, ClockRequest, SpiMasterConfig, SpiSlaveConfig, UartConfig};
pub use dispatch::{DispatchState, TickDispatcher};
pub use error::{BringUpError, ClockStartTimeout, ConfigError, Device};
pub use oscillator::{start_oscillator, Deadline, Forever, PollBudget};
pub use prescaler::{compute_prescaler, rate_fits, Prescaler};
pub use regs::{
    InterruptController, InterruptMask, IrqNumber, LfClock, LfClockSource, LfClockStatus,
    RtcInterrupts, RtcRegisters,
};
pub use timer::program_timer;
pub use vector::{install_tick_handler, VectorTable};

/// Frequency of the low-frequency clock (LFCLK), in Hz.
pub const LFCLK_FREQ: u32 = 32_768;

/// Lowest (numerically highest) interrupt priority for a controller with `prio_bits` priority bits.
pub const fn lowest_priority(prio_bits: u8) -> u8 {
    if prio_bits >= 8 {
        u8::MAX
    } else {
        (1u8 << prio_bits) - 1
    }
}
