#[cfg(feature = "defmt")]
use defmt::Format;

use crate::error::ConfigError;

/// RTC prescaler value. The RTC ticks once every `value + 1` periods of the base clock.
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prescaler(u32);

impl Prescaler {
    /// Prescaler giving the rate closest to, but not below, `ticks_per_sec`.
    ///
    /// When `base_freq` is not a multiple of `ticks_per_sec` the division truncates the divisor,
    /// so the achieved rate is slightly higher (the period slightly shorter) than requested:
    /// 100 Hz from 32768 Hz gives 32768 / 327 = 100.2 Hz.
    /// See [`Prescaler::is_exact`] and [`Prescaler::achieved_millihertz`].
    pub fn for_rate(base_freq: u32, ticks_per_sec: u32) -> Result<Self, ConfigError> {
        if ticks_per_sec == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if ticks_per_sec > base_freq {
            return Err(ConfigError::TickRateTooHigh {
                requested: ticks_per_sec,
                base: base_freq,
            });
        }
        Ok(Self(base_freq / ticks_per_sec - 1))
    }

    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// Base clock periods per tick.
    pub const fn divisor(self) -> u64 {
        self.0 as u64 + 1
    }

    /// Whether the value fits a prescaler register `bits` wide.
    pub fn check_width(self, bits: u32) -> Result<Self, ConfigError> {
        let max = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
        if self.0 > max {
            Err(ConfigError::PrescalerOverflow { value: self.0, bits })
        } else {
            Ok(self)
        }
    }

    pub const fn is_exact(base_freq: u32, ticks_per_sec: u32) -> bool {
        ticks_per_sec != 0 && base_freq % ticks_per_sec == 0
    }

    /// Tick rate this prescaler actually produces, in mHz.
    pub const fn achieved_millihertz(self, base_freq: u32) -> u64 {
        base_freq as u64 * 1000 / self.divisor()
    }

    /// Tick period this prescaler actually produces, in ns.
    pub const fn period_nanos(self, base_freq: u32) -> u64 {
        self.divisor() * 1_000_000_000 / base_freq as u64
    }
}

/// Whether `ticks_per_sec` yields a prescaler that fits a `bits`-wide register.
/// Usable in const context, so a build-time rate can be checked at compile time.
pub const fn rate_fits(base_freq: u32, ticks_per_sec: u32, bits: u32) -> bool {
    if ticks_per_sec == 0 || ticks_per_sec > base_freq {
        return false;
    }
    bits >= 32 || base_freq / ticks_per_sec - 1 < (1u32 << bits)
}

/// `(base_freq / ticks_per_sec) - 1`, refusing rates that would underflow.
pub fn compute_prescaler(base_freq: u32, ticks_per_sec: u32) -> Result<u32, ConfigError> {
    Prescaler::for_rate(base_freq, ticks_per_sec).map(Prescaler::value)
}
