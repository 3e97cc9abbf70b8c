//! Register-level interfaces the tick path consumes.
//!
//! Each trait covers one memory-mapped block with the bit semantics of the nRF CLOCK, RTC and
//! NVIC peripherals. Components take these by exclusive reference; nothing here reaches for a
//! global.

#[cfg(feature = "defmt")]
use defmt::Format;

/// Low-frequency clock source, encoded as in the LFCLKSRC/LFCLKSTAT SRC field.
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LfClockSource {
    /// Internal 32.768 kHz RC oscillator
    Rc = 0,
    /// External 32.768 kHz crystal
    #[default]
    Xtal = 1,
    /// Synthesized from the high-frequency clock
    Synth = 2,
}

impl LfClockSource {
    pub const fn bits(self) -> u32 {
        self as u32
    }

    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits & LfClockStatus::SRC_MASK {
            0 => Some(Self::Rc),
            1 => Some(Self::Xtal),
            2 => Some(Self::Synth),
            _ => None,
        }
    }
}

/// Raw LFCLKSTAT word.
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LfClockStatus(pub u32);

impl LfClockStatus {
    pub const STATE: u32 = 1 << 16;
    pub const SRC_MASK: u32 = 0b11;

    pub const fn running(source: LfClockSource) -> Self {
        Self(Self::STATE | source.bits())
    }

    pub const fn is_running(self) -> bool {
        self.0 & Self::STATE != 0
    }

    pub const fn source(self) -> Option<LfClockSource> {
        LfClockSource::from_bits(self.0)
    }

    /// Running, and from exactly `requested`.
    ///
    /// Compares the whole SRC field: masking with the requested source's bits alone would accept
    /// any source when RC (encoding 0) is requested.
    pub fn running_from(self, requested: LfClockSource) -> bool {
        self.is_running() && self.source() == Some(requested)
    }
}

/// CLOCK peripheral, low-frequency half.
pub trait LfClock {
    /// TASKS_LFCLKSTOP
    fn stop(&mut self);
    /// EVENTS_LFCLKSTARTED = 0
    fn clear_started_event(&mut self);
    /// LFCLKSRC
    fn select_source(&mut self, source: LfClockSource);
    /// TASKS_LFCLKSTART
    fn start(&mut self);
    /// EVENTS_LFCLKSTARTED
    fn started_event(&mut self) -> bool;
    /// LFCLKSTAT
    fn status(&mut self) -> LfClockStatus;
}

/// RTC interrupt/event bits, as laid out in INTENSET/INTENCLR.
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RtcInterrupts(pub u32);

impl RtcInterrupts {
    pub const NONE: Self = Self(0);
    pub const TICK: Self = Self(1 << 0);
    pub const OVRFLW: Self = Self(1 << 1);
    pub const COMPARE0: Self = Self(1 << 16);
    pub const COMPARE1: Self = Self(1 << 17);
    pub const COMPARE2: Self = Self(1 << 18);
    pub const COMPARE3: Self = Self(1 << 19);
    pub const ALL: Self = Self(0xffff_ffff);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl core::ops::BitOr for RtcInterrupts {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Interrupt line number as the interrupt controller sees it.
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IrqNumber(pub u16);

impl IrqNumber {
    pub const RTC0: Self = Self(11);
}

/// RTC (real-time counter) register block.
pub trait RtcRegisters {
    /// Width of the PRESCALER register.
    const PRESCALER_BITS: u32 = 12;

    /// Interrupt line this RTC instance raises.
    fn irq(&self) -> IrqNumber;

    /// TASKS_STOP
    fn stop(&mut self);
    /// TASKS_CLEAR
    fn clear(&mut self);
    /// TASKS_START
    fn start(&mut self);
    /// EVENTS_TICK
    fn tick_event(&mut self) -> bool;
    /// EVENTS_TICK = 0
    fn clear_tick_event(&mut self);
    /// PRESCALER
    fn set_prescaler(&mut self, value: u32);
    /// INTENCLR
    fn disable_interrupts(&mut self, mask: RtcInterrupts);
    /// INTENSET
    fn enable_interrupts(&mut self, mask: RtcInterrupts);
    /// INTENSET read-back
    fn enabled_interrupts(&mut self) -> RtcInterrupts;
}

/// Interrupt controller: priority, vector and enable for one line at a time.
pub trait InterruptController {
    /// Number of implemented priority bits.
    const PRIO_BITS: u8;

    /// Set the logical priority `0..=lowest_priority(PRIO_BITS)`; 0 is the most urgent.
    fn set_priority(&mut self, irq: IrqNumber, priority: u8);
    fn set_vector(&mut self, irq: IrqNumber, handler: fn()) -> Result<(), crate::ConfigError>;
    fn enable(&mut self, irq: IrqNumber);
}

/// Scoped interrupt masking.
///
/// Interrupts raised inside `masked` are held pending and taken after the outermost scope
/// closes. Implementations must restore the previous mask state on every exit path.
pub trait InterruptMask {
    fn masked<R>(&mut self, f: impl FnOnce() -> R) -> R;
}
