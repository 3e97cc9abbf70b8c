use cortex_m::peripheral::NVIC;
use cortex_m::interrupt::InterruptNumber;

use nrf52810_hal::pac;
use rtc_tick_common::{
    ConfigError, InterruptController, InterruptMask, IrqNumber, LfClock, LfClockSource,
    LfClockStatus, RtcInterrupts, RtcRegisters, VectorTable,
};

use crate::config::NVIC_PRIO_BITS;

/// Interrupt lines on the nRF52810, rounded up.
pub const VECTOR_SLOTS: usize = 32;

/// Low-frequency clock control in the CLOCK peripheral.
pub struct Clock(pac::CLOCK);

impl Clock {
    pub fn new(clock: pac::CLOCK) -> Self {
        Self(clock)
    }
}

impl LfClock for Clock {
    fn stop(&mut self) {
        self.0.tasks_lfclkstop.write(|w| unsafe { w.bits(1) });
    }

    fn clear_started_event(&mut self) {
        self.0.events_lfclkstarted.write(|w| unsafe { w.bits(0) });
    }

    fn select_source(&mut self, source: LfClockSource) {
        // NoExternalNoBypass: the crystal needs no external signal with the reference circuit
        self.0.lfclksrc.write(|w| unsafe { w.bits(source.bits()) });
    }

    fn start(&mut self) {
        self.0.tasks_lfclkstart.write(|w| unsafe { w.bits(1) });
    }

    fn started_event(&mut self) -> bool {
        self.0.events_lfclkstarted.read().bits() != 0
    }

    fn status(&mut self) -> LfClockStatus {
        LfClockStatus(self.0.lfclkstat.read().bits())
    }
}

/// Real-time counter 0.
pub struct Rtc0 {
    regs: &'static pac::rtc0::RegisterBlock,
}

impl Rtc0 {
    pub fn new(_rtc: pac::RTC0) -> Self {
        Self {
            regs: unsafe { &*pac::RTC0::ptr() },
        }
    }

    /// Second handle for the tick interrupt.
    ///
    /// # Safety
    /// The interrupt handler may only read and clear EVENTS_TICK through it. The RTC interrupt is
    /// not armed until bring-up has finished programming through the owning handle.
    pub unsafe fn steal() -> Self {
        Self {
            regs: &*pac::RTC0::ptr(),
        }
    }
}

impl RtcRegisters for Rtc0 {
    fn irq(&self) -> IrqNumber {
        IrqNumber(pac::Interrupt::RTC0 as u16)
    }

    fn stop(&mut self) {
        self.regs.tasks_stop.write(|w| unsafe { w.bits(1) });
    }

    fn clear(&mut self) {
        self.regs.tasks_clear.write(|w| unsafe { w.bits(1) });
    }

    fn start(&mut self) {
        self.regs.tasks_start.write(|w| unsafe { w.bits(1) });
    }

    fn tick_event(&mut self) -> bool {
        self.regs.events_tick.read().bits() != 0
    }

    fn clear_tick_event(&mut self) {
        self.regs.events_tick.write(|w| unsafe { w.bits(0) });
    }

    fn set_prescaler(&mut self, value: u32) {
        self.regs.prescaler.write(|w| unsafe { w.bits(value) });
    }

    fn disable_interrupts(&mut self, mask: RtcInterrupts) {
        self.regs.intenclr.write(|w| unsafe { w.bits(mask.bits()) });
    }

    fn enable_interrupts(&mut self, mask: RtcInterrupts) {
        self.regs.intenset.write(|w| unsafe { w.bits(mask.bits()) });
    }

    fn enabled_interrupts(&mut self) -> RtcInterrupts {
        RtcInterrupts(self.regs.intenset.read().bits())
    }
}

#[derive(Clone, Copy)]
struct Line(u16);

unsafe impl InterruptNumber for Line {
    fn number(self) -> u16 {
        self.0
    }
}

/// The core's NVIC plus the RAM vector table the interrupt entry points forward to.
pub struct Nvic<'a> {
    nvic: &'a mut NVIC,
    vectors: &'static VectorTable<VECTOR_SLOTS>,
}

impl<'a> Nvic<'a> {
    pub fn new(nvic: &'a mut NVIC, vectors: &'static VectorTable<VECTOR_SLOTS>) -> Self {
        Self { nvic, vectors }
    }
}

impl InterruptController for Nvic<'_> {
    const PRIO_BITS: u8 = NVIC_PRIO_BITS;

    fn set_priority(&mut self, irq: IrqNumber, priority: u8) {
        // Priorities are stored in the top bits of the byte
        unsafe {
            self.nvic
                .set_priority(Line(irq.0), priority << (8 - Self::PRIO_BITS));
        }
    }

    fn set_vector(&mut self, irq: IrqNumber, handler: fn()) -> Result<(), ConfigError> {
        self.vectors.install(irq, handler)
    }

    fn enable(&mut self, irq: IrqNumber) {
        unsafe { NVIC::unmask(Line(irq.0)) }
    }
}

/// Masks all maskable interrupts (PRIMASK) for the duration of the closure.
pub struct GlobalMask;

impl InterruptMask for GlobalMask {
    fn masked<R>(&mut self, f: impl FnOnce() -> R) -> R {
        critical_section::with(|_| f())
    }
}
