//! Simulated CLOCK, RTC and NVIC.
//!
//! A [`Sim`] holds the register state of one board. Handles ([`SimClock`], [`SimRtc`],
//! [`SimNvic`], [`SimMask`]) implement the register traits on top of it and log every write, so
//! tests can check what was programmed and in which order.
//!
//! Interrupts are modelled the way the NVIC does it: raising a line marks it pending, a pending
//! line is taken once it is enabled and interrupts are not masked, and the RTC line is
//! level-sensitive (it pends again if the handler returns with the TICK event still set).
//! Handlers run on the calling thread with the state unlocked, so they can use the handles.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::vec::Vec;

use crate::bringup::TickHardware;
use crate::error::ConfigError;
use crate::regs::{
    InterruptController, InterruptMask, IrqNumber, LfClock, LfClockSource, LfClockStatus,
    RtcInterrupts, RtcRegisters,
};

const LINES: usize = 32;
/// Back-to-back entries of one line before the simulation calls it a storm.
const STORM_LIMIT: u32 = 10_000;
const COUNTER_MASK: u32 = 0x00ff_ffff;
const PRESCALER_MASK: u32 = 0x0fff;

/// One logged register access, plus the edges of masked sections.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWrite {
    LfClkStop,
    LfClkStartedEventClear,
    LfClkSource(LfClockSource),
    LfClkStart,
    RtcStop,
    RtcClear,
    RtcStart,
    RtcTickEventClear,
    RtcPrescaler(u32),
    RtcIntenClr(RtcInterrupts),
    RtcIntenSet(RtcInterrupts),
    NvicPriority(IrqNumber, u8),
    NvicVector(IrqNumber),
    NvicEnable(IrqNumber),
    MaskEnter,
    MaskExit,
}

impl RegWrite {
    pub fn is_clock(&self) -> bool {
        matches!(
            self,
            RegWrite::LfClkStop
                | RegWrite::LfClkStartedEventClear
                | RegWrite::LfClkSource(_)
                | RegWrite::LfClkStart
        )
    }
}

/// RTC registers at one instant.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RtcSnapshot {
    pub running: bool,
    pub counter: u32,
    pub prescaler: u32,
    pub events_tick: bool,
    pub inten: RtcInterrupts,
}

#[derive(Debug, Default, Clone, Copy)]
struct NvicLine {
    priority: Option<u8>,
    enabled: bool,
    pending: bool,
    vector: Option<fn()>,
}

#[derive(Debug)]
struct SimState {
    /// Polls before LFCLK reports started; `None` never starts
    lfclk_start_after: Option<u32>,
    /// Source LFCLKSTAT reports once started; `None` reports the selected one
    lfclk_reported: Option<LfClockSource>,
    lfclk_selected: LfClockSource,
    lfclk_starting: bool,
    lfclk_polls: u32,
    lfclk_started_event: bool,
    lfclk_stat: LfClockStatus,

    rtc: RtcSnapshot,
    rtc_irq: IrqNumber,

    nvic: [NvicLine; LINES],
    deliveries: u32,

    mask_depth: u32,
    masking: bool,
    inject_after: Option<RegWrite>,
    writes: Vec<RegWrite>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            lfclk_start_after: Some(0),
            lfclk_reported: None,
            lfclk_selected: LfClockSource::Rc,
            lfclk_starting: false,
            lfclk_polls: 0,
            lfclk_started_event: false,
            lfclk_stat: LfClockStatus::default(),
            rtc: RtcSnapshot::default(),
            rtc_irq: IrqNumber::RTC0,
            nvic: [NvicLine::default(); LINES],
            deliveries: 0,
            mask_depth: 0,
            masking: true,
            inject_after: None,
            writes: Vec::new(),
        }
    }
}

impl SimState {
    fn line(&mut self, irq: IrqNumber) -> Option<&mut NvicLine> {
        self.nvic.get_mut(usize::from(irq.0))
    }

    fn rtc_asserted(&self) -> bool {
        self.rtc.events_tick && self.rtc.inten.contains(RtcInterrupts::TICK)
    }
}

/// Shared simulated board. Cloning gives another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct Sim {
    state: Arc<Mutex<SimState>>,
}

impl Sim {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clock(&self) -> SimClock {
        SimClock(self.clone())
    }

    pub fn rtc(&self) -> SimRtc {
        SimRtc(self.clone())
    }

    pub fn nvic(&self) -> SimNvic {
        SimNvic(self.clone())
    }

    pub fn mask(&self) -> SimMask {
        SimMask(self.clone())
    }

    pub fn board(&self) -> SimBoard {
        SimBoard {
            clock: self.clock(),
            rtc: self.rtc(),
            nvic: self.nvic(),
            mask: self.mask(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// LFCLK reports started on the poll after `polls` unsuccessful ones.
    pub fn lfclk_starts_after(&self, polls: u32) {
        self.lock().lfclk_start_after = Some(polls);
    }

    pub fn lfclk_never_starts(&self) {
        self.lock().lfclk_start_after = None;
    }

    /// Once started, report `source` in LFCLKSTAT whatever was selected.
    pub fn lfclk_reports(&self, source: LfClockSource) {
        self.lock().lfclk_reported = Some(source);
    }

    /// EVENTS_LFCLKSTARTED reads since the last start task.
    pub fn lfclk_polls(&self) -> u32 {
        self.lock().lfclk_polls
    }

    pub fn writes(&self) -> Vec<RegWrite> {
        self.lock().writes.clone()
    }

    pub fn rtc_snapshot(&self) -> RtcSnapshot {
        self.lock().rtc
    }

    /// Put the RTC in the state an earlier boot stage could have left it in.
    pub fn preload_rtc(&self, counter: u32, inten: RtcInterrupts) {
        let mut s = self.lock();
        s.rtc.running = true;
        s.rtc.counter = counter & COUNTER_MASK;
        s.rtc.inten = inten;
    }

    /// Set EVENTS_TICK without raising the interrupt.
    pub fn set_tick_event(&self) {
        self.lock().rtc.events_tick = true;
    }

    pub fn nvic_enabled(&self, irq: IrqNumber) -> bool {
        self.lock().line(irq).map(|l| l.enabled).unwrap_or(false)
    }

    pub fn nvic_priority(&self, irq: IrqNumber) -> Option<u8> {
        self.lock().line(irq).and_then(|l| l.priority)
    }

    /// Interrupt handler entries so far.
    pub fn deliveries(&self) -> u32 {
        self.lock().deliveries
    }

    pub fn mask_depth(&self) -> u32 {
        self.lock().mask_depth
    }

    /// Right after `write` is next performed, set EVENTS_TICK and pend the RTC interrupt,
    /// as if a tick landed in the middle of a register sequence.
    pub fn inject_irq_after(&self, write: RegWrite) {
        self.lock().inject_after = Some(write);
    }

    /// Make [`SimMask`] a no-op: interrupts are taken even inside masked sections.
    pub fn disable_masking(&self) {
        self.lock().masking = false;
    }

    /// Let the running RTC count `ticks` times, taking the TICK interrupt after each one.
    pub fn advance(&self, ticks: u32) {
        for _ in 0..ticks {
            let raise = {
                let mut s = self.lock();
                if !s.rtc.running {
                    return;
                }
                s.rtc.counter = s.rtc.counter.wrapping_add(1) & COUNTER_MASK;
                s.rtc.events_tick = true;
                let raise = s.rtc_asserted();
                if raise {
                    let irq = s.rtc_irq;
                    if let Some(line) = s.line(irq) {
                        line.pending = true;
                    }
                }
                raise
            };
            if raise {
                self.take_pending();
            }
        }
    }

    fn write(&self, write: RegWrite, apply: impl FnOnce(&mut SimState)) {
        let inject = {
            let mut s = self.lock();
            apply(&mut *s);
            s.writes.push(write);
            let inject = s.inject_after == Some(write);
            if inject {
                s.inject_after = None;
                s.rtc.events_tick = true;
                let irq = s.rtc_irq;
                if let Some(line) = s.line(irq) {
                    line.pending = true;
                }
            }
            inject
        };
        if inject {
            self.take_pending();
        }
    }

    /// Take pending, enabled interrupts, most urgent first, until none is left or interrupts
    /// are masked.
    fn take_pending(&self) {
        let mut entries: u32 = 0;
        loop {
            let (index, vector) = {
                let mut s = self.lock();
                if s.masking && s.mask_depth > 0 {
                    return;
                }
                let next = s
                    .nvic
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| l.pending && l.enabled)
                    .min_by_key(|(_, l)| l.priority.unwrap_or(0))
                    .map(|(i, _)| i);
                let Some(index) = next else {
                    return;
                };
                s.nvic[index].pending = false;
                s.deliveries += 1;
                (index, s.nvic[index].vector)
            };

            entries += 1;
            assert!(entries <= STORM_LIMIT, "interrupt storm on IRQ {index}");
            match vector {
                Some(handler) => handler(),
                None => panic!("IRQ {index} taken through an empty vector slot"),
            }

            let mut s = self.lock();
            if usize::from(s.rtc_irq.0) == index && s.rtc_asserted() {
                s.nvic[index].pending = true;
            }
        }
    }
}

/// All four handles, for [`bring_up`](crate::bring_up).
#[derive(Debug)]
pub struct SimBoard {
    pub clock: SimClock,
    pub rtc: SimRtc,
    pub nvic: SimNvic,
    pub mask: SimMask,
}

impl SimBoard {
    pub fn hardware(&mut self) -> TickHardware<'_, SimClock, SimRtc, SimNvic, SimMask> {
        TickHardware {
            clock: &mut self.clock,
            rtc: &mut self.rtc,
            nvic: &mut self.nvic,
            mask: &mut self.mask,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimClock(Sim);

impl LfClock for SimClock {
    fn stop(&mut self) {
        self.0.write(RegWrite::LfClkStop, |s| {
            s.lfclk_starting = false;
            s.lfclk_stat = LfClockStatus::default();
        });
    }

    fn clear_started_event(&mut self) {
        self.0
            .write(RegWrite::LfClkStartedEventClear, |s| s.lfclk_started_event = false);
    }

    fn select_source(&mut self, source: LfClockSource) {
        self.0
            .write(RegWrite::LfClkSource(source), |s| s.lfclk_selected = source);
    }

    fn start(&mut self) {
        self.0.write(RegWrite::LfClkStart, |s| {
            s.lfclk_starting = true;
            s.lfclk_polls = 0;
        });
    }

    fn started_event(&mut self) -> bool {
        let mut s = self.0.lock();
        if s.lfclk_starting {
            s.lfclk_polls += 1;
            if let Some(after) = s.lfclk_start_after {
                if s.lfclk_polls > after {
                    s.lfclk_starting = false;
                    s.lfclk_started_event = true;
                    let source = s.lfclk_reported.unwrap_or(s.lfclk_selected);
                    s.lfclk_stat = LfClockStatus::running(source);
                }
            }
        }
        s.lfclk_started_event
    }

    fn status(&mut self) -> LfClockStatus {
        self.0.lock().lfclk_stat
    }
}

#[derive(Debug, Clone)]
pub struct SimRtc(Sim);

impl RtcRegisters for SimRtc {
    fn irq(&self) -> IrqNumber {
        self.0.lock().rtc_irq
    }

    fn stop(&mut self) {
        self.0.write(RegWrite::RtcStop, |s| s.rtc.running = false);
    }

    fn clear(&mut self) {
        self.0.write(RegWrite::RtcClear, |s| s.rtc.counter = 0);
    }

    fn start(&mut self) {
        self.0.write(RegWrite::RtcStart, |s| s.rtc.running = true);
    }

    fn tick_event(&mut self) -> bool {
        self.0.lock().rtc.events_tick
    }

    fn clear_tick_event(&mut self) {
        self.0
            .write(RegWrite::RtcTickEventClear, |s| s.rtc.events_tick = false);
    }

    fn set_prescaler(&mut self, value: u32) {
        // The register keeps the low 12 bits only
        self.0.write(RegWrite::RtcPrescaler(value), |s| {
            s.rtc.prescaler = value & PRESCALER_MASK
        });
    }

    fn disable_interrupts(&mut self, mask: RtcInterrupts) {
        self.0.write(RegWrite::RtcIntenClr(mask), |s| {
            s.rtc.inten = RtcInterrupts(s.rtc.inten.0 & !mask.0)
        });
    }

    fn enable_interrupts(&mut self, mask: RtcInterrupts) {
        self.0
            .write(RegWrite::RtcIntenSet(mask), |s| s.rtc.inten = s.rtc.inten | mask);
    }

    fn enabled_interrupts(&mut self) -> RtcInterrupts {
        self.0.lock().rtc.inten
    }
}

/// Nested vectored interrupt controller with 3 priority bits, as on nRF52.
#[derive(Debug, Clone)]
pub struct SimNvic(Sim);

impl InterruptController for SimNvic {
    const PRIO_BITS: u8 = 3;

    fn set_priority(&mut self, irq: IrqNumber, priority: u8) {
        self.0.write(RegWrite::NvicPriority(irq, priority), |s| {
            if let Some(line) = s.line(irq) {
                line.priority = Some(priority);
            }
        });
    }

    fn set_vector(&mut self, irq: IrqNumber, handler: fn()) -> Result<(), ConfigError> {
        if usize::from(irq.0) >= LINES {
            return Err(ConfigError::NoSuchVector { irq: irq.0 });
        }
        self.0.write(RegWrite::NvicVector(irq), |s| {
            if let Some(line) = s.line(irq) {
                line.vector = Some(handler);
            }
        });
        Ok(())
    }

    fn enable(&mut self, irq: IrqNumber) {
        self.0.write(RegWrite::NvicEnable(irq), |s| {
            if let Some(line) = s.line(irq) {
                line.enabled = true;
            }
        });
        // a line that was already pending is taken as soon as it is enabled
        self.0.take_pending();
    }
}

#[derive(Debug, Clone)]
pub struct SimMask(Sim);

impl InterruptMask for SimMask {
    fn masked<R>(&mut self, f: impl FnOnce() -> R) -> R {
        self.0.write(RegWrite::MaskEnter, |s| s.mask_depth += 1);
        let _unmask = Unmask(&self.0);
        f()
    }
}

/// Closes one masked section when dropped, including when the closure unwinds.
struct Unmask<'a>(&'a Sim);

impl Drop for Unmask<'_> {
    fn drop(&mut self) {
        self.0
            .write(RegWrite::MaskExit, |s| s.mask_depth = s.mask_depth.saturating_sub(1));
        // No handlers while unwinding; whatever is pending is taken on the next unmask
        if !std::thread::panicking() {
            self.0.take_pending();
        }
    }
}
