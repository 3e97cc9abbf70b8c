//! One-shot tick bring-up: LFCLK, prescaler, vector, RTC.

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::config::ClockRequest;
use crate::error::BringUpError;
use crate::oscillator::{start_oscillator, Deadline};
use crate::regs::{InterruptController, InterruptMask, LfClock, LfClockSource, RtcRegisters};
use crate::timer::program_timer;
use crate::vector::install_tick_handler;
use crate::LFCLK_FREQ;

/// The register blocks the tick path owns during bring-up.
pub struct TickHardware<'a, C, R, I, M> {
    pub clock: &'a mut C,
    pub rtc: &'a mut R,
    pub nvic: &'a mut I,
    pub mask: &'a mut M,
}

/// What bring-up actually programmed.
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConfig {
    pub requested_ticks_per_sec: u32,
    pub prescaler: u32,
    pub achieved_millihertz: u64,
    /// Whether the achieved rate equals the requested one
    pub exact: bool,
    pub source: LfClockSource,
    pub priority: u8,
    /// Status polls before the LFCLK reported running
    pub lfclk_polls: u32,
}

/// Start the periodic tick. Call once, before anything relies on the tick.
///
/// The request is validated before any register is written. Then, in order: the LFCLK is
/// (re)started from the requested source and waited for, `handler` is installed on the RTC's
/// interrupt line, and the RTC is reprogrammed and started with its TICK interrupt armed.
///
/// `handler` is what the interrupt controller runs for every RTC interrupt; it is expected to
/// forward to [`TickDispatcher::on_interrupt`](crate::TickDispatcher::on_interrupt).
pub fn bring_up<C, R, I, M, D>(
    request: &ClockRequest,
    hw: TickHardware<'_, C, R, I, M>,
    deadline: D,
    handler: fn(),
) -> Result<TickConfig, BringUpError>
where
    C: LfClock,
    R: RtcRegisters,
    I: InterruptController,
    M: InterruptMask,
    D: Deadline,
{
    let prescaler = request.validate(LFCLK_FREQ, R::PRESCALER_BITS, I::PRIO_BITS)?;
    let exact = crate::prescaler::Prescaler::is_exact(LFCLK_FREQ, request.ticks_per_sec);
    if !exact {
        warn!(
            "{} Hz is not a divisor of {} Hz, ticking at {} mHz",
            request.ticks_per_sec,
            LFCLK_FREQ,
            prescaler.achieved_millihertz(LFCLK_FREQ)
        );
    }

    info!(
        "Tick bring-up: {} Hz from {:?}, priority {}",
        request.ticks_per_sec,
        request.source,
        request.priority
    );

    let lfclk_polls = start_oscillator(hw.clock, request.source, deadline)?;

    let irq = hw.rtc.irq();
    install_tick_handler(hw.nvic, irq, request.priority, handler)?;
    program_timer(hw.rtc, hw.mask, prescaler);

    Ok(TickConfig {
        requested_ticks_per_sec: request.ticks_per_sec,
        prescaler: prescaler.value(),
        achieved_millihertz: prescaler.achieved_millihertz(LFCLK_FREQ),
        exact,
        source: request.source,
        priority: request.priority,
        lfclk_polls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClockStartTimeout, ConfigError};
    use crate::mock::{RegWrite, Sim, SimBoard};
    use crate::oscillator::{Forever, PollBudget};
    use crate::regs::{IrqNumber, RtcInterrupts};
    use crate::TickDispatcher;
    use std::cell::{Cell, RefCell};

    thread_local! {
        static SIM: RefCell<Option<Sim>> = const { RefCell::new(None) };
        static DISPATCHER: Cell<Option<&'static TickDispatcher>> = const { Cell::new(None) };
        static BEATS: Cell<u32> = const { Cell::new(0) };
        static FLAG_SET_IN_HEARTBEAT: Cell<u32> = const { Cell::new(0) };
        static ISR_SNAPSHOTS: RefCell<Vec<crate::mock::RtcSnapshot>> = const { RefCell::new(Vec::new()) };
    }

    fn sim() -> Sim {
        SIM.with(|s| s.borrow().clone().expect("sim not set"))
    }

    fn rtc0_isr() {
        let sim = sim();
        ISR_SNAPSHOTS.with(|s| s.borrow_mut().push(sim.rtc_snapshot()));
        if let Some(dispatcher) = DISPATCHER.with(|d| d.get()) {
            dispatcher.on_interrupt(&mut sim.rtc());
        }
    }

    fn heartbeat() {
        if sim().rtc_snapshot().events_tick {
            FLAG_SET_IN_HEARTBEAT.with(|f| f.set(f.get() + 1));
        }
        BEATS.with(|b| b.set(b.get() + 1));
    }

    fn setup() -> Sim {
        let sim = Sim::new();
        let dispatcher: &'static TickDispatcher = Box::leak(Box::new(TickDispatcher::new()));
        dispatcher.set_heartbeat(heartbeat);
        SIM.with(|s| *s.borrow_mut() = Some(sim.clone()));
        DISPATCHER.with(|d| d.set(Some(dispatcher)));
        BEATS.with(|b| b.set(0));
        FLAG_SET_IN_HEARTBEAT.with(|f| f.set(0));
        ISR_SNAPSHOTS.with(|s| s.borrow_mut().clear());
        sim
    }

    fn run<D: Deadline>(board: &mut SimBoard, request: &ClockRequest, deadline: D) -> Result<TickConfig, BringUpError> {
        bring_up(request, board.hardware(), deadline, rtc0_isr)
    }

    #[test]
    fn zero_rate_touches_no_register() {
        let sim = setup();
        let mut board = sim.board();

        let err = run(&mut board, &ClockRequest::new(0, 3), Forever).unwrap_err();
        assert_eq!(err, BringUpError::Config(ConfigError::ZeroTickRate));
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn bad_priority_touches_no_register() {
        let sim = setup();
        let mut board = sim.board();

        let err = run(&mut board, &ClockRequest::new(128, 8), Forever).unwrap_err();
        assert_eq!(
            err,
            BringUpError::Config(ConfigError::PriorityOutOfRange { priority: 8, lowest: 7 })
        );
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn only_tick_interrupt_enabled_afterwards() {
        let sim = setup();
        sim.lfclk_starts_after(2);
        let mut board = sim.board();

        let config = run(&mut board, &ClockRequest::new(128, 7), Forever).unwrap();
        assert_eq!(config.prescaler, 255);
        assert!(config.exact);
        assert_eq!(config.achieved_millihertz, 128_000);
        assert_eq!(config.lfclk_polls, 3);

        assert_eq!(board.rtc.enabled_interrupts(), RtcInterrupts::TICK);
        assert!(sim.rtc_snapshot().running);
        assert!(sim.nvic_enabled(IrqNumber::RTC0));
        assert_eq!(sim.nvic_priority(IrqNumber::RTC0), Some(7));
    }

    #[test]
    fn full_write_order() {
        let sim = setup();
        sim.lfclk_starts_after(0);
        let mut board = sim.board();

        run(&mut board, &ClockRequest::new(100, 1), Forever).unwrap();
        assert_eq!(
            sim.writes(),
            vec![
                RegWrite::LfClkStop,
                RegWrite::LfClkStartedEventClear,
                RegWrite::LfClkSource(LfClockSource::Xtal),
                RegWrite::LfClkStart,
                RegWrite::NvicPriority(IrqNumber::RTC0, 1),
                RegWrite::NvicVector(IrqNumber::RTC0),
                RegWrite::NvicEnable(IrqNumber::RTC0),
                RegWrite::MaskEnter,
                RegWrite::RtcStop,
                RegWrite::RtcTickEventClear,
                RegWrite::RtcPrescaler(326),
                RegWrite::RtcIntenClr(RtcInterrupts::ALL),
                RegWrite::RtcClear,
                RegWrite::MaskExit,
                RegWrite::RtcIntenSet(RtcInterrupts::TICK),
                RegWrite::RtcStart,
            ]
        );
    }

    #[test]
    fn inexact_rate_is_reported() {
        let sim = setup();
        sim.lfclk_starts_after(0);
        let mut board = sim.board();

        let config = run(&mut board, &ClockRequest::new(100, 1), Forever).unwrap();
        assert!(!config.exact);
        assert_eq!(config.prescaler, 326);
        assert_eq!(config.achieved_millihertz, 100_207);
    }

    #[test]
    fn n_ticks_n_heartbeats() {
        let sim = setup();
        sim.lfclk_starts_after(1);
        let mut board = sim.board();
        run(&mut board, &ClockRequest::new(1024, 7), Forever).unwrap();

        sim.advance(40);

        assert_eq!(BEATS.with(|b| b.get()), 40);
        assert_eq!(FLAG_SET_IN_HEARTBEAT.with(|f| f.get()), 0);
        assert_eq!(DISPATCHER.with(|d| d.get().unwrap().ticks()), 40);
        assert_eq!(sim.rtc_snapshot().counter, 40);
    }

    #[test]
    fn clock_timeout_leaves_rtc_and_nvic_alone() {
        let sim = setup();
        sim.lfclk_never_starts();
        let mut board = sim.board();

        let err = run(&mut board, &ClockRequest::new(128, 7), PollBudget::new(100)).unwrap_err();
        assert_eq!(
            err,
            BringUpError::ClockStartTimeout(ClockStartTimeout {
                requested: LfClockSource::Xtal
            })
        );
        assert!(sim.writes().iter().all(RegWrite::is_clock));
        assert!(!sim.nvic_enabled(IrqNumber::RTC0));
    }

    #[test]
    fn interrupt_mid_programming_sees_final_state() {
        let sim = setup();
        sim.lfclk_starts_after(0);
        // RTC left running by an earlier boot stage with a stale configuration
        sim.preload_rtc(31, RtcInterrupts::TICK | RtcInterrupts::COMPARE0);

        // Raise the RTC interrupt right after the prescaler write, mid critical section
        sim.inject_irq_after(RegWrite::RtcPrescaler(255));
        let mut board = sim.board();
        run(&mut board, &ClockRequest::new(128, 7), Forever).unwrap();

        let snapshots = ISR_SNAPSHOTS.with(|s| s.borrow().clone());
        assert_eq!(snapshots.len(), 1);
        let seen = snapshots[0];
        // Taken after the masked window closed: stopped, reprogrammed, cleared, nothing armed yet
        assert_eq!(seen.prescaler, 255);
        assert_eq!(seen.counter, 0);
        assert_eq!(seen.inten, RtcInterrupts::NONE);
        assert!(!seen.running);
    }

    #[test]
    fn unmasked_programming_would_be_observed_half_done() {
        let sim = setup();
        sim.lfclk_starts_after(0);
        sim.preload_rtc(31, RtcInterrupts::TICK);
        sim.inject_irq_after(RegWrite::RtcPrescaler(255));
        sim.disable_masking();

        let mut board = sim.board();
        run(&mut board, &ClockRequest::new(128, 7), Forever).unwrap();

        let snapshots = ISR_SNAPSHOTS.with(|s| s.borrow().clone());
        assert_eq!(snapshots.len(), 1);
        // Interrupt enables not yet cleared, counter not yet reset
        assert_eq!(snapshots[0].prescaler, 255);
        assert_eq!(snapshots[0].inten, RtcInterrupts::TICK);
        assert_eq!(snapshots[0].counter, 31);
    }
}
