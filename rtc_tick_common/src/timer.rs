use crate::prescaler::Prescaler;
use crate::regs::{InterruptMask, RtcInterrupts, RtcRegisters};

/// Reprogram the RTC for `prescaler`, then arm the TICK interrupt and start counting.
///
/// The stop/clear/program part runs with interrupts masked so a handler never sees the RTC
/// half-programmed. Arming happens before starting so the first tick cannot be missed, and
/// nothing is started before the prescaler is in place.
///
/// The tick vector must already be installed: once the TICK bit is armed the RTC may fire.
pub fn program_timer<R, M>(rtc: &mut R, mask: &mut M, prescaler: Prescaler)
where
    R: RtcRegisters,
    M: InterruptMask,
{
    mask.masked(|| {
        rtc.stop();
        rtc.clear_tick_event();
        rtc.set_prescaler(prescaler.value());
        rtc.disable_interrupts(RtcInterrupts::ALL);
        rtc.clear();
    });

    rtc.enable_interrupts(RtcInterrupts::TICK);
    rtc.start();
    debug!("RTC armed, prescaler {}", prescaler.value());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{RegWrite, Sim};

    #[test]
    fn register_sequence() {
        let sim = Sim::new();
        program_timer(&mut sim.rtc(), &mut sim.mask(), Prescaler::from_raw(255));

        assert_eq!(
            sim.writes(),
            vec![
                RegWrite::MaskEnter,
                RegWrite::RtcStop,
                RegWrite::RtcTickEventClear,
                RegWrite::RtcPrescaler(255),
                RegWrite::RtcIntenClr(RtcInterrupts::ALL),
                RegWrite::RtcClear,
                RegWrite::MaskExit,
                RegWrite::RtcIntenSet(RtcInterrupts::TICK),
                RegWrite::RtcStart,
            ]
        );
    }

    #[test]
    fn stale_interrupts_are_cleared() {
        let sim = Sim::new();
        {
            let mut rtc = sim.rtc();
            rtc.enable_interrupts(RtcInterrupts::COMPARE1 | RtcInterrupts::OVRFLW);
            rtc.start();
        }
        sim.advance(5);

        program_timer(&mut sim.rtc(), &mut sim.mask(), Prescaler::from_raw(7));

        let rtc = sim.rtc_snapshot();
        assert_eq!(rtc.inten, RtcInterrupts::TICK);
        assert_eq!(rtc.prescaler, 7);
        assert_eq!(rtc.counter, 0);
        assert!(rtc.running);
        assert!(!rtc.events_tick);
    }

    #[test]
    fn mask_released_after_programming() {
        let sim = Sim::new();
        program_timer(&mut sim.rtc(), &mut sim.mask(), Prescaler::from_raw(0));
        assert_eq!(sim.mask_depth(), 0);
    }
}
