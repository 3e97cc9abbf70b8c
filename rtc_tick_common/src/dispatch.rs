//! RTC TICK interrupt handling.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use critical_section::Mutex;
#[cfg(feature = "defmt")]
use defmt::Format;

use crate::regs::RtcRegisters;

#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatchState {
    /// Waiting for the next TICK event
    Idle = 0,
    /// Event acknowledged, heartbeat running
    Dispatching = 1,
}

/// Forwards each RTC TICK event to the system heartbeat, exactly once.
///
/// Meant to live in a `static` and be driven from the RTC interrupt. The counters are only
/// written from that one interrupt, so plain load/store is enough (and works on cores without
/// atomic read-modify-write).
pub struct TickDispatcher {
    heartbeat: Mutex<Cell<Option<fn()>>>,
    state: AtomicU8,
    ticks: AtomicU32,
    spurious: AtomicU32,
}

impl TickDispatcher {
    pub const fn new() -> Self {
        Self {
            heartbeat: Mutex::new(Cell::new(None)),
            state: AtomicU8::new(DispatchState::Idle as u8),
            ticks: AtomicU32::new(0),
            spurious: AtomicU32::new(0),
        }
    }

    /// Register the callback run once per tick, at the tick interrupt's priority.
    pub fn set_heartbeat(&self, heartbeat: fn()) {
        critical_section::with(|cs| self.heartbeat.borrow(cs).set(Some(heartbeat)));
    }

    /// Handle one entry of the RTC interrupt.
    ///
    /// If the TICK event is set, it is cleared *before* the heartbeat runs: a tick arriving
    /// while the heartbeat runs then sets the event again and is taken on the next entry
    /// instead of being wiped out. Returns whether a tick was dispatched.
    pub fn on_interrupt<R: RtcRegisters>(&self, rtc: &mut R) -> bool {
        if !rtc.tick_event() {
            bump(&self.spurious);
            trace!("RTC interrupt without TICK event");
            return false;
        }

        self.state.store(DispatchState::Dispatching as u8, Ordering::Release);
        rtc.clear_tick_event();
        bump(&self.ticks);

        let heartbeat = critical_section::with(|cs| self.heartbeat.borrow(cs).get());
        if let Some(heartbeat) = heartbeat {
            heartbeat();
        }

        self.state.store(DispatchState::Idle as u8, Ordering::Release);
        true
    }

    pub fn state(&self) -> DispatchState {
        match self.state.load(Ordering::Acquire) {
            0 => DispatchState::Idle,
            _ => DispatchState::Dispatching,
        }
    }

    /// Ticks dispatched since boot (wraps).
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Interrupt entries that found no TICK event.
    pub fn spurious(&self) -> u32 {
        self.spurious.load(Ordering::Relaxed)
    }
}

impl Default for TickDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn bump(counter: &AtomicU32) {
    counter.store(counter.load(Ordering::Relaxed).wrapping_add(1), Ordering::Relaxed);
}
