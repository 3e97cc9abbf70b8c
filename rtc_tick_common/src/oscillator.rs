use crate::error::ClockStartTimeout;
use crate::regs::{LfClock, LfClockSource};

/// When to give up waiting for hardware.
pub trait Deadline {
    /// Called before each status poll; `true` ends the wait without polling.
    fn expired(&mut self) -> bool;
}

/// Never gives up. Boot-time hardware is assumed present; a missing crystal hangs here.
#[derive(Debug, Default, Clone, Copy)]
pub struct Forever;

impl Deadline for Forever {
    fn expired(&mut self) -> bool {
        false
    }
}

/// Allows exactly `polls` status polls, then gives up.
#[derive(Debug, Clone, Copy)]
pub struct PollBudget {
    remaining: u32,
}

impl PollBudget {
    pub const fn new(polls: u32) -> Self {
        Self { remaining: polls }
    }
}

impl Deadline for PollBudget {
    fn expired(&mut self) -> bool {
        match self.remaining.checked_sub(1) {
            Some(left) => {
                self.remaining = left;
                false
            }
            None => true,
        }
    }
}

/// Start the low-frequency clock from `source` and wait until it reports running from it.
///
/// Returns the number of polls it took.
pub fn start_oscillator<C, D>(
    clock: &mut C,
    source: LfClockSource,
    mut deadline: D,
) -> Result<u32, ClockStartTimeout>
where
    C: LfClock,
    D: Deadline,
{
    clock.stop();
    clock.clear_started_event();
    clock.select_source(source);
    clock.start();

    let mut polls: u32 = 0;
    loop {
        if deadline.expired() {
            warn!("LFCLK did not start from {:?} after {} polls", source, polls);
            return Err(ClockStartTimeout { requested: source });
        }
        polls = polls.saturating_add(1);
        if clock.started_event() && clock.status().running_from(source) {
            debug!("LFCLK running from {:?} after {} polls", source, polls);
            return Ok(polls);
        }
        core::hint::spin_loop();
    }
}
