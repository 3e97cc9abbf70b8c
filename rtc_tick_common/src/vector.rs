//! Interrupt vector installation.

use core::cell::Cell;

use critical_section::Mutex;

use crate::error::ConfigError;
use crate::regs::{InterruptController, IrqNumber};

/// RAM vector table: one optional handler per interrupt line.
///
/// The real interrupt entry points forward to [`VectorTable::invoke`], which makes the handler
/// a runtime choice, like relocating the hardware vector table to RAM.
pub struct VectorTable<const N: usize> {
    slots: Mutex<Cell<[Option<fn()>; N]>>,
}

impl<const N: usize> VectorTable<N> {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(Cell::new([None; N])),
        }
    }

    pub fn install(&self, irq: IrqNumber, handler: fn()) -> Result<(), ConfigError> {
        let index = usize::from(irq.0);
        if index >= N {
            return Err(ConfigError::NoSuchVector { irq: irq.0 });
        }
        critical_section::with(|cs| {
            let cell = self.slots.borrow(cs);
            let mut slots = cell.get();
            slots[index] = Some(handler);
            cell.set(slots);
        });
        Ok(())
    }

    pub fn handler(&self, irq: IrqNumber) -> Option<fn()> {
        let index = usize::from(irq.0);
        critical_section::with(|cs| self.slots.borrow(cs).get().get(index).copied().flatten())
    }

    /// Run the handler installed for `irq`, if any. The handler runs outside the critical section.
    pub fn invoke(&self, irq: IrqNumber) -> bool {
        match self.handler(irq) {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

impl<const N: usize> Default for VectorTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Set the priority of `irq`, point its vector at `handler` and enable the line.
///
/// Must run before the peripheral's interrupt is armed, otherwise the first event could be taken
/// through an empty or stale slot.
pub fn install_tick_handler<I>(
    nvic: &mut I,
    irq: IrqNumber,
    priority: u8,
    handler: fn(),
) -> Result<(), ConfigError>
where
    I: InterruptController,
{
    let lowest = crate::lowest_priority(I::PRIO_BITS);
    if priority > lowest {
        return Err(ConfigError::PriorityOutOfRange { priority, lowest });
    }

    nvic.set_priority(irq, priority);
    nvic.set_vector(irq, handler)?;
    nvic.enable(irq);
    debug!("IRQ {} installed at priority {}", irq.0, priority);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{RegWrite, Sim};
    use std::cell::Cell as StdCell;

    thread_local! {
        static CALLS: StdCell<u32> = const { StdCell::new(0) };
    }

    fn count_call() {
        CALLS.with(|c| c.set(c.get() + 1));
    }

    #[test]
    fn table_install_and_invoke() {
        CALLS.with(|c| c.set(0));
        let table: VectorTable<4> = VectorTable::new();
        assert!(!table.invoke(IrqNumber(2)));

        table.install(IrqNumber(2), count_call).unwrap();
        assert!(table.invoke(IrqNumber(2)));
        assert!(table.invoke(IrqNumber(2)));
        assert!(!table.invoke(IrqNumber(3)));
        assert_eq!(CALLS.with(|c| c.get()), 2);
    }

    #[test]
    fn table_rejects_missing_slot() {
        let table: VectorTable<4> = VectorTable::new();
        assert_eq!(
            table.install(IrqNumber(4), count_call),
            Err(ConfigError::NoSuchVector { irq: 4 })
        );
        assert!(table.handler(IrqNumber(40)).is_none());
    }

    #[test]
    fn installs_priority_vector_then_enables() {
        let sim = Sim::new();
        install_tick_handler(&mut sim.nvic(), IrqNumber::RTC0, 3, count_call).unwrap();

        assert_eq!(
            sim.writes(),
            vec![
                RegWrite::NvicPriority(IrqNumber::RTC0, 3),
                RegWrite::NvicVector(IrqNumber::RTC0),
                RegWrite::NvicEnable(IrqNumber::RTC0),
            ]
        );
        assert!(sim.nvic_enabled(IrqNumber::RTC0));
    }

    #[test]
    fn priority_out_of_range_touches_nothing() {
        let sim = Sim::new();
        // the simulated controller has 3 priority bits
        let err = install_tick_handler(&mut sim.nvic(), IrqNumber::RTC0, 8, count_call).unwrap_err();
        assert_eq!(err, ConfigError::PriorityOutOfRange { priority: 8, lowest: 7 });
        assert!(sim.writes().is_empty());
    }
}
