#![no_main]
#![no_std]

mod config;
mod setup;

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::asm;
use cortex_m_rt::entry;
use thiserror::Error;

use defmt_rtt as _;
use panic_probe as _;
use defmt::{debug, info, unwrap, warn, Format};

use nrf52810_hal as hal;
use hal::pac::{self, interrupt};

use rtc_tick_common::{
    bring_up, BringUpError, ConfigError, Forever, IrqNumber, TickConfig, TickDispatcher,
    TickHardware, VectorTable,
};

use crate::config::{BOARD, NVIC_PRIO_BITS, OS_TICKS_PER_SEC, TICK};
use crate::setup::{Clock, GlobalMask, Nvic, Rtc0, VECTOR_SLOTS};

static VECTORS: VectorTable<VECTOR_SLOTS> = VectorTable::new();
static TICKS: TickDispatcher = TickDispatcher::new();

/// OS time in ticks. Only the tick interrupt writes it.
static OS_TIME: AtomicU32 = AtomicU32::new(0);

#[derive(Error, Debug, Format)]
enum StartupError {
    #[error("board configuration rejected: {0}")]
    Board(#[from] ConfigError),
    #[error("tick bring-up failed: {0}")]
    Tick(#[from] BringUpError),
}

fn os_time_tick() {
    OS_TIME.store(OS_TIME.load(Ordering::Relaxed).wrapping_add(1), Ordering::Relaxed);
}

fn rtc0_tick() {
    let mut rtc = unsafe { Rtc0::steal() };
    TICKS.on_interrupt(&mut rtc);
}

#[interrupt]
fn RTC0() {
    if !VECTORS.invoke(IrqNumber::RTC0) {
        warn!("RTC0 taken with no handler installed");
    }
}

fn start(clock: pac::CLOCK, rtc: pac::RTC0, nvic: &mut pac::NVIC) -> Result<TickConfig, StartupError> {
    BOARD.validate(NVIC_PRIO_BITS)?;
    for device in BOARD.enabled() {
        info!("Board device: {}", device);
    }

    TICKS.set_heartbeat(os_time_tick);

    let mut clock = Clock::new(clock);
    let mut rtc = Rtc0::new(rtc);
    let mut nvic = Nvic::new(nvic, &VECTORS);
    let mut mask = GlobalMask;
    let hw = TickHardware {
        clock: &mut clock,
        rtc: &mut rtc,
        nvic: &mut nvic,
        mask: &mut mask,
    };

    Ok(bring_up(&TICK, hw, Forever, rtc0_tick)?)
}

#[entry]
fn main() -> ! {
    debug!("Boot, {} ticks/s", OS_TICKS_PER_SEC);

    let p = unwrap!(pac::Peripherals::take());
    let mut core = unwrap!(pac::CorePeripherals::take());

    let tick = match start(p.CLOCK, p.RTC0, &mut core.NVIC) {
        Ok(tick) => tick,
        Err(e) => defmt::panic!("{}", e),
    };
    info!("Tick running: {}", tick);

    let mut last_second = 0;
    loop {
        asm::wfi();
        let second = OS_TIME.load(Ordering::Relaxed) / OS_TICKS_PER_SEC;
        if second != last_second {
            last_second = second;
            debug!("Uptime {}s, {} spurious RTC0 entries", second, TICKS.spurious());
        }
    }
}
