use rtc_tick_common::config::{SpiFrequency, SpiMode};
use rtc_tick_common::{
    lowest_priority, rate_fits, BoardConfig, ClockRequest, LfClockSource, RtcRegisters,
    SpiMasterConfig, SpiSlaveConfig, LFCLK_FREQ,
};

use crate::setup::Rtc0;

/// Statically parse the decimal string in environment variable "OS_TICKS_PER_SEC".
/// Compilation will fail if it is empty, not a decimal number or does not fit in a u32.
const fn get_ticks_per_sec() -> u32 {
    let string: &'static str = env!("OS_TICKS_PER_SEC");
    let mut bytes = string.as_bytes();
    assert!(!bytes.is_empty());
    let mut res: u32 = 0;
    while let [byte, rest @ ..] = bytes {
        bytes = rest;
        let digit = match byte {
            b'0'..=b'9' => (*byte - b'0') as u32,
            _ => panic!("Environment variable OS_TICKS_PER_SEC is not a decimal number"),
        };
        res = match res.checked_mul(10) {
            Some(r) => match r.checked_add(digit) {
                Some(r) => r,
                None => panic!("OS_TICKS_PER_SEC does not fit in a u32"),
            },
            None => panic!("OS_TICKS_PER_SEC does not fit in a u32"),
        };
    }
    res
}

pub const OS_TICKS_PER_SEC: u32 = get_ticks_per_sec();

const _: () = assert!(
    rate_fits(LFCLK_FREQ, OS_TICKS_PER_SEC, <Rtc0 as RtcRegisters>::PRESCALER_BITS),
    "OS_TICKS_PER_SEC must be within 8..=32768"
);

/// nRF52 implements the top 3 bits of each priority byte.
pub const NVIC_PRIO_BITS: u8 = 3;

/// The tick runs at the lowest priority so it never preempts anything time-critical.
pub const TICK_PRIORITY: u8 = lowest_priority(NVIC_PRIO_BITS);

pub const TICK: ClockRequest =
    ClockRequest::new(OS_TICKS_PER_SEC, TICK_PRIORITY).with_source(LfClockSource::Xtal);

/// Serial peripherals wired on this board. SPI0 and SPI1 share the same pins, so only one of them
/// is fitted at a time.
pub const BOARD: BoardConfig = BoardConfig {
    uart0: None,
    spi0_master: Some(SpiMasterConfig {
        pin_sck: 29,
        pin_mosi: 25,
        pin_miso: 28,
        frequency: SpiFrequency::M4,
        mode: SpiMode::Mode0,
        irq_priority: 3,
    }),
    spi1_slave: Some(SpiSlaveConfig {
        pin_sck: 29,
        pin_mosi: 25,
        pin_miso: 28,
        pin_csn: 24,
        mode: SpiMode::Mode0,
        irq_priority: 3,
    }),
};
