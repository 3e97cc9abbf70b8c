#[cfg(feature = "defmt")]
use defmt::Format;

use crate::error::{ConfigError, Device};
use crate::prescaler::Prescaler;
use crate::regs::LfClockSource;

/// What the board asks of the tick: a rate, the interrupt priority to run it at, and the
/// low-frequency source to derive it from.
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockRequest {
    pub ticks_per_sec: u32,
    pub priority: u8,
    pub source: LfClockSource,
}

impl ClockRequest {
    pub const fn new(ticks_per_sec: u32, priority: u8) -> Self {
        Self {
            ticks_per_sec,
            priority,
            source: LfClockSource::Xtal,
        }
    }

    pub const fn with_source(self, source: LfClockSource) -> Self {
        Self { source, ..self }
    }

    /// Check the request against the hardware limits and derive the prescaler.
    pub fn validate(
        &self,
        base_freq: u32,
        prescaler_bits: u32,
        prio_bits: u8,
    ) -> Result<Prescaler, ConfigError> {
        let prescaler = Prescaler::for_rate(base_freq, self.ticks_per_sec)?.check_width(prescaler_bits)?;
        check_priority(self.priority, prio_bits).map_err(|lowest| ConfigError::PriorityOutOfRange {
            priority: self.priority,
            lowest,
        })?;
        Ok(prescaler)
    }
}

fn check_priority(priority: u8, prio_bits: u8) -> Result<(), u8> {
    let lowest = crate::lowest_priority(prio_bits);
    if priority > lowest {
        Err(lowest)
    } else {
        Ok(())
    }
}

/// Number of GPIO pins on port 0.
pub const P0_PINS: u8 = 32;

#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    pub pin_tx: u8,
    pub pin_rx: u8,
    pub pin_rts: Option<u8>,
    pub pin_cts: Option<u8>,
}

#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiFrequency {
    K125,
    K250,
    K500,
    M1,
    M2,
    M4,
    M8,
}

#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiMode {
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}

/// SPI master. Chip select is left to the caller as a plain GPIO.
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiMasterConfig {
    pub pin_sck: u8,
    pub pin_mosi: u8,
    pub pin_miso: u8,
    pub frequency: SpiFrequency,
    pub mode: SpiMode,
    pub irq_priority: u8,
}

#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiSlaveConfig {
    pub pin_sck: u8,
    pub pin_mosi: u8,
    pub pin_miso: u8,
    pub pin_csn: u8,
    pub mode: SpiMode,
    pub irq_priority: u8,
}

/// Optional devices the board brings up next to the tick. None of them is needed by the tick.
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BoardConfig {
    pub uart0: Option<UartConfig>,
    pub spi0_master: Option<SpiMasterConfig>,
    pub spi1_slave: Option<SpiSlaveConfig>,
}

impl BoardConfig {
    /// Validate each requested device on its own. Devices may share pins with each other;
    /// only one of them can be enabled on a real board in that case, which is the caller's call.
    pub fn validate(&self, prio_bits: u8) -> Result<(), ConfigError> {
        if let Some(uart) = &self.uart0 {
            let mut pins = PinSet::new(Device::Uart0);
            pins.claim(uart.pin_tx)?;
            pins.claim(uart.pin_rx)?;
            if let Some(rts) = uart.pin_rts {
                pins.claim(rts)?;
            }
            if let Some(cts) = uart.pin_cts {
                pins.claim(cts)?;
            }
        }

        if let Some(spi) = &self.spi0_master {
            let mut pins = PinSet::new(Device::Spi0Master);
            pins.claim(spi.pin_sck)?;
            pins.claim(spi.pin_mosi)?;
            pins.claim(spi.pin_miso)?;
            device_priority(Device::Spi0Master, spi.irq_priority, prio_bits)?;
        }

        if let Some(spi) = &self.spi1_slave {
            let mut pins = PinSet::new(Device::Spi1Slave);
            pins.claim(spi.pin_sck)?;
            pins.claim(spi.pin_mosi)?;
            pins.claim(spi.pin_miso)?;
            pins.claim(spi.pin_csn)?;
            device_priority(Device::Spi1Slave, spi.irq_priority, prio_bits)?;
        }

        Ok(())
    }

    /// Devices that are requested, in bring-up order.
    pub fn enabled(&self) -> impl Iterator<Item = Device> + '_ {
        [
            self.uart0.map(|_| Device::Uart0),
            self.spi0_master.map(|_| Device::Spi0Master),
            self.spi1_slave.map(|_| Device::Spi1Slave),
        ]
        .into_iter()
        .flatten()
    }
}

fn device_priority(device: Device, priority: u8, prio_bits: u8) -> Result<(), ConfigError> {
    check_priority(priority, prio_bits).map_err(|lowest| ConfigError::DevicePriority {
        device,
        priority,
        lowest,
    })
}

struct PinSet {
    device: Device,
    used: u32,
}

impl PinSet {
    fn new(device: Device) -> Self {
        Self { device, used: 0 }
    }

    fn claim(&mut self, pin: u8) -> Result<(), ConfigError> {
        if pin >= P0_PINS {
            return Err(ConfigError::InvalidPin { device: self.device, pin });
        }
        let bit = 1u32 << pin;
        if self.used & bit != 0 {
            return Err(ConfigError::PinConflict { device: self.device, pin });
        }
        self.used |= bit;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LFCLK_FREQ;

    const SPI0: SpiMasterConfig = SpiMasterConfig {
        pin_sck: 29,
        pin_mosi: 25,
        pin_miso: 28,
        frequency: SpiFrequency::M4,
        mode: SpiMode::Mode0,
        irq_priority: 3,
    };

    const SPI1: SpiSlaveConfig = SpiSlaveConfig {
        pin_sck: 29,
        pin_mosi: 25,
        pin_miso: 28,
        pin_csn: 24,
        mode: SpiMode::Mode0,
        irq_priority: 3,
    };

    #[test]
    fn request_validation() {
        let request = ClockRequest::new(128, 3);
        assert_eq!(request.validate(LFCLK_FREQ, 12, 2), Ok(Prescaler::from_raw(255)));

        assert_eq!(
            ClockRequest::new(128, 4).validate(LFCLK_FREQ, 12, 2),
            Err(ConfigError::PriorityOutOfRange { priority: 4, lowest: 3 })
        );
        assert_eq!(
            ClockRequest::new(0, 0).validate(LFCLK_FREQ, 12, 3),
            Err(ConfigError::ZeroTickRate)
        );
        // 1 Hz needs prescaler 32767, which the 12-bit register cannot hold
        assert_eq!(
            ClockRequest::new(1, 0).validate(LFCLK_FREQ, 12, 3),
            Err(ConfigError::PrescalerOverflow { value: 32767, bits: 12 })
        );
        assert_eq!(ClockRequest::new(8, 0).validate(LFCLK_FREQ, 12, 3), Ok(Prescaler::from_raw(4095)));
    }

    #[test]
    fn default_source_is_crystal() {
        assert_eq!(ClockRequest::new(100, 1).source, LfClockSource::Xtal);
        assert_eq!(
            ClockRequest::new(100, 1).with_source(LfClockSource::Rc).source,
            LfClockSource::Rc
        );
    }

    #[test]
    fn devices_validated_independently() {
        // Both SPI instances on the same pins: fine per device
        let board = BoardConfig {
            uart0: Some(UartConfig {
                pin_tx: 6,
                pin_rx: 8,
                pin_rts: None,
                pin_cts: None,
            }),
            spi0_master: Some(SPI0),
            spi1_slave: Some(SPI1),
        };
        assert_eq!(board.validate(3), Ok(()));
        assert_eq!(
            board.enabled().collect::<Vec<_>>(),
            vec![Device::Uart0, Device::Spi0Master, Device::Spi1Slave]
        );
    }

    #[test]
    fn bad_pins_name_the_device() {
        let board = BoardConfig {
            uart0: Some(UartConfig {
                pin_tx: 6,
                pin_rx: 8,
                pin_rts: Some(8),
                pin_cts: None,
            }),
            ..Default::default()
        };
        assert_eq!(
            board.validate(3),
            Err(ConfigError::PinConflict { device: Device::Uart0, pin: 8 })
        );

        let board = BoardConfig {
            spi1_slave: Some(SpiSlaveConfig { pin_csn: 32, ..SPI1 }),
            ..Default::default()
        };
        assert_eq!(
            board.validate(3),
            Err(ConfigError::InvalidPin { device: Device::Spi1Slave, pin: 32 })
        );
    }

    #[test]
    fn device_priority_range() {
        let board = BoardConfig {
            spi0_master: Some(SpiMasterConfig { irq_priority: 7, ..SPI0 }),
            ..Default::default()
        };
        assert_eq!(board.validate(3), Ok(()));
        assert_eq!(
            board.validate(2),
            Err(ConfigError::DevicePriority {
                device: Device::Spi0Master,
                priority: 7,
                lowest: 3
            })
        );
    }

    #[test]
    fn empty_board_is_valid() {
        assert_eq!(BoardConfig::default().validate(2), Ok(()));
        assert_eq!(BoardConfig::default().enabled().count(), 0);
    }
}
