//! SPI bus trait
//!
//! This module defines the SPI bus communication interface that platform implementations must provide.

use crate::platform::Result;

/// Chip-select pin value meaning "CS is handled by the driver"
pub const CS_UNMANAGED: u8 = 255;

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    /// MOSI pin
    pub mosi_pin: u8,
    /// MISO pin
    pub miso_pin: u8,
    /// SCLK pin
    pub sclk_pin: u8,
    /// Chip-select pin managed by the transport (`CS_UNMANAGED` to disable)
    pub cs_pin: u8,
    /// Bus frequency in Hz
    pub frequency: u32,
    /// SPI mode (CPOL and CPHA)
    pub mode: SpiMode,
    /// Bit order
    pub bit_order: SpiBitOrder,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            mosi_pin: 19,
            miso_pin: 16,
            sclk_pin: 18,
            cs_pin: CS_UNMANAGED,
            frequency: 1_000_000, // 1 MHz
            mode: SpiMode::Mode0,
            bit_order: SpiBitOrder::MsbFirst,
        }
    }
}

/// SPI mode (Clock Polarity and Phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    Mode0,
    /// CPOL=0, CPHA=1
    Mode1,
    /// CPOL=1, CPHA=0
    Mode2,
    /// CPOL=1, CPHA=1
    Mode3,
}

impl SpiMode {
    /// Mode number 0-3
    pub const fn number(self) -> u8 {
        match self {
            SpiMode::Mode0 => 0,
            SpiMode::Mode1 => 1,
            SpiMode::Mode2 => 2,
            SpiMode::Mode3 => 3,
        }
    }

    /// Mode from its number
    pub const fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(SpiMode::Mode0),
            1 => Some(SpiMode::Mode1),
            2 => Some(SpiMode::Mode2),
            3 => Some(SpiMode::Mode3),
            _ => None,
        }
    }
}

/// SPI bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiBitOrder {
    /// Most significant bit first
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// SPI bus trait
///
/// Platform implementations must provide this interface for SPI bus communication.
///
/// # Safety Invariants
///
/// - `configure` must succeed before any transfer
/// - Only one owner per SPI bus instance (the transport)
/// - `begin`/`end` bracket every transaction; they are never nested
pub trait SpiBus {
    /// Apply pins, clock, mode and bit order
    fn configure(&mut self, config: &SpiConfig) -> Result<()>;

    /// Return the peripheral to its reset state
    fn release(&mut self);

    /// Bus-level hook called when a transaction starts
    fn begin(&mut self) {}

    /// Bus-level hook called when a transaction ends
    fn end(&mut self) {}

    /// Drive the chip-select line `pin` (`active` = asserted, i.e. LOW)
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Gpio(GpioError::InvalidPin)` if the bus does
    /// not own `pin`.
    fn set_cs(&mut self, pin: u8, active: bool) -> Result<()>;

    /// Full-duplex transfer, replacing `data` with the received bytes
    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<()>;

    /// Write data (transmit only), discarding received bytes
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read data (receive only) while clocking out 0xFF
    fn read(&mut self, buffer: &mut [u8]) -> Result<()>;
}
