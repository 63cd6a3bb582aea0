//! I2C bus trait
//!
//! This module defines the I2C bus communication interface that platform implementations must provide.

use crate::platform::Result;

/// Standard-mode clock (100 kHz)
pub const I2C_STANDARD_MODE_HZ: u32 = 100_000;
/// Fast-mode clock (400 kHz)
pub const I2C_FAST_MODE_HZ: u32 = 400_000;
/// Fast-mode plus clock (1 MHz)
pub const I2C_FAST_MODE_PLUS_HZ: u32 = 1_000_000;

/// Bus role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cMode {
    /// Controller driving the clock
    Master,
    /// Target answering at `slave_address`
    Slave,
}

/// I2C configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cConfig {
    /// SDA pin
    pub sda_pin: u8,
    /// SCL pin
    pub scl_pin: u8,
    /// Bus frequency in Hz (any value is accepted, see the `I2C_*_HZ` names)
    pub speed_hz: u32,
    /// Bus role
    pub mode: I2cMode,
    /// Own address in slave mode
    pub slave_address: u8,
    /// Timeout in microseconds
    pub timeout_us: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            sda_pin: 21,
            scl_pin: 22,
            speed_hz: I2C_STANDARD_MODE_HZ,
            mode: I2cMode::Master,
            slave_address: 0,
            timeout_us: 1_000_000, // 1 second
        }
    }
}

/// I2C bus trait
///
/// Platform implementations must provide this interface for I2C bus communication.
///
/// # Safety Invariants
///
/// - `configure` must succeed before any transfer
/// - Only one owner per I2C bus instance (the transport)
/// - Address must be 7-bit
pub trait I2cBus {
    /// Apply pins, clock and role
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::InvalidConfig` if the pins or clock cannot be used.
    fn configure(&mut self, config: &I2cConfig) -> Result<()>;

    /// Return the peripheral to its reset state
    fn release(&mut self);

    /// Write data to I2C device
    ///
    /// Performs a complete I2C write transaction:
    /// START - ADDR(W) - DATA - STOP
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::I2c` if:
    /// - Device does not acknowledge (NACK)
    /// - Bus error occurs
    /// - Timeout expires
    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()>;

    /// Read data from I2C device
    ///
    /// Performs a complete I2C read transaction:
    /// START - ADDR(R) - DATA - STOP
    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()>;

    /// Write then read from I2C device
    ///
    /// Performs a combined write-read transaction with a repeated START when
    /// `supports_repeated_start` is true:
    /// START - ADDR(W) - WRITE_DATA - REPEATED_START - ADDR(R) - READ_DATA - STOP
    ///
    /// Implementations without repeated start issue a STOP between phases;
    /// the transport keeps both phases inside one critical section.
    fn write_read(&mut self, addr: u8, write_data: &[u8], read_buffer: &mut [u8]) -> Result<()>;

    /// Address-only probe: returns `true` if a device acknowledges `addr`
    fn probe(&mut self, addr: u8) -> bool {
        self.write(addr, &[]).is_ok()
    }

    /// Whether `write_read` uses a repeated START
    fn supports_repeated_start(&self) -> bool {
        true
    }
}
