//! OneWire line trait
//!
//! Only the three timing-critical primitives live at the platform boundary.
//! Byte I/O, ROM commands and the search algorithm are built on top of them
//! by the transport.

use crate::platform::Result;

/// OneWire transport configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneWireConfig {
    /// Data pin
    pub pin: u8,
    /// Devices powered from the data line
    pub parasite_power: bool,
}

impl Default for OneWireConfig {
    fn default() -> Self {
        Self {
            pin: 4,
            parasite_power: false,
        }
    }
}

/// OneWire line trait
pub trait OneWireLine {
    /// Claim the pin and release the line high
    fn configure(&mut self, _config: &OneWireConfig) -> Result<()> {
        Ok(())
    }

    /// Stop driving the line
    fn release(&mut self) {}

    /// Issue a reset pulse and return whether any device answered with a
    /// presence pulse
    fn reset(&mut self) -> Result<bool>;

    /// Write one time slot
    fn write_bit(&mut self, bit: bool) -> Result<()>;

    /// Read one time slot
    fn read_bit(&mut self) -> Result<bool>;
}
