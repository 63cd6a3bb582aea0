//! GPIO port trait
//!
//! This module defines the pin-addressed GPIO interface that platform
//! implementations must provide.

use crate::platform::Result;

/// GPIO pin mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinMode {
    /// Input mode (high impedance)
    Input,
    /// Output mode (push-pull)
    Output,
    /// Input mode with pull-up resistor
    InputPullUp,
    /// Input mode with pull-down resistor
    InputPullDown,
}

impl PinMode {
    /// Returns `true` for the output mode
    pub const fn is_output(self) -> bool {
        matches!(self, PinMode::Output)
    }

    /// Short name used in diagnostics
    pub const fn as_str(self) -> &'static str {
        match self {
            PinMode::Input => "input",
            PinMode::Output => "output",
            PinMode::InputPullUp => "input_pullup",
            PinMode::InputPullDown => "input_pulldown",
        }
    }
}

/// GPIO transport configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpioConfig {
    /// Level driven when a pin is switched to output mode
    pub initial_level: bool,
}

/// GPIO port trait
///
/// One implementation covers every pin of a GPIO bank. Pin numbers are
/// platform specific; `is_valid_pin` enumerates the usable ones.
///
/// # Safety Invariants
///
/// - Pin number must be valid for the platform before any other call
/// - Only one owner per pin (arbitrated by the resource manager)
pub trait GpioPort {
    /// Check whether `pin` exists on this platform
    fn is_valid_pin(&self, pin: u8) -> bool;

    /// Set the electrical mode of `pin`
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Gpio` if the mode cannot be applied.
    fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<()>;

    /// Drive `pin` high (`true`) or low (`false`)
    fn write(&mut self, pin: u8, high: bool) -> Result<()>;

    /// Sample the level of `pin`
    fn read(&mut self, pin: u8) -> Result<bool>;
}
