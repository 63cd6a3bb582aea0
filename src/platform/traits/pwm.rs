//! PWM unit trait

use crate::platform::Result;

/// PWM transport configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmConfig {
    /// Duty resolution in bits
    pub resolution_bits: u8,
    /// Frequency used when `attach` is given 0 Hz
    pub default_frequency_hz: u32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            resolution_bits: 8,
            default_frequency_hz: 1_000,
        }
    }
}

/// PWM unit trait
///
/// A PWM unit owns `channel_count` independent channels, each of which can
/// be routed to one output pin.
pub trait PwmUnit {
    /// Number of channels (valid channels are `0..channel_count`)
    fn channel_count(&self) -> u8;

    /// Check whether `pin` can carry a PWM output
    fn is_valid_pin(&self, pin: u8) -> bool;

    /// Maximum supported duty resolution in bits
    fn max_resolution_bits(&self) -> u8;

    /// Route `channel` to `pin` and start it at `frequency_hz` with `bits` of
    /// duty resolution
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Pwm` if the frequency cannot be generated.
    fn configure(&mut self, channel: u8, pin: u8, frequency_hz: u32, bits: u8) -> Result<()>;

    /// Set the raw duty value of `channel`
    fn set_duty(&mut self, channel: u8, duty: u32) -> Result<()>;

    /// Stop `channel` and disconnect it from its pin
    fn release(&mut self, channel: u8) -> Result<()>;
}
