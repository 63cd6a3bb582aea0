//! ADC unit trait

use crate::platform::Result;

/// ADC transport configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcConfig {
    /// Conversion resolution in bits
    pub resolution_bits: u8,
    /// Reference voltage in millivolts (`None` uses the unit's own)
    pub vref_mv: Option<u16>,
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            resolution_bits: 12,
            vref_mv: None,
        }
    }
}

/// ADC unit trait
///
/// Platform implementations must provide this interface for single-shot
/// conversions. `read_raw` must return a value in `[0, 2^bits - 1]`.
pub trait AdcUnit {
    /// Number of input channels (valid channels are `0..channel_count`)
    fn channel_count(&self) -> u8;

    /// Supported resolution range in bits, inclusive
    fn resolution_range(&self) -> (u8, u8);

    /// Reference voltage in millivolts
    fn vref_mv(&self) -> u16;

    /// Perform one conversion on `channel` at `bits` resolution
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Adc` if the conversion fails.
    fn read_raw(&mut self, channel: u8, bits: u8) -> Result<u16>;
}
