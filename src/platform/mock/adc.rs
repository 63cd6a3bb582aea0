//! Mock ADC implementation for testing

use crate::platform::{
    error::{AdcError, PlatformError},
    traits::AdcUnit,
    Result,
};

const MAX_MOCK_CHANNELS: usize = 16;

/// Mock ADC unit
///
/// Each channel holds a simulated input voltage; conversions quantise it at
/// the requested resolution.
#[derive(Debug)]
pub struct MockAdc {
    channel_count: u8,
    resolution_range: (u8, u8),
    vref_mv: u16,
    input_mv: [u16; MAX_MOCK_CHANNELS],
    conversions: u32,
}

impl MockAdc {
    /// Create a unit with `channel_count` channels, 9..=12 bit resolution and
    /// a 3.3 V reference
    pub fn new(channel_count: u8) -> Self {
        Self {
            channel_count: channel_count.min(MAX_MOCK_CHANNELS as u8),
            resolution_range: (9, 12),
            vref_mv: 3300,
            input_mv: [0; MAX_MOCK_CHANNELS],
            conversions: 0,
        }
    }

    /// Override the supported resolution range
    pub fn with_resolution_range(mut self, min: u8, max: u8) -> Self {
        self.resolution_range = (min, max);
        self
    }

    /// Set the voltage present on `channel`
    pub fn set_input_mv(&mut self, channel: u8, mv: u16) {
        if let Some(slot) = self.input_mv.get_mut(channel as usize) {
            *slot = mv;
        }
    }

    /// Number of conversions performed
    pub fn conversions(&self) -> u32 {
        self.conversions
    }
}

impl AdcUnit for MockAdc {
    fn channel_count(&self) -> u8 {
        self.channel_count
    }

    fn resolution_range(&self) -> (u8, u8) {
        self.resolution_range
    }

    fn vref_mv(&self) -> u16 {
        self.vref_mv
    }

    fn read_raw(&mut self, channel: u8, bits: u8) -> Result<u16> {
        if channel >= self.channel_count {
            return Err(PlatformError::Adc(AdcError::InvalidChannel));
        }
        let (min, max) = self.resolution_range;
        if bits < min || bits > max {
            return Err(PlatformError::Adc(AdcError::InvalidResolution));
        }

        self.conversions += 1;
        let full_scale = (1u32 << bits) - 1;
        let mv = self.input_mv[channel as usize].min(self.vref_mv) as u32;
        Ok((mv * full_scale / self.vref_mv as u32) as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_adc_quantises_input() {
        let mut adc = MockAdc::new(4);
        adc.set_input_mv(1, 3300);
        assert_eq!(adc.read_raw(1, 12).unwrap(), 4095);
        assert_eq!(adc.read_raw(1, 10).unwrap(), 1023);

        adc.set_input_mv(2, 1650);
        assert_eq!(adc.read_raw(2, 12).unwrap(), 2047);
    }

    #[test]
    fn test_mock_adc_rejects_channel_and_resolution() {
        let mut adc = MockAdc::new(4);
        assert_eq!(
            adc.read_raw(4, 12),
            Err(PlatformError::Adc(AdcError::InvalidChannel))
        );
        assert_eq!(
            adc.read_raw(0, 13),
            Err(PlatformError::Adc(AdcError::InvalidResolution))
        );
    }
}
