//! Mock PWM implementation for testing

use crate::platform::{
    error::{PlatformError, PwmError},
    traits::PwmUnit,
    Result,
};
use std::vec::Vec;

/// State of one mock PWM channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockPwmChannel {
    /// Routed pin
    pub pin: u8,
    /// Output frequency in Hz
    pub frequency_hz: u32,
    /// Duty resolution in bits
    pub bits: u8,
    /// Raw duty value
    pub duty: u32,
    /// Channel running
    pub active: bool,
}

/// Mock PWM unit
///
/// Tracks per-channel routing, frequency and duty for test verification.
#[derive(Debug)]
pub struct MockPwm {
    channels: Vec<MockPwmChannel>,
    max_bits: u8,
}

impl MockPwm {
    /// Create a unit with `channel_count` channels and 16-bit resolution
    pub fn new(channel_count: u8) -> Self {
        Self {
            channels: vec![MockPwmChannel::default(); channel_count as usize],
            max_bits: 16,
        }
    }

    /// State of `channel`
    pub fn channel(&self, channel: u8) -> Option<&MockPwmChannel> {
        self.channels.get(channel as usize)
    }
}

impl PwmUnit for MockPwm {
    fn channel_count(&self) -> u8 {
        self.channels.len() as u8
    }

    fn is_valid_pin(&self, pin: u8) -> bool {
        pin < 30
    }

    fn max_resolution_bits(&self) -> u8 {
        self.max_bits
    }

    fn configure(&mut self, channel: u8, pin: u8, frequency_hz: u32, bits: u8) -> Result<()> {
        if frequency_hz == 0 {
            return Err(PlatformError::Pwm(PwmError::InvalidFrequency));
        }
        let slot = self
            .channels
            .get_mut(channel as usize)
            .ok_or(PlatformError::Pwm(PwmError::ChannelUnavailable))?;
        *slot = MockPwmChannel {
            pin,
            frequency_hz,
            bits,
            duty: 0,
            active: true,
        };
        Ok(())
    }

    fn set_duty(&mut self, channel: u8, duty: u32) -> Result<()> {
        let slot = self
            .channels
            .get_mut(channel as usize)
            .filter(|c| c.active)
            .ok_or(PlatformError::Pwm(PwmError::ChannelUnavailable))?;
        if duty > (1u32 << slot.bits) - 1 {
            return Err(PlatformError::Pwm(PwmError::InvalidDutyCycle));
        }
        slot.duty = duty;
        Ok(())
    }

    fn release(&mut self, channel: u8) -> Result<()> {
        let slot = self
            .channels
            .get_mut(channel as usize)
            .ok_or(PlatformError::Pwm(PwmError::ChannelUnavailable))?;
        *slot = MockPwmChannel::default();
        Ok(())
    }
}
