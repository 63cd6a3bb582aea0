//! Mock GPIO implementation for testing

use crate::platform::{
    error::{GpioError, PlatformError},
    traits::{GpioPort, PinMode},
    Result,
};
use std::vec::Vec;

const MAX_MOCK_PINS: usize = 64;

/// Mock GPIO bank
///
/// Tracks mode and level per pin, lets tests drive input levels and records
/// every output write for verification.
#[derive(Debug)]
pub struct MockGpio {
    pin_count: u8,
    modes: [Option<PinMode>; MAX_MOCK_PINS],
    levels: [bool; MAX_MOCK_PINS],
    external: [Option<bool>; MAX_MOCK_PINS],
    writes: Vec<(u8, bool)>,
}

impl MockGpio {
    /// Create a bank with pins `0..pin_count` (at most 64)
    pub fn new(pin_count: u8) -> Self {
        Self {
            pin_count: pin_count.min(MAX_MOCK_PINS as u8),
            modes: [None; MAX_MOCK_PINS],
            levels: [false; MAX_MOCK_PINS],
            external: [None; MAX_MOCK_PINS],
            writes: Vec::new(),
        }
    }

    /// Drive an input pin from outside (`None` lets it float to its pull)
    pub fn set_input_level(&mut self, pin: u8, level: Option<bool>) {
        if let Some(slot) = self.external.get_mut(pin as usize) {
            *slot = level;
        }
    }

    /// Last level written to an output pin
    pub fn output_level(&self, pin: u8) -> bool {
        self.levels.get(pin as usize).copied().unwrap_or(false)
    }

    /// Hardware mode of `pin`
    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.modes.get(pin as usize).copied().flatten()
    }

    /// Every `(pin, level)` written, in order
    pub fn writes(&self) -> &[(u8, bool)] {
        &self.writes
    }

    /// Clear the write log
    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }
}

impl Default for MockGpio {
    fn default() -> Self {
        Self::new(30)
    }
}

impl GpioPort for MockGpio {
    fn is_valid_pin(&self, pin: u8) -> bool {
        pin < self.pin_count
    }

    fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<()> {
        if !self.is_valid_pin(pin) {
            return Err(PlatformError::Gpio(GpioError::InvalidPin));
        }
        self.modes[pin as usize] = Some(mode);
        Ok(())
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<()> {
        if !self.is_valid_pin(pin) {
            return Err(PlatformError::Gpio(GpioError::InvalidPin));
        }
        match self.modes[pin as usize] {
            Some(PinMode::Output) => {
                self.levels[pin as usize] = high;
                self.writes.push((pin, high));
                Ok(())
            }
            _ => Err(PlatformError::Gpio(GpioError::InvalidMode)),
        }
    }

    fn read(&mut self, pin: u8) -> Result<bool> {
        if !self.is_valid_pin(pin) {
            return Err(PlatformError::Gpio(GpioError::InvalidPin));
        }
        let index = pin as usize;
        Ok(match self.modes[index] {
            Some(PinMode::Output) => self.levels[index],
            Some(mode) => self.external[index].unwrap_or(mode == PinMode::InputPullUp),
            None => self.external[index].unwrap_or(false),
        })
    }
}
