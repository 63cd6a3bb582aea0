//! GPIO transport
//!
//! Digital pin surface. A pin must be given a mode with [`GpioTransport::pin_mode`]
//! before it can be read or written; platform-invalid pins are refused before
//! any hardware access.

use crate::core::traits::TimeSource;
use crate::platform::traits::{GpioConfig, GpioPort, PinMode};

use super::status::TransportCore;
use super::{Result, Transport, TransportError, TransportType};

const PIN_SLOTS: usize = 256;

/// GPIO transport over a [`GpioPort`]
pub struct GpioTransport<P, C> {
    core: TransportCore,
    port: P,
    clock: C,
    config: GpioConfig,
    modes: [Option<PinMode>; PIN_SLOTS],
}

impl<P: GpioPort, C: TimeSource> GpioTransport<P, C> {
    /// Create a transport called `name`
    pub fn new(name: &str, port: P, clock: C) -> Self {
        let mut transport = Self {
            core: TransportCore::new(name, TransportType::Gpio),
            port,
            clock,
            config: GpioConfig::default(),
            modes: [None; PIN_SLOTS],
        };
        transport.mirror_config();
        transport
    }

    /// Replace the configuration (only while uninitialized)
    pub fn configure(&mut self, config: GpioConfig) -> Result<()> {
        self.core.ensure_configurable()?;
        self.config = config;
        self.mirror_config();
        Ok(())
    }

    /// `configure` followed by `init`
    pub fn init_with(&mut self, config: GpioConfig) -> Result<()> {
        self.configure(config)?;
        self.init()
    }

    /// Typed configuration
    pub fn gpio_config(&self) -> &GpioConfig {
        &self.config
    }

    /// Underlying port
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutable underlying port
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    fn mirror_config(&mut self) {
        let level = if self.config.initial_level { "high" } else { "low" };
        let map = self.core.config_mut();
        map.clear();
        let _ = map.set("initial_level", format_args!("{}", level));
    }

    fn check_pin(&mut self, pin: u8, op: &str) -> Result<()> {
        let now = self.clock.now_us();
        self.core.check_ready(now, op)?;
        if !self.port.is_valid_pin(pin) {
            return self.core.refuse(TransportError::InvalidPin, now, op);
        }
        Ok(())
    }

    /// Set the mode of `pin`, marking it configured
    pub fn pin_mode(&mut self, pin: u8, mode: PinMode) -> Result<()> {
        self.check_pin(pin, "pin_mode")?;
        let initial_level = self.config.initial_level;
        let result = self
            .port
            .set_mode(pin, mode)
            .and_then(|()| {
                if mode.is_output() {
                    self.port.write(pin, initial_level)
                } else {
                    Ok(())
                }
            })
            .map_err(TransportError::from);
        let now = self.clock.now_us();
        self.core.complete(result, now, "pin_mode")?;
        self.modes[pin as usize] = Some(mode);
        Ok(())
    }

    /// Mode previously set on `pin`
    pub fn pin_mode_of(&self, pin: u8) -> Option<PinMode> {
        self.modes[pin as usize]
    }

    /// Iterate configured pins with their modes
    pub fn configured_pins(&self) -> impl Iterator<Item = (u8, PinMode)> + '_ {
        self.modes
            .iter()
            .enumerate()
            .filter_map(|(pin, mode)| mode.map(|m| (pin as u8, m)))
    }

    /// Drive an output pin
    ///
    /// # Errors
    ///
    /// - `InvalidPin` if the pin is invalid or was never configured
    /// - `InvalidArgument` if the pin is configured as an input
    pub fn digital_write(&mut self, pin: u8, high: bool) -> Result<()> {
        self.check_pin(pin, "digital_write")?;
        let now = self.clock.now_us();
        match self.modes[pin as usize] {
            None => self.core.refuse(TransportError::InvalidPin, now, "digital_write"),
            Some(mode) if !mode.is_output() => {
                self.core
                    .refuse(TransportError::InvalidArgument, now, "digital_write")
            }
            Some(_) => {
                let result = self.port.write(pin, high).map_err(TransportError::from);
                self.core.complete(result, now, "digital_write")
            }
        }
    }

    /// Sample a configured pin
    pub fn digital_read(&mut self, pin: u8) -> Result<bool> {
        self.check_pin(pin, "digital_read")?;
        let now = self.clock.now_us();
        if self.modes[pin as usize].is_none() {
            return self.core.refuse(TransportError::InvalidPin, now, "digital_read");
        }
        let result = self.port.read(pin).map_err(TransportError::from);
        self.core.complete(result, now, "digital_read")
    }

    /// Invert an output pin, returning the new level
    pub fn toggle(&mut self, pin: u8) -> Result<bool> {
        let level = !self.digital_read(pin)?;
        self.digital_write(pin, level)?;
        Ok(level)
    }
}

impl<P: GpioPort, C: TimeSource> Transport for GpioTransport<P, C> {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransportCore {
        &mut self.core
    }

    fn capabilities(&self) -> &'static str {
        "gpio:digital_io,pull_up,pull_down"
    }

    fn init(&mut self) -> Result<()> {
        if self.core.state() == super::TransportState::Error {
            self.deinit();
        }
        if self.core.begin_init()? {
            return Ok(());
        }
        let now = self.clock.now_us();
        self.core.finish_init(Ok(()), now)
    }

    fn deinit(&mut self) {
        self.modes = [None; PIN_SLOTS];
        self.core.deinit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockClock, MockGpio};
    use crate::transport::TransportState;

    fn ready() -> GpioTransport<MockGpio, MockClock> {
        let mut gpio = GpioTransport::new("gpio", MockGpio::new(30), MockClock::new());
        gpio.init().unwrap();
        gpio
    }

    #[test]
    fn test_write_requires_configured_pin() {
        let mut gpio = ready();
        assert_eq!(gpio.digital_write(5, true), Err(TransportError::InvalidPin));
        assert_eq!(gpio.digital_read(5), Err(TransportError::InvalidPin));

        gpio.pin_mode(5, PinMode::Output).unwrap();
        gpio.digital_write(5, true).unwrap();
        assert!(gpio.digital_read(5).unwrap());
        assert_eq!(gpio.pin_mode_of(5), Some(PinMode::Output));
    }

    #[test]
    fn test_invalid_pin_refused_before_hardware() {
        let mut gpio = ready();
        assert_eq!(gpio.pin_mode(40, PinMode::Output), Err(TransportError::InvalidPin));
        assert_eq!(gpio.port().mode(40), None);
        // Refusals count but do not change state
        assert_eq!(gpio.status().error_count, 1);
        assert_eq!(gpio.state(), TransportState::Ready);
    }

    #[test]
    fn test_input_pin_refuses_write() {
        let mut gpio = ready();
        gpio.pin_mode(3, PinMode::InputPullUp).unwrap();
        assert!(gpio.digital_read(3).unwrap());
        assert_eq!(
            gpio.digital_write(3, false),
            Err(TransportError::InvalidArgument)
        );
    }

    #[test]
    fn test_toggle() {
        let mut gpio = ready();
        gpio.pin_mode(25, PinMode::Output).unwrap();
        assert!(gpio.toggle(25).unwrap());
        assert!(!gpio.toggle(25).unwrap());
        assert_eq!(gpio.port().writes(), &[(25, false), (25, true), (25, false)]);
    }

    #[test]
    fn test_initial_level_and_deinit_forgets_pins() {
        let mut gpio = GpioTransport::new("gpio", MockGpio::new(30), MockClock::new());
        gpio.init_with(GpioConfig { initial_level: true }).unwrap();
        assert_eq!(gpio.config().get("initial_level"), Some("high"));

        gpio.pin_mode(2, PinMode::Output).unwrap();
        assert!(gpio.port().output_level(2));
        assert_eq!(gpio.configured_pins().count(), 1);

        gpio.deinit();
        assert_eq!(gpio.configured_pins().count(), 0);
        assert_eq!(gpio.digital_write(2, true), Err(TransportError::NotInitialized));
    }

    #[test]
    fn test_not_initialized() {
        let mut gpio = GpioTransport::new("gpio", MockGpio::new(30), MockClock::new());
        assert_eq!(
            gpio.pin_mode(1, PinMode::Output),
            Err(TransportError::NotInitialized)
        );
    }
}
