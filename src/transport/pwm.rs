//! PWM transport
//!
//! Pins are attached to channels of the unit; a channel of [`AUTO_CHANNEL`]
//! picks the next free one, wrapping around the channel count. Duty values
//! above full scale are clamped.

use crate::core::traits::TimeSource;
use crate::platform::traits::{PwmConfig, PwmUnit};

use super::status::TransportCore;
use super::{Result, Transport, TransportError, TransportState, TransportType};

/// Channel argument requesting automatic assignment
pub const AUTO_CHANNEL: u8 = 0xFF;
/// Maximum simultaneously attached pins
pub const MAX_PWM_ATTACHMENTS: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Attachment {
    pin: u8,
    channel: u8,
    frequency_hz: u32,
    duty: u32,
}

/// PWM transport over a [`PwmUnit`]
pub struct PwmTransport<U, C> {
    core: TransportCore,
    unit: U,
    clock: C,
    config: PwmConfig,
    attached: heapless::Vec<Attachment, MAX_PWM_ATTACHMENTS>,
    next_auto: u8,
}

impl<U: PwmUnit, C: TimeSource> PwmTransport<U, C> {
    /// Create a transport called `name` with the default configuration
    pub fn new(name: &str, unit: U, clock: C) -> Self {
        let mut transport = Self {
            core: TransportCore::new(name, TransportType::Pwm),
            unit,
            clock,
            config: PwmConfig::default(),
            attached: heapless::Vec::new(),
            next_auto: 0,
        };
        transport.mirror_config();
        transport
    }

    /// Replace the configuration
    pub fn configure(&mut self, config: PwmConfig) -> Result<()> {
        self.core.ensure_configurable()?;
        self.config = config;
        self.mirror_config();
        Ok(())
    }

    /// `configure` followed by `init`
    pub fn init_with(&mut self, config: PwmConfig) -> Result<()> {
        self.configure(config)?;
        self.init()
    }

    /// Underlying unit
    pub fn unit(&self) -> &U {
        &self.unit
    }

    fn mirror_config(&mut self) {
        let c = self.config;
        let map = self.core.config_mut();
        map.clear();
        let _ = map.set("resolution", format_args!("{}", c.resolution_bits));
        let _ = map.set("frequency", format_args!("{}", c.default_frequency_hz));
    }

    /// Full-scale duty value
    pub fn max_duty(&self) -> u32 {
        (1u32 << self.config.resolution_bits) - 1
    }

    fn find(&self, pin: u8) -> Option<usize> {
        self.attached.iter().position(|a| a.pin == pin)
    }

    fn channel_in_use(&self, channel: u8) -> bool {
        self.attached.iter().any(|a| a.channel == channel)
    }

    fn pick_channel(&self, requested: u8) -> Option<u8> {
        let count = self.unit.channel_count();
        if requested != AUTO_CHANNEL {
            return (requested < count && !self.channel_in_use(requested)).then_some(requested);
        }
        (0..count)
            .map(|offset| {
                ((u16::from(self.next_auto) + u16::from(offset)) % u16::from(count)) as u8
            })
            .find(|&ch| !self.channel_in_use(ch))
    }

    /// Attach `pin` to `channel` (or [`AUTO_CHANNEL`]) at `frequency_hz`
    ///
    /// A frequency of 0 uses the configured default. Returns the channel used.
    ///
    /// # Errors
    ///
    /// - `InvalidPin` if the pin cannot carry PWM or is already attached
    /// - `InvalidChannel` if the channel is out of range or taken, or no
    ///   channel is free
    pub fn attach(&mut self, pin: u8, channel: u8, frequency_hz: u32) -> Result<u8> {
        let now = self.clock.now_us();
        self.core.check_ready(now, "attach")?;
        if !self.unit.is_valid_pin(pin) || self.find(pin).is_some() {
            return self.core.refuse(TransportError::InvalidPin, now, "attach");
        }
        let Some(channel) = self.pick_channel(channel) else {
            return self.core.refuse(TransportError::InvalidChannel, now, "attach");
        };
        if self.attached.is_full() {
            return self.core.refuse(TransportError::BufferOverflow, now, "attach");
        }
        let frequency_hz = if frequency_hz == 0 {
            self.config.default_frequency_hz
        } else {
            frequency_hz
        };
        let result = self
            .unit
            .configure(channel, pin, frequency_hz, self.config.resolution_bits)
            .map_err(TransportError::from);
        self.core.complete(result, now, "attach")?;

        // Capacity checked above
        let _ = self.attached.push(Attachment {
            pin,
            channel,
            frequency_hz,
            duty: 0,
        });
        self.next_auto = ((u16::from(channel) + 1) % u16::from(self.unit.channel_count())) as u8;
        log_debug!("PWM {}: pin {} on channel {}", self.core.name(), pin, channel);
        Ok(channel)
    }

    /// Stop the output on `pin` and free its channel
    pub fn detach(&mut self, pin: u8) -> Result<()> {
        let now = self.clock.now_us();
        self.core.check_ready(now, "detach")?;
        let Some(index) = self.find(pin) else {
            return self.core.refuse(TransportError::InvalidPin, now, "detach");
        };
        let attachment = self.attached.swap_remove(index);
        let result = self.unit.release(attachment.channel).map_err(TransportError::from);
        self.core.complete(result, now, "detach")
    }

    /// Set the raw duty of `pin`, clamped to full scale
    pub fn write(&mut self, pin: u8, duty: u32) -> Result<()> {
        let now = self.clock.now_us();
        self.core.check_ready(now, "write")?;
        let Some(index) = self.find(pin) else {
            return self.core.refuse(TransportError::InvalidPin, now, "write");
        };
        let duty = duty.min(self.max_duty());
        let channel = self.attached[index].channel;
        let result = self.unit.set_duty(channel, duty).map_err(TransportError::from);
        self.core.complete(result, now, "write")?;
        self.attached[index].duty = duty;
        Ok(())
    }

    /// Set the duty of `pin` as a percentage, clamped to `0..=100`
    pub fn write_percent(&mut self, pin: u8, percent: f32) -> Result<()> {
        let percent = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
        let duty = (percent / 100.0 * self.max_duty() as f32 + 0.5) as u32;
        self.write(pin, duty)
    }

    /// Frequency of an attached pin
    pub fn frequency_of(&self, pin: u8) -> Option<u32> {
        self.find(pin).map(|i| self.attached[i].frequency_hz)
    }

    /// Channel of an attached pin
    pub fn channel_of(&self, pin: u8) -> Option<u8> {
        self.find(pin).map(|i| self.attached[i].channel)
    }

    /// Last duty written to an attached pin
    pub fn duty_of(&self, pin: u8) -> Option<u32> {
        self.find(pin).map(|i| self.attached[i].duty)
    }
}

impl<U: PwmUnit, C: TimeSource> Transport for PwmTransport<U, C> {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransportCore {
        &mut self.core
    }

    fn capabilities(&self) -> &'static str {
        "pwm:duty,frequency,auto_channel"
    }

    fn init(&mut self) -> Result<()> {
        if self.core.state() == TransportState::Error {
            self.deinit();
        }
        if self.core.begin_init()? {
            return Ok(());
        }
        let bits = self.config.resolution_bits;
        let result = if bits == 0 || bits > self.unit.max_resolution_bits() || bits > 31 {
            Err(TransportError::InvalidArgument)
        } else if self.config.default_frequency_hz == 0 || self.unit.channel_count() == 0 {
            Err(TransportError::InvalidArgument)
        } else {
            Ok(())
        };
        let now = self.clock.now_us();
        self.core.finish_init(result, now)
    }

    fn deinit(&mut self) {
        for attachment in self.attached.iter() {
            let _ = self.unit.release(attachment.channel);
        }
        self.attached.clear();
        self.next_auto = 0;
        self.core.deinit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockClock, MockPwm};

    fn ready(channels: u8) -> PwmTransport<MockPwm, MockClock> {
        let mut pwm = PwmTransport::new("pwm", MockPwm::new(channels), MockClock::new());
        pwm.init().unwrap();
        pwm
    }

    #[test]
    fn test_duty_bounds_and_clamping() {
        let mut pwm = ready(4);
        pwm.attach(15, 0, 20_000).unwrap();
        pwm.write(15, 0).unwrap();
        pwm.write(15, 255).unwrap();
        assert_eq!(pwm.unit().channel(0).map(|c| c.duty), Some(255));

        pwm.write(15, 1000).unwrap();
        assert_eq!(pwm.duty_of(15), Some(255));
    }

    #[test]
    fn test_write_percent_clamps() {
        let mut pwm = ready(4);
        pwm.attach(2, AUTO_CHANNEL, 0).unwrap();
        pwm.write_percent(2, 50.0).unwrap();
        assert_eq!(pwm.duty_of(2), Some(128));
        pwm.write_percent(2, 150.0).unwrap();
        assert_eq!(pwm.duty_of(2), Some(255));
        pwm.write_percent(2, -3.0).unwrap();
        assert_eq!(pwm.duty_of(2), Some(0));
        assert_eq!(pwm.frequency_of(2), Some(1_000));
    }

    #[test]
    fn test_auto_assignment_wraps() {
        let mut pwm = ready(2);
        assert_eq!(pwm.attach(1, AUTO_CHANNEL, 500), Ok(0));
        assert_eq!(pwm.attach(2, AUTO_CHANNEL, 500), Ok(1));
        assert_eq!(
            pwm.attach(3, AUTO_CHANNEL, 500),
            Err(TransportError::InvalidChannel)
        );

        pwm.detach(1).unwrap();
        assert_eq!(pwm.attach(3, AUTO_CHANNEL, 500), Ok(0));
        assert_eq!(pwm.channel_of(3), Some(0));
    }

    #[test]
    fn test_explicit_channel_checks() {
        let mut pwm = ready(2);
        assert_eq!(pwm.attach(4, 2, 100), Err(TransportError::InvalidChannel));
        pwm.attach(4, 1, 100).unwrap();
        assert_eq!(pwm.attach(5, 1, 100), Err(TransportError::InvalidChannel));
        assert_eq!(pwm.attach(4, 0, 100), Err(TransportError::InvalidPin));
        assert_eq!(pwm.attach(40, 0, 100), Err(TransportError::InvalidPin));
        assert_eq!(pwm.write(6, 1), Err(TransportError::InvalidPin));
    }

    #[test]
    fn test_deinit_releases_channels() {
        let mut pwm = ready(2);
        pwm.attach(4, 0, 100).unwrap();
        pwm.deinit();
        assert_eq!(pwm.unit().channel(0).map(|c| c.active), Some(false));
        assert_eq!(pwm.channel_of(4), None);
    }

    #[test]
    fn test_init_checks_resolution() {
        let mut pwm = PwmTransport::new("pwm", MockPwm::new(2), MockClock::new());
        let result = pwm.init_with(PwmConfig {
            resolution_bits: 20,
            ..PwmConfig::default()
        });
        assert_eq!(result, Err(TransportError::InvalidArgument));
    }
}
