//! ADC transport
//!
//! Single-shot conversions with a resolution chosen inside the unit's declared
//! range. Raw values are always within `[0, 2^resolution - 1]`.

use crate::core::traits::TimeSource;
use crate::platform::traits::{AdcConfig, AdcUnit};

use super::status::TransportCore;
use super::{Result, Transport, TransportError, TransportState, TransportType};

/// ADC transport over an [`AdcUnit`]
pub struct AdcTransport<U, C> {
    core: TransportCore,
    unit: U,
    clock: C,
    config: AdcConfig,
    resolution_bits: u8,
}

impl<U: AdcUnit, C: TimeSource> AdcTransport<U, C> {
    /// Create a transport called `name` with the default configuration
    pub fn new(name: &str, unit: U, clock: C) -> Self {
        let config = AdcConfig::default();
        let mut transport = Self {
            core: TransportCore::new(name, TransportType::Adc),
            unit,
            clock,
            config,
            resolution_bits: config.resolution_bits,
        };
        transport.mirror_config();
        transport
    }

    /// Replace the configuration
    pub fn configure(&mut self, config: AdcConfig) -> Result<()> {
        self.core.ensure_configurable()?;
        self.config = config;
        self.resolution_bits = config.resolution_bits;
        self.mirror_config();
        Ok(())
    }

    /// `configure` followed by `init`
    pub fn init_with(&mut self, config: AdcConfig) -> Result<()> {
        self.configure(config)?;
        self.init()
    }

    /// Underlying unit
    pub fn unit(&self) -> &U {
        &self.unit
    }

    /// Mutable underlying unit
    pub fn unit_mut(&mut self) -> &mut U {
        &mut self.unit
    }

    fn mirror_config(&mut self) {
        let bits = self.resolution_bits;
        let vref = self.vref_mv();
        let map = self.core.config_mut();
        map.clear();
        let _ = map.set("resolution", format_args!("{}", bits));
        let _ = map.set("vref_mv", format_args!("{}", vref));
    }

    fn supports(&self, bits: u8) -> bool {
        let (min, max) = self.unit.resolution_range();
        (min..=max).contains(&bits)
    }

    /// Current resolution in bits
    pub fn resolution(&self) -> u8 {
        self.resolution_bits
    }

    /// Full-scale raw value at the current resolution
    pub fn max_raw(&self) -> u16 {
        ((1u32 << self.resolution_bits) - 1) as u16
    }

    /// Reference voltage in millivolts
    pub fn vref_mv(&self) -> u16 {
        self.config.vref_mv.unwrap_or_else(|| self.unit.vref_mv())
    }

    /// Change the resolution
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `bits` is outside the unit's range.
    pub fn set_resolution(&mut self, bits: u8) -> Result<()> {
        if !self.supports(bits) {
            let now = self.clock.now_us();
            return self.core.refuse(TransportError::InvalidArgument, now, "set_resolution");
        }
        self.resolution_bits = bits;
        self.mirror_config();
        Ok(())
    }

    /// One raw conversion on `channel`
    ///
    /// # Errors
    ///
    /// `InvalidChannel` for `channel >= channel_count`.
    pub fn read(&mut self, channel: u8) -> Result<u16> {
        let now = self.clock.now_us();
        self.core.check_ready(now, "read")?;
        if channel >= self.unit.channel_count() {
            return self.core.refuse(TransportError::InvalidChannel, now, "read");
        }
        let max = self.max_raw();
        let result = self
            .unit
            .read_raw(channel, self.resolution_bits)
            .map(|raw| raw.min(max))
            .map_err(TransportError::from);
        self.core.complete(result, now, "read")
    }

    /// Mean of `samples` conversions
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for zero samples.
    pub fn read_averaged(&mut self, channel: u8, samples: u16) -> Result<u16> {
        if samples == 0 {
            let now = self.clock.now_us();
            return self.core.refuse(TransportError::InvalidArgument, now, "read_averaged");
        }
        let mut sum = 0u32;
        for _ in 0..samples {
            sum += u32::from(self.read(channel)?);
        }
        Ok((sum / u32::from(samples)) as u16)
    }

    /// One conversion scaled to volts
    pub fn read_voltage(&mut self, channel: u8) -> Result<f32> {
        let raw = self.read(channel)?;
        Ok(raw as f32 * self.vref_mv() as f32 / self.max_raw() as f32 / 1000.0)
    }
}

impl<U: AdcUnit, C: TimeSource> Transport for AdcTransport<U, C> {
    fn core(&self) -> &TransportCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransportCore {
        &mut self.core
    }

    fn capabilities(&self) -> &'static str {
        "adc:single_shot,voltage,averaging"
    }

    fn init(&mut self) -> Result<()> {
        if self.core.state() == TransportState::Error {
            self.deinit();
        }
        if self.core.begin_init()? {
            return Ok(());
        }
        let result = if self.supports(self.resolution_bits) {
            Ok(())
        } else {
            Err(TransportError::InvalidArgument)
        };
        let now = self.clock.now_us();
        self.core.finish_init(result, now)
    }

    fn deinit(&mut self) {
        self.core.deinit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockAdc, MockClock};

    fn ready() -> AdcTransport<MockAdc, MockClock> {
        let mut adc = AdcTransport::new("adc", MockAdc::new(4), MockClock::new());
        adc.init().unwrap();
        adc
    }

    #[test]
    fn test_channel_bounds() {
        let mut adc = ready();
        assert!(adc.read(0).is_ok());
        assert!(adc.read(3).is_ok());
        assert_eq!(adc.read(4), Err(TransportError::InvalidChannel));
        assert_eq!(adc.unit().conversions(), 2);
    }

    #[test]
    fn test_resolution_bounds() {
        let mut adc = ready();
        assert!(adc.set_resolution(9).is_ok());
        assert!(adc.set_resolution(12).is_ok());
        assert_eq!(adc.set_resolution(8), Err(TransportError::InvalidArgument));
        assert_eq!(adc.set_resolution(13), Err(TransportError::InvalidArgument));
        assert_eq!(adc.resolution(), 12);
        assert_eq!(adc.config().get("resolution"), Some("12"));
    }

    #[test]
    fn test_raw_and_voltage() {
        let mut adc = ready();
        adc.unit_mut().set_input_mv(1, 3300);
        assert_eq!(adc.read(1), Ok(4095));
        assert!((adc.read_voltage(1).unwrap() - 3.3).abs() < 1e-4);

        adc.set_resolution(10).unwrap();
        assert_eq!(adc.max_raw(), 1023);
        adc.unit_mut().set_input_mv(2, 1650);
        let v = adc.read_voltage(2).unwrap();
        assert!((v - 1.65).abs() < 0.01);
    }

    #[test]
    fn test_averaging() {
        let mut adc = ready();
        adc.unit_mut().set_input_mv(0, 1000);
        let single = adc.read(0).unwrap();
        assert_eq!(adc.read_averaged(0, 8), Ok(single));
        assert_eq!(adc.read_averaged(0, 0), Err(TransportError::InvalidArgument));
    }

    #[test]
    fn test_init_rejects_unsupported_resolution() {
        let mut adc = AdcTransport::new("adc", MockAdc::new(4), MockClock::new());
        let result = adc.init_with(AdcConfig {
            resolution_bits: 16,
            vref_mv: Some(2500),
        });
        assert_eq!(result, Err(TransportError::InvalidArgument));
        assert_eq!(adc.state(), TransportState::Error);
        assert_eq!(adc.vref_mv(), 2500);
    }
}
