//! BMP280 barometric pressure and temperature sensor
//!
//! Works over any [`RegisterBus`]; on I2C the chip answers at 0x76 or 0x77
//! depending on SDO. Calibration is read once during `init` and the datasheet
//! integer compensation turns raw readings into hundredths of a degree and
//! Q24.8 pascals.
//!
//! In forced mode every `read_data` triggers a conversion and waits for it;
//! in normal mode the chip cycles on its own and the latest result is read.

use crate::transport::TransportError;

use super::bus::RegisterBus;
use super::identify::expect_chip_id;
use super::registers::{Access, RegisterDescriptor};
use super::schema::{CapabilitySchema, Command, Setting, Signal, ValueType};
use super::{
    DeviceAddress, Driver, DriverError, DriverState, I2cAddressed, Sample, SampleValue, TIER1,
    TIER2,
};

#[cfg(feature = "tier1")]
use super::schema::{check_settable, ParamValue};
#[cfg(feature = "tier1")]
use super::Configurable;
#[cfg(feature = "tier2")]
use super::RegisterAccess;

const DRIVER_ID: &str = "bmp280";

/// Value of the ID register
pub const CHIP_ID: u8 = 0x58;
/// Address with SDO low
pub const ADDR_PRIMARY: u8 = 0x76;
/// Address with SDO high
pub const ADDR_SECONDARY: u8 = 0x77;

// ============================================================================
// Registers
// ============================================================================

/// First calibration register (dig_T1 LSB)
const REG_CALIB: u8 = 0x88;
/// Chip identification
const REG_ID: u8 = 0xD0;
/// Soft reset, write [`RESET_WORD`]
const REG_RESET: u8 = 0xE0;
/// Conversion and NVM copy status
const REG_STATUS: u8 = 0xF3;
/// Oversampling and power mode
const REG_CTRL_MEAS: u8 = 0xF4;
/// Standby time and IIR filter
const REG_CONFIG: u8 = 0xF5;
/// Pressure MSB, LSB, XLSB followed by temperature MSB, LSB, XLSB
const REG_PRESS: u8 = 0xF7;

const RESET_WORD: u8 = 0xB6;
const STATUS_MEASURING: u8 = 0x08;
const STATUS_IM_UPDATE: u8 = 0x01;
const CALIB_LEN: usize = 24;

/// Raw value reported for a skipped measurement
const ADC_SKIPPED: i32 = 0x80000;
/// Worst-case conversion time at x16 oversampling plus margin
const MAX_CONVERSION_MS: u32 = 50;
/// NVM copy after power-on or reset
const STARTUP_MS: u32 = 2;

/// Register map
pub static REGISTER_MAP: [RegisterDescriptor; 19] = [
    RegisterDescriptor::new(0x88, "DIG_T1", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x8A, "DIG_T2", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x8C, "DIG_T3", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x8E, "DIG_P1", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x90, "DIG_P2", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x92, "DIG_P3", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x94, "DIG_P4", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x96, "DIG_P5", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x98, "DIG_P6", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x9A, "DIG_P7", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x9C, "DIG_P8", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x9E, "DIG_P9", 2, Access::ReadOnly, 0),
    RegisterDescriptor::new(0xD0, "ID", 1, Access::ReadOnly, CHIP_ID as u32),
    RegisterDescriptor::new(0xE0, "RESET", 1, Access::WriteOnly, 0),
    RegisterDescriptor::new(0xF3, "STATUS", 1, Access::ReadOnly, 0),
    RegisterDescriptor::new(0xF4, "CTRL_MEAS", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0xF5, "CONFIG", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0xF7, "PRESS", 3, Access::ReadOnly, 0x80_0000),
    RegisterDescriptor::new(0xFA, "TEMP", 3, Access::ReadOnly, 0x80_0000),
];

static SCHEMA: CapabilitySchema = CapabilitySchema {
    settings: &[
        Setting::new("osrs_t", ValueType::Int)
            .writable()
            .range(0.0, 16.0, 1.0)
            .active(TIER1),
        Setting::new("osrs_p", ValueType::Int)
            .writable()
            .range(0.0, 16.0, 1.0)
            .active(TIER1),
        Setting::new("filter", ValueType::Int)
            .writable()
            .range(0.0, 16.0, 1.0)
            .active(TIER1),
        Setting::new("standby_ms", ValueType::Float)
            .writable()
            .range(0.5, 4000.0, 0.5)
            .units("ms")
            .active(TIER1),
        Setting::new("mode", ValueType::Enum).writable().active(TIER1),
    ],
    signals: &[
        Signal::new("temperature", ValueType::Float).units("°C"),
        Signal::new("pressure", ValueType::Float).units("Pa"),
    ],
    commands: &[
        Command::new("reset", ""),
        Command::new("reg_read", "addr:int len:int").active(TIER2),
        Command::new("reg_write", "addr:int data:blob").active(TIER2),
    ],
};

// ============================================================================
// Configuration
// ============================================================================

/// Oversampling of one measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    /// Measurement disabled
    Skipped = 0,
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

impl Oversampling {
    /// Sample count (0 when skipped)
    pub const fn factor(self) -> u8 {
        match self {
            Oversampling::Skipped => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
            Oversampling::X16 => 16,
        }
    }

    pub fn from_factor(factor: i32) -> Option<Self> {
        Some(match factor {
            0 => Oversampling::Skipped,
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            4 => Oversampling::X4,
            8 => Oversampling::X8,
            16 => Oversampling::X16,
            _ => return None,
        })
    }
}

/// IIR filter coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Filter {
    Off = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
}

impl Filter {
    pub const fn coefficient(self) -> u8 {
        match self {
            Filter::Off => 0,
            Filter::X2 => 2,
            Filter::X4 => 4,
            Filter::X8 => 8,
            Filter::X16 => 16,
        }
    }

    pub fn from_coefficient(coefficient: i32) -> Option<Self> {
        Some(match coefficient {
            0 => Filter::Off,
            2 => Filter::X2,
            4 => Filter::X4,
            8 => Filter::X8,
            16 => Filter::X16,
            _ => return None,
        })
    }
}

/// Inactive time between conversions in normal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Standby {
    Ms0_5 = 0,
    Ms62_5 = 1,
    Ms125 = 2,
    Ms250 = 3,
    Ms500 = 4,
    Ms1000 = 5,
    Ms2000 = 6,
    Ms4000 = 7,
}

impl Standby {
    const ALL: [Standby; 8] = [
        Standby::Ms0_5,
        Standby::Ms62_5,
        Standby::Ms125,
        Standby::Ms250,
        Standby::Ms500,
        Standby::Ms1000,
        Standby::Ms2000,
        Standby::Ms4000,
    ];

    pub const fn millis(self) -> f32 {
        match self {
            Standby::Ms0_5 => 0.5,
            Standby::Ms62_5 => 62.5,
            Standby::Ms125 => 125.0,
            Standby::Ms250 => 250.0,
            Standby::Ms500 => 500.0,
            Standby::Ms1000 => 1000.0,
            Standby::Ms2000 => 2000.0,
            Standby::Ms4000 => 4000.0,
        }
    }

    /// Setting with exactly `ms` of standby
    pub fn from_millis(ms: f32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| (s.millis() - ms).abs() < 0.01)
    }
}

/// Power mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// No conversions
    Sleep = 0,
    /// One conversion per request
    Forced = 1,
    /// Continuous conversions separated by the standby time
    Normal = 3,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Mode::Sleep => "sleep",
            Mode::Forced => "forced",
            Mode::Normal => "normal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sleep" => Some(Mode::Sleep),
            "forced" => Some(Mode::Forced),
            "normal" => Some(Mode::Normal),
            _ => None,
        }
    }
}

/// Measurement configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bmp280Config {
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    pub filter: Filter,
    pub standby: Standby,
    pub mode: Mode,
}

impl Default for Bmp280Config {
    fn default() -> Self {
        Self {
            temperature_oversampling: Oversampling::X1,
            pressure_oversampling: Oversampling::X4,
            filter: Filter::Off,
            standby: Standby::Ms0_5,
            mode: Mode::Normal,
        }
    }
}

impl Bmp280Config {
    fn ctrl_meas(&self, mode: Mode) -> u8 {
        ((self.temperature_oversampling as u8) << 5)
            | ((self.pressure_oversampling as u8) << 2)
            | mode as u8
    }

    fn config_reg(&self) -> u8 {
        ((self.standby as u8) << 5) | ((self.filter as u8) << 2)
    }
}

// ============================================================================
// Compensation
// ============================================================================

/// Factory trim values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub t1: u16,
    pub t2: i16,
    pub t3: i16,
    pub p1: u16,
    pub p2: i16,
    pub p3: i16,
    pub p4: i16,
    pub p5: i16,
    pub p6: i16,
    pub p7: i16,
    pub p8: i16,
    pub p9: i16,
}

impl Calibration {
    /// Decode the little-endian calibration block starting at 0x88
    pub fn from_bytes(raw: &[u8; CALIB_LEN]) -> Self {
        let u = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        }
    }

    /// Temperature in 0.01 °C and the `t_fine` carry used by pressure
    pub fn compensate_temperature(&self, adc_t: i32) -> (i32, i32) {
        let adc_t = i64::from(adc_t);
        let t1 = i64::from(self.t1);
        let var1 = (((adc_t >> 3) - (t1 << 1)) * i64::from(self.t2)) >> 11;
        let d = (adc_t >> 4) - t1;
        let var2 = (((d * d) >> 12) * i64::from(self.t3)) >> 14;
        let t_fine = var1 + var2;
        (((t_fine * 5 + 128) >> 8) as i32, t_fine as i32)
    }

    /// Pressure in Q24.8 pascals, `None` when the trim would divide by zero
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: i32) -> Option<u32> {
        let mut var1 = i64::from(t_fine) - 128_000;
        let mut var2 = var1 * var1 * i64::from(self.p6);
        var2 += (var1 * i64::from(self.p5)) << 17;
        var2 += i64::from(self.p4) << 35;
        var1 = ((var1 * var1 * i64::from(self.p3)) >> 8) + ((var1 * i64::from(self.p2)) << 12);
        var1 = (((1i64 << 47) + var1) * i64::from(self.p1)) >> 33;
        if var1 == 0 {
            return None;
        }
        let mut p = 1_048_576 - i64::from(adc_p);
        p = (((p << 31) - var2) * 3125) / var1;
        var1 = (i64::from(self.p9) * (p >> 13) * (p >> 13)) >> 25;
        var2 = (i64::from(self.p8) * p) >> 19;
        p = ((p + var1 + var2) >> 8) + (i64::from(self.p7) << 4);
        u32::try_from(p).ok()
    }
}

// ============================================================================
// Driver
// ============================================================================

/// BMP280 driver
pub struct Bmp280<R> {
    bus: R,
    config: Bmp280Config,
    calibration: Calibration,
    state: DriverState,
}

impl<R: RegisterBus> Bmp280<R> {
    /// Driver with the default configuration
    pub fn new(bus: R) -> Self {
        Self::with_config(bus, Bmp280Config::default())
    }

    /// Driver applying `config` during `init`
    pub fn with_config(bus: R, config: Bmp280Config) -> Self {
        Self {
            bus,
            config,
            calibration: Calibration::default(),
            state: DriverState::new(),
        }
    }

    pub fn config(&self) -> &Bmp280Config {
        &self.config
    }

    /// Trim values read during `init`
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn bus(&self) -> &R {
        &self.bus
    }

    /// Give the bus back
    pub fn release(self) -> R {
        self.bus
    }

    fn wait_status_clear(&mut self, mask: u8) -> Result<(), DriverError> {
        for _ in 0..MAX_CONVERSION_MS {
            if self.bus.read_reg(REG_STATUS)? & mask == 0 {
                return Ok(());
            }
            self.bus.delay_ms(1);
        }
        Err(DriverError::Bus(TransportError::Timeout))
    }

    /// Sleep, write the filter and standby time, then enter the configured mode
    fn write_settings(&mut self, config: &Bmp280Config) -> Result<(), DriverError> {
        self.bus.write_reg(REG_CTRL_MEAS, config.ctrl_meas(Mode::Sleep))?;
        self.bus.write_reg(REG_CONFIG, config.config_reg())?;
        if config.mode != Mode::Forced {
            self.bus.write_reg(REG_CTRL_MEAS, config.ctrl_meas(config.mode))?;
        }
        Ok(())
    }

    fn bring_up(&mut self) -> Result<(), DriverError> {
        expect_chip_id(&mut self.bus, DRIVER_ID, REG_ID, CHIP_ID)?;
        self.bus.write_reg(REG_RESET, RESET_WORD)?;
        self.bus.delay_ms(STARTUP_MS);
        self.wait_status_clear(STATUS_IM_UPDATE)?;

        let mut raw = [0u8; CALIB_LEN];
        self.bus.read_regs(REG_CALIB, &mut raw)?;
        let calibration = Calibration::from_bytes(&raw);
        if calibration.t1 == 0 || calibration.p1 == 0 {
            log_error!("{}: calibration block is blank", DRIVER_ID);
            return Err(DriverError::IdentificationFailure);
        }
        self.calibration = calibration;
        let config = self.config;
        self.write_settings(&config)
    }

    /// Reset the chip and reapply the configuration
    pub fn soft_reset(&mut self) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        let result = self
            .bus
            .write_reg(REG_RESET, RESET_WORD)
            .map_err(DriverError::from)
            .and_then(|()| {
                self.bus.delay_ms(STARTUP_MS);
                self.wait_status_clear(STATUS_IM_UPDATE)
            })
            .and_then(|()| {
                let config = self.config;
                self.write_settings(&config)
            });
        self.state.record(result)
    }

    /// Temperature in 0.01 °C and pressure in Q24.8 Pa
    fn measure_raw(&mut self) -> Result<(i32, u32), DriverError> {
        self.state.ensure_ready()?;
        if self.config.mode == Mode::Forced {
            let ctrl = self.config.ctrl_meas(Mode::Forced);
            self.bus.write_reg(REG_CTRL_MEAS, ctrl)?;
            self.bus.delay_ms(1);
            self.wait_status_clear(STATUS_MEASURING)?;
        }

        let mut raw = [0u8; 6];
        self.bus.read_regs(REG_PRESS, &mut raw)?;
        let adc_p = (i32::from(raw[0]) << 12) | (i32::from(raw[1]) << 4) | (i32::from(raw[2]) >> 4);
        let adc_t = (i32::from(raw[3]) << 12) | (i32::from(raw[4]) << 4) | (i32::from(raw[5]) >> 4);
        if adc_t == ADC_SKIPPED || adc_p == ADC_SKIPPED {
            return Err(DriverError::InvalidArgument);
        }

        let (centi_c, t_fine) = self.calibration.compensate_temperature(adc_t);
        let q24_8 = self
            .calibration
            .compensate_pressure(adc_p, t_fine)
            .ok_or(DriverError::InvalidArgument)?;
        Ok((centi_c, q24_8))
    }

    fn measure(&mut self) -> Result<SampleValue, DriverError> {
        let result = self.measure_raw();
        let (centi_c, q24_8) = self.state.record(result)?;
        Ok(SampleValue::Environment {
            temperature_c: centi_c as f32 / 100.0,
            pressure_pa: q24_8 as f32 / 256.0,
        })
    }

    /// Temperature in °C
    pub fn read_temperature(&mut self) -> Result<f32, DriverError> {
        match self.measure()? {
            SampleValue::Environment { temperature_c, .. } => Ok(temperature_c),
            _ => Err(DriverError::InvalidArgument),
        }
    }

    /// Pressure in Pa
    pub fn read_pressure(&mut self) -> Result<f32, DriverError> {
        match self.measure()? {
            SampleValue::Environment { pressure_pa, .. } => Ok(pressure_pa),
            _ => Err(DriverError::InvalidArgument),
        }
    }
}

#[cfg(feature = "tier1")]
impl<R: RegisterBus> Bmp280<R> {
    /// Apply `change` to a copy of the configuration and write it out
    ///
    /// The chip sleeps while the settings change and then resumes the mode
    /// of the new configuration.
    fn reconfigure<F: FnOnce(&mut Bmp280Config)>(&mut self, change: F) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        let mut next = self.config;
        change(&mut next);
        let result = self.write_settings(&next);
        if result.is_ok() {
            self.config = next;
            log_debug!(
                "{}: osrs_t x{} osrs_p x{} filter {} mode {}",
                DRIVER_ID,
                next.temperature_oversampling.factor(),
                next.pressure_oversampling.factor(),
                next.filter.coefficient(),
                next.mode.as_str()
            );
        }
        self.state.record(result)
    }

    pub fn set_oversampling(
        &mut self,
        temperature: Oversampling,
        pressure: Oversampling,
    ) -> Result<(), DriverError> {
        self.reconfigure(|c| {
            c.temperature_oversampling = temperature;
            c.pressure_oversampling = pressure;
        })
    }

    pub fn set_filter(&mut self, filter: Filter) -> Result<(), DriverError> {
        self.reconfigure(|c| c.filter = filter)
    }

    pub fn set_standby(&mut self, standby: Standby) -> Result<(), DriverError> {
        self.reconfigure(|c| c.standby = standby)
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), DriverError> {
        self.reconfigure(|c| c.mode = mode)
    }
}

impl<R: RegisterBus> Driver for Bmp280<R> {
    fn driver_id(&self) -> &'static str {
        DRIVER_ID
    }

    fn address(&self) -> DeviceAddress {
        self.bus.location()
    }

    fn init(&mut self) -> Result<(), DriverError> {
        if self.state.is_initialized() {
            return Ok(());
        }
        self.bring_up()?;
        self.state.set_initialized(true);
        log_info!("{}: ready", DRIVER_ID);
        Ok(())
    }

    fn deinit(&mut self) {
        if self.state.is_initialized() {
            let sleep = self.config.ctrl_meas(Mode::Sleep);
            let _ = self.bus.write_reg(REG_CTRL_MEAS, sleep);
        }
        self.state.set_initialized(false);
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    fn read_data(&mut self) -> Sample {
        self.measure().into()
    }

    fn schema(&self) -> &'static CapabilitySchema {
        &SCHEMA
    }
}

impl<R> I2cAddressed for Bmp280<R> {
    fn valid_addresses() -> &'static [u8] {
        &[ADDR_PRIMARY, ADDR_SECONDARY]
    }
}

#[cfg(feature = "tier1")]
impl<R: RegisterBus> Configurable for Bmp280<R> {
    fn get_parameter(&self, name: &str) -> Result<ParamValue<'static>, DriverError> {
        let c = &self.config;
        Ok(match name {
            "osrs_t" => ParamValue::Int(i32::from(c.temperature_oversampling.factor())),
            "osrs_p" => ParamValue::Int(i32::from(c.pressure_oversampling.factor())),
            "filter" => ParamValue::Int(i32::from(c.filter.coefficient())),
            "standby_ms" => ParamValue::Float(c.standby.millis()),
            "mode" => ParamValue::Text(c.mode.as_str()),
            _ => return Err(DriverError::InvalidArgument),
        })
    }

    fn set_parameter(&mut self, name: &str, value: &ParamValue<'_>) -> Result<(), DriverError> {
        check_settable(&SCHEMA, name, value)?;
        let int = || value.as_i32().ok_or(DriverError::InvalidArgument);
        match name {
            "osrs_t" => {
                let t = Oversampling::from_factor(int()?).ok_or(DriverError::InvalidArgument)?;
                let p = self.config.pressure_oversampling;
                self.set_oversampling(t, p)
            }
            "osrs_p" => {
                let p = Oversampling::from_factor(int()?).ok_or(DriverError::InvalidArgument)?;
                let t = self.config.temperature_oversampling;
                self.set_oversampling(t, p)
            }
            "filter" => {
                let filter = Filter::from_coefficient(int()?).ok_or(DriverError::InvalidArgument)?;
                self.set_filter(filter)
            }
            "standby_ms" => {
                let ms = value.as_f32().ok_or(DriverError::InvalidArgument)?;
                let standby = Standby::from_millis(ms).ok_or(DriverError::InvalidArgument)?;
                self.set_standby(standby)
            }
            "mode" => {
                let mode = value
                    .as_text()
                    .and_then(Mode::from_name)
                    .ok_or(DriverError::InvalidArgument)?;
                self.set_mode(mode)
            }
            _ => Err(DriverError::InvalidArgument),
        }
    }
}

#[cfg(feature = "tier2")]
impl<R: RegisterBus> RegisterAccess for Bmp280<R> {
    fn register_map(&self) -> &'static [RegisterDescriptor] {
        &REGISTER_MAP
    }

    fn register_bus(&mut self) -> &mut dyn RegisterBus {
        &mut self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::registers::validate_map;
    use crate::devices::I2cDevice;
    use crate::platform::error::I2cError;
    use crate::platform::mock::{MockClock, MockI2c, MockI2cDevice};
    use crate::transport::{I2cTransport, SharedTransport, Transport};

    const CALIB: [u8; CALIB_LEN] = [
        0x70, 0x6B, 0x43, 0x67, 0x18, 0xFC, 0x7D, 0x8E, 0x43, 0xD6, 0xD0, 0x0B, 0x27, 0x0B, 0x8C,
        0x00, 0xF9, 0xFF, 0x8C, 0x3C, 0xF8, 0xC6, 0x70, 0x17,
    ];
    /// adc_P = 415148, adc_T = 519888
    const RAW: [u8; 6] = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00];

    type Bus = SharedTransport<I2cTransport<MockI2c, MockClock>>;

    fn bus_with(device: MockI2cDevice) -> Bus {
        let mut bus = MockI2c::new();
        bus.add_device(device);
        let i2c = SharedTransport::new(I2cTransport::new("i2c0", bus, MockClock::new()));
        i2c.lock(|t| t.init()).unwrap();
        i2c
    }

    fn sensor() -> MockI2cDevice {
        MockI2cDevice::new(ADDR_PRIMARY)
            .with_register(REG_ID, CHIP_ID)
            .with_registers(REG_CALIB, &CALIB)
            .with_registers(REG_PRESS, &RAW)
    }

    #[test]
    fn test_datasheet_compensation() {
        let cal = Calibration::from_bytes(&CALIB);
        assert_eq!(cal.t1, 27504);
        assert_eq!(cal.t3, -1000);
        assert_eq!(cal.p9, 6000);

        let (centi_c, t_fine) = cal.compensate_temperature(519_888);
        assert_eq!(centi_c, 2508);
        assert_eq!(t_fine, 128_422);
        assert_eq!(cal.compensate_pressure(415_148, t_fine), Some(25_767_233));

        let blank = Calibration::default();
        assert_eq!(blank.compensate_pressure(415_148, t_fine), None);
    }

    #[test]
    fn test_init_and_sample() {
        let i2c = bus_with(sensor());
        let mut bmp = Bmp280::new(I2cDevice::new(&i2c, ADDR_PRIMARY));
        assert!(!bmp.read_data().valid);

        bmp.init().unwrap();
        assert!(bmp.is_initialized());
        assert_eq!(bmp.address(), DeviceAddress::I2c(0x76));
        assert_eq!(bmp.calibration().p1, 36477);

        let sample = bmp.read_data();
        assert!(sample.valid);
        assert_eq!(
            sample.value,
            SampleValue::Environment {
                temperature_c: 25.08,
                pressure_pa: 100_653.25,
            }
        );
        assert!((sample.value.pressure_hpa().unwrap() - 1006.5325).abs() < 1e-3);

        let ctrl = i2c.lock(|t| t.bus().device(ADDR_PRIMARY).map(|d| d.register(REG_CTRL_MEAS)));
        assert_eq!(ctrl, Some(0x2F));
    }

    #[test]
    fn test_wrong_chip_id() {
        let i2c = bus_with(sensor().with_register(REG_ID, 0x60));
        let mut bmp = Bmp280::new(I2cDevice::new(&i2c, ADDR_PRIMARY));
        assert_eq!(bmp.init(), Err(DriverError::IdentificationFailure));
        assert!(!bmp.is_initialized());
    }

    #[test]
    fn test_bus_failure_gives_invalid_sample() {
        let i2c = bus_with(sensor());
        let mut bmp = Bmp280::new(I2cDevice::new(&i2c, ADDR_PRIMARY));
        bmp.init().unwrap();

        i2c.lock(|t| t.bus_mut().fail_next(1, I2cError::Nack));
        assert!(!bmp.read_data().valid);
        assert!(bmp.is_initialized());
        assert!(bmp.read_data().valid);
    }

    #[test]
    fn test_forced_mode_triggers_conversion() {
        let i2c = bus_with(sensor());
        let config = Bmp280Config {
            mode: Mode::Forced,
            ..Bmp280Config::default()
        };
        let mut bmp = Bmp280::with_config(I2cDevice::new(&i2c, ADDR_PRIMARY), config);
        bmp.init().unwrap();
        assert!((bmp.read_temperature().unwrap() - 25.08).abs() < 1e-4);
        let ctrl = i2c.lock(|t| t.bus().device(ADDR_PRIMARY).map(|d| d.register(REG_CTRL_MEAS)));
        assert_eq!(ctrl, Some(0x2D));
    }

    #[test]
    fn test_addresses_and_map() {
        assert!(Bmp280::<I2cDevice<'_, MockI2c, MockClock>>::supports_address(0x77));
        assert!(!Bmp280::<I2cDevice<'_, MockI2c, MockClock>>::supports_address(0x68));
        assert_eq!(validate_map(&REGISTER_MAP), Ok(()));
    }

    #[cfg(feature = "tier1")]
    #[test]
    fn test_parameters() {
        let i2c = bus_with(sensor());
        let mut bmp = Bmp280::new(I2cDevice::new(&i2c, ADDR_PRIMARY));
        assert_eq!(
            bmp.set_parameter("filter", &ParamValue::Int(4)),
            Err(DriverError::NotReady)
        );
        bmp.init().unwrap();

        bmp.set_parameter("filter", &ParamValue::Int(4)).unwrap();
        bmp.set_parameter("standby_ms", &ParamValue::Float(125.0)).unwrap();
        bmp.set_parameter("osrs_p", &ParamValue::Int(16)).unwrap();
        assert_eq!(bmp.get_parameter("filter"), Ok(ParamValue::Int(4)));
        assert_eq!(bmp.get_parameter("mode"), Ok(ParamValue::Text("normal")));

        let device = i2c.lock(|t| t.bus().device(ADDR_PRIMARY).cloned()).unwrap();
        assert_eq!(device.register(REG_CONFIG), (2 << 5) | (2 << 2));
        assert_eq!(device.register(REG_CTRL_MEAS), (1 << 5) | (5 << 2) | 3);

        assert_eq!(
            bmp.set_parameter("filter", &ParamValue::Int(3)),
            Err(DriverError::InvalidArgument)
        );
        assert_eq!(
            bmp.set_parameter("gain", &ParamValue::Int(1)),
            Err(DriverError::InvalidArgument)
        );
        assert_eq!(
            bmp.set_parameter("mode", &ParamValue::Text("turbo")),
            Err(DriverError::InvalidArgument)
        );
    }

    #[cfg(feature = "tier2")]
    #[test]
    fn test_register_access() {
        let i2c = bus_with(sensor());
        let mut bmp = Bmp280::new(I2cDevice::new(&i2c, ADDR_PRIMARY));
        let mut buf = [0u8; 1];
        assert_eq!(bmp.reg_read(0xD0, &mut buf), Err(DriverError::NotReady));
        bmp.init().unwrap();

        bmp.reg_read(0xD0, &mut buf).unwrap();
        assert_eq!(buf[0], CHIP_ID);
        assert_eq!(bmp.reg_write(0xD0, &[0]), Err(DriverError::AccessViolation));
        assert_eq!(bmp.reg_read(0xE0, &mut buf), Err(DriverError::AccessViolation));

        let mut word = [0u8; 2];
        bmp.reg_read(0x88, &mut word).unwrap();
        assert_eq!(word, [0x70, 0x6B]);
        let mut wide = [0u8; 3];
        assert_eq!(bmp.reg_read(0x88, &mut wide), Err(DriverError::BufferOverflow));
        assert_eq!(bmp.find_register_by_name("ctrl_meas").map(|d| d.addr), Some(0xF4));
    }

    #[test]
    fn test_schema_tracks_tier() {
        let i2c = bus_with(sensor());
        let bmp = Bmp280::new(I2cDevice::new(&i2c, ADDR_PRIMARY));
        let schema = bmp.schema();
        assert!(schema.find_signal("pressure").is_some());
        assert_eq!(schema.find_setting("mode").is_some(), cfg!(feature = "tier1"));
        assert_eq!(schema.find_command("reg_read").is_some(), cfg!(feature = "tier2"));
    }
}
