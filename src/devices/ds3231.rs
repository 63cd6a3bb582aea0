//! DS3231 temperature-compensated real-time clock
//!
//! The time registers hold BCD. The chip has no id register, so
//! identification checks that the seven time registers decode to a valid
//! calendar value; an empty bus or a different chip at 0x68 fails that check
//! in practice.

use super::bus::RegisterBus;
use super::registers::{Access, RegisterDescriptor};
use super::schema::{CapabilitySchema, Command, Setting, Signal, ValueType};
use super::{
    DateTime, DeviceAddress, Driver, DriverError, DriverState, I2cAddressed, Sample, SampleValue,
    TIER1, TIER2,
};

#[cfg(feature = "tier1")]
use super::schema::{check_settable, ParamValue};
#[cfg(feature = "tier1")]
use super::Configurable;
#[cfg(feature = "tier2")]
use super::RegisterAccess;

const DRIVER_ID: &str = "ds3231";

/// Fixed bus address
pub const ADDRESS: u8 = 0x68;

const REG_SECONDS: u8 = 0x00;
#[cfg(feature = "tier1")]
const REG_ALARM1: u8 = 0x07;
const REG_CONTROL: u8 = 0x0E;
const REG_STATUS: u8 = 0x0F;
#[cfg(feature = "tier1")]
const REG_AGING: u8 = 0x10;

const CONTROL_EOSC: u8 = 0x80;
#[cfg(feature = "tier1")]
const CONTROL_CONV: u8 = 0x20;
const CONTROL_RS_MASK: u8 = 0x18;
const CONTROL_INTCN: u8 = 0x04;
#[cfg(feature = "tier1")]
const CONTROL_A1IE: u8 = 0x01;

const STATUS_OSF: u8 = 0x80;
const STATUS_A1F: u8 = 0x01;

const HOUR_12H: u8 = 0x40;
const HOUR_PM: u8 = 0x20;
const MONTH_CENTURY: u8 = 0x80;

pub static REGISTER_MAP: [RegisterDescriptor; 19] = [
    RegisterDescriptor::new(0x00, "SECONDS", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x01, "MINUTES", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x02, "HOURS", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x03, "DAY", 1, Access::ReadWrite, 0x01),
    RegisterDescriptor::new(0x04, "DATE", 1, Access::ReadWrite, 0x01),
    RegisterDescriptor::new(0x05, "MONTH", 1, Access::ReadWrite, 0x01),
    RegisterDescriptor::new(0x06, "YEAR", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x07, "A1_SECONDS", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x08, "A1_MINUTES", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x09, "A1_HOURS", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x0A, "A1_DAY_DATE", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x0B, "A2_MINUTES", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x0C, "A2_HOURS", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x0D, "A2_DAY_DATE", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x0E, "CONTROL", 1, Access::ReadWrite, 0x1C),
    RegisterDescriptor::new(0x0F, "STATUS", 1, Access::ReadWrite, 0x88),
    RegisterDescriptor::new(0x10, "AGING", 1, Access::ReadWrite, 0),
    RegisterDescriptor::new(0x11, "TEMP_MSB", 1, Access::ReadOnly, 0),
    RegisterDescriptor::new(0x12, "TEMP_LSB", 1, Access::ReadOnly, 0),
];

static SCHEMA: CapabilitySchema = CapabilitySchema {
    settings: &[
        Setting::new("sqw", ValueType::Enum).writable().active(TIER1),
        Setting::new("aging", ValueType::Int)
            .writable()
            .range(-128.0, 127.0, 1.0)
            .active(TIER1),
        Setting::new("osf", ValueType::Bool).active(TIER1),
    ],
    signals: &[
        Signal::new("time", ValueType::String),
        Signal::new("temperature", ValueType::Float).units("°C"),
        Signal::new("alarm1", ValueType::Event).active(TIER1),
    ],
    commands: &[
        Command::new("set_time", "datetime:string").active(TIER1),
        Command::new("set_alarm1", "match:enum datetime:string").active(TIER1),
        Command::new("reg_read", "addr:int len:int").active(TIER2),
        Command::new("reg_write", "addr:int data:blob").active(TIER2),
    ],
};

// ============================================================================
// BCD
// ============================================================================

fn bcd_to_bin(value: u8) -> Option<u8> {
    let (hi, lo) = (value >> 4, value & 0x0F);
    if hi > 9 || lo > 9 {
        return None;
    }
    Some(hi * 10 + lo)
}

fn bin_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

fn decode_hours(raw: u8) -> Option<u8> {
    if raw & HOUR_12H != 0 {
        let hour = bcd_to_bin(raw & 0x1F)?;
        if !(1..=12).contains(&hour) {
            return None;
        }
        let pm = raw & HOUR_PM != 0;
        Some(hour % 12 + if pm { 12 } else { 0 })
    } else {
        bcd_to_bin(raw & 0x3F).filter(|h| *h < 24)
    }
}

/// Decode registers 0x00..=0x06
pub fn decode_time(raw: &[u8; 7]) -> Option<DateTime> {
    let time = DateTime {
        second: bcd_to_bin(raw[0] & 0x7F)?,
        minute: bcd_to_bin(raw[1] & 0x7F)?,
        hour: decode_hours(raw[2])?,
        weekday: raw[3] & 0x07,
        day: bcd_to_bin(raw[4] & 0x3F)?,
        month: bcd_to_bin(raw[5] & 0x1F)?,
        year: 2000
            + u16::from(bcd_to_bin(raw[6])?)
            + if raw[5] & MONTH_CENTURY != 0 { 100 } else { 0 },
    };
    is_valid_time(&time).then_some(time)
}

/// Encode a time for registers 0x00..=0x06, 24-hour mode
pub fn encode_time(time: &DateTime) -> Option<[u8; 7]> {
    if !is_valid_time(time) {
        return None;
    }
    let century = time.year >= 2100;
    let year = (time.year - if century { 2100 } else { 2000 }) as u8;
    Some([
        bin_to_bcd(time.second),
        bin_to_bcd(time.minute),
        bin_to_bcd(time.hour),
        time.weekday,
        bin_to_bcd(time.day),
        bin_to_bcd(time.month) | if century { MONTH_CENTURY } else { 0 },
        bin_to_bcd(year),
    ])
}

fn is_valid_time(time: &DateTime) -> bool {
    (2000..=2199).contains(&time.year)
        && (1..=12).contains(&time.month)
        && (1..=31).contains(&time.day)
        && (1..=7).contains(&time.weekday)
        && time.hour < 24
        && time.minute < 60
        && time.second < 60
}

/// Die temperature from registers 0x11 and 0x12, 0.25 °C steps
fn decode_temperature(msb: u8, lsb: u8) -> f32 {
    let quarters = (i16::from(msb as i8) << 2) | i16::from(lsb >> 6);
    f32::from(quarters) * 0.25
}

// ============================================================================
// Configuration types
// ============================================================================

/// Output of the INT/SQW pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SquareWave {
    /// Pin reports alarms
    Off,
    Hz1,
    Hz1024,
    Hz4096,
    Hz8192,
}

impl SquareWave {
    pub const fn as_str(self) -> &'static str {
        match self {
            SquareWave::Off => "off",
            SquareWave::Hz1 => "1hz",
            SquareWave::Hz1024 => "1024hz",
            SquareWave::Hz4096 => "4096hz",
            SquareWave::Hz8192 => "8192hz",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            SquareWave::Off,
            SquareWave::Hz1,
            SquareWave::Hz1024,
            SquareWave::Hz4096,
            SquareWave::Hz8192,
        ]
        .into_iter()
        .find(|s| s.as_str() == name)
    }

    /// INTCN and RS bits of the control register
    #[cfg(feature = "tier1")]
    fn control_bits(self) -> u8 {
        match self {
            SquareWave::Off => CONTROL_INTCN,
            SquareWave::Hz1 => 0x00,
            SquareWave::Hz1024 => 0x08,
            SquareWave::Hz4096 => 0x10,
            SquareWave::Hz8192 => 0x18,
        }
    }

    fn from_control(control: u8) -> Self {
        if control & CONTROL_INTCN != 0 {
            return SquareWave::Off;
        }
        match control & CONTROL_RS_MASK {
            0x00 => SquareWave::Hz1,
            0x08 => SquareWave::Hz1024,
            0x10 => SquareWave::Hz4096,
            _ => SquareWave::Hz8192,
        }
    }
}

/// Fields compared by alarm 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmMatch {
    /// Fires every second
    EverySecond,
    Second,
    MinuteSecond,
    HourMinuteSecond,
    /// Day of month, hour, minute and second
    DateTime,
    /// Day of week, hour, minute and second
    WeekdayTime,
}

#[cfg(feature = "tier1")]
impl AlarmMatch {
    /// A1M1..A1M4 mask bits, bit 0 = A1M1
    fn mask_bits(self) -> u8 {
        match self {
            AlarmMatch::EverySecond => 0b1111,
            AlarmMatch::Second => 0b1110,
            AlarmMatch::MinuteSecond => 0b1100,
            AlarmMatch::HourMinuteSecond => 0b1000,
            AlarmMatch::DateTime | AlarmMatch::WeekdayTime => 0b0000,
        }
    }
}

/// Alarm 1 setting; `day` is the date or weekday depending on the match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alarm1 {
    pub matching: AlarmMatch,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

#[cfg(feature = "tier1")]
impl Alarm1 {
    fn encode(&self) -> Option<[u8; 4]> {
        let day_ok = match self.matching {
            AlarmMatch::WeekdayTime => (1..=7).contains(&self.day),
            AlarmMatch::DateTime => (1..=31).contains(&self.day),
            _ => self.day <= 31,
        };
        if !day_ok || self.hour >= 24 || self.minute >= 60 || self.second >= 60 {
            return None;
        }
        let mask = self.matching.mask_bits();
        let bit = |n: u8| if mask & (1 << n) != 0 { 0x80 } else { 0x00 };
        let dy = if self.matching == AlarmMatch::WeekdayTime { 0x40 } else { 0x00 };
        Some([
            bin_to_bcd(self.second) | bit(0),
            bin_to_bcd(self.minute) | bit(1),
            bin_to_bcd(self.hour) | bit(2),
            bin_to_bcd(self.day) | dy | bit(3),
        ])
    }
}

// ============================================================================
// Driver
// ============================================================================

pub struct Ds3231<R> {
    bus: R,
    square_wave: SquareWave,
    aging: i8,
    oscillator_stopped: bool,
    state: DriverState,
}

impl<R: RegisterBus> Ds3231<R> {
    pub fn new(bus: R) -> Self {
        Self {
            bus,
            square_wave: SquareWave::Off,
            aging: 0,
            oscillator_stopped: false,
            state: DriverState::new(),
        }
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn release(self) -> R {
        self.bus
    }

    /// Oscillator-stop flag seen by the last `init` or read
    ///
    /// Set when the clock lost power; the time is not trustworthy until it is
    /// set again.
    pub fn oscillator_stopped(&self) -> bool {
        self.oscillator_stopped
    }

    pub fn square_wave(&self) -> SquareWave {
        self.square_wave
    }

    /// Aging trim in register units
    pub fn aging_offset(&self) -> i8 {
        self.aging
    }

    fn read_time_regs(&mut self) -> Result<[u8; 7], DriverError> {
        let mut raw = [0u8; 7];
        self.bus.read_regs(REG_SECONDS, &mut raw)?;
        Ok(raw)
    }

    /// Current date and time
    pub fn read_time(&mut self) -> Result<DateTime, DriverError> {
        self.state.ensure_ready()?;
        let result = self
            .read_time_regs()
            .and_then(|raw| decode_time(&raw).ok_or(DriverError::InvalidArgument));
        self.state.record(result)
    }

    fn sample(&mut self) -> Result<SampleValue, DriverError> {
        let time = self.read_time()?;
        // STATUS, AGING, TEMP_MSB, TEMP_LSB
        let mut tail = [0u8; 4];
        let result = self.bus.read_regs(REG_STATUS, &mut tail).map_err(DriverError::from);
        self.state.record(result)?;
        self.oscillator_stopped = tail[0] & STATUS_OSF != 0;
        Ok(SampleValue::Clock {
            time,
            temperature_c: decode_temperature(tail[2], tail[3]),
        })
    }

    /// Whether alarm 1 has fired since it was last cleared
    pub fn alarm1_fired(&mut self) -> Result<bool, DriverError> {
        self.state.ensure_ready()?;
        let result = self.bus.read_reg(REG_STATUS).map_err(DriverError::from);
        Ok(self.state.record(result)? & STATUS_A1F != 0)
    }

    pub fn clear_alarm1(&mut self) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        let result = self.bus.update_reg(REG_STATUS, STATUS_A1F, 0).map_err(DriverError::from);
        self.state.record(result)
    }
}

#[cfg(feature = "tier1")]
impl<R: RegisterBus> Ds3231<R> {
    /// Set the clock and clear the oscillator-stop flag
    pub fn set_time(&mut self, time: &DateTime) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        let raw = encode_time(time).ok_or(DriverError::InvalidArgument)?;
        let result = self
            .bus
            .write_regs(REG_SECONDS, &raw)
            .and_then(|()| self.bus.update_reg(REG_STATUS, STATUS_OSF, 0))
            .map_err(DriverError::from);
        if result.is_ok() {
            self.oscillator_stopped = false;
            log_info!(
                "{}: time set to {}-{}-{} {}:{}:{}",
                DRIVER_ID,
                time.year,
                time.month,
                time.day,
                time.hour,
                time.minute,
                time.second
            );
        }
        self.state.record(result)
    }

    /// Program and enable alarm 1 on the INT pin
    ///
    /// The alarm interrupt is disabled while the match registers change and
    /// the pending flag is cleared before it is enabled again. Enabling the
    /// interrupt turns the square wave off.
    pub fn set_alarm1(&mut self, alarm: &Alarm1) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        let raw = alarm.encode().ok_or(DriverError::InvalidArgument)?;
        let result = self
            .bus
            .update_reg(REG_CONTROL, CONTROL_A1IE, 0)
            .and_then(|()| self.bus.write_regs(REG_ALARM1, &raw))
            .and_then(|()| self.bus.update_reg(REG_STATUS, STATUS_A1F, 0))
            .and_then(|()| {
                self.bus.update_reg(
                    REG_CONTROL,
                    CONTROL_INTCN | CONTROL_A1IE,
                    CONTROL_INTCN | CONTROL_A1IE,
                )
            })
            .map_err(DriverError::from);
        if result.is_ok() {
            self.square_wave = SquareWave::Off;
        }
        self.state.record(result)
    }

    /// Select the INT/SQW pin output
    pub fn set_square_wave(&mut self, rate: SquareWave) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        let result = self
            .bus
            .update_reg(REG_CONTROL, CONTROL_INTCN | CONTROL_RS_MASK, rate.control_bits())
            .map_err(DriverError::from);
        if result.is_ok() {
            self.square_wave = rate;
            log_debug!("{}: sqw {}", DRIVER_ID, rate.as_str());
        }
        self.state.record(result)
    }

    /// Write the aging trim and start a conversion so it takes effect
    pub fn set_aging_offset(&mut self, offset: i8) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        let result = self
            .bus
            .write_reg(REG_AGING, offset as u8)
            .and_then(|()| self.bus.update_reg(REG_CONTROL, CONTROL_CONV, CONTROL_CONV))
            .map_err(DriverError::from);
        if result.is_ok() {
            self.aging = offset;
        }
        self.state.record(result)
    }
}

impl<R: RegisterBus> Driver for Ds3231<R> {
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
        let raw = self.read_time_regs()?;
        if decode_time(&raw).is_none() {
            log_error!("{}: time registers are not valid BCD", DRIVER_ID);
            return Err(DriverError::IdentificationFailure);
        }

        // CONTROL, STATUS, AGING
        let mut regs = [0u8; 3];
        self.bus.read_regs(REG_CONTROL, &mut regs)?;
        if regs[0] & CONTROL_EOSC != 0 {
            self.bus.update_reg(REG_CONTROL, CONTROL_EOSC, 0)?;
        }
        self.square_wave = SquareWave::from_control(regs[0]);
        self.oscillator_stopped = regs[1] & STATUS_OSF != 0;
        self.aging = regs[2] as i8;
        if self.oscillator_stopped {
            log_warn!("{}: oscillator stopped, time needs to be set", DRIVER_ID);
        }

        self.state.set_initialized(true);
        log_info!("{}: ready", DRIVER_ID);
        Ok(())
    }

    /// Timekeeping continues on the backup supply
    fn deinit(&mut self) {
        self.state.set_initialized(false);
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    fn read_data(&mut self) -> Sample {
        self.sample().into()
    }

    fn schema(&self) -> &'static CapabilitySchema {
        &SCHEMA
    }
}

impl<R> I2cAddressed for Ds3231<R> {
    fn valid_addresses() -> &'static [u8] {
        &[ADDRESS]
    }
}

#[cfg(feature = "tier1")]
impl<R: RegisterBus> Configurable for Ds3231<R> {
    fn get_parameter(&self, name: &str) -> Result<ParamValue<'static>, DriverError> {
        match name {
            "sqw" => Ok(ParamValue::Text(self.square_wave.as_str())),
            "aging" => Ok(ParamValue::Int(i32::from(self.aging))),
            "osf" => Ok(ParamValue::Bool(self.oscillator_stopped)),
            _ => Err(DriverError::InvalidArgument),
        }
    }

    fn set_parameter(&mut self, name: &str, value: &ParamValue<'_>) -> Result<(), DriverError> {
        check_settable(&SCHEMA, name, value)?;
        match name {
            "sqw" => {
                let rate = value
                    .as_text()
                    .and_then(SquareWave::from_name)
                    .ok_or(DriverError::InvalidArgument)?;
                self.set_square_wave(rate)
            }
            "aging" => {
                let offset = value
                    .as_i32()
                    .and_then(|v| i8::try_from(v).ok())
                    .ok_or(DriverError::InvalidArgument)?;
                self.set_aging_offset(offset)
            }
            _ => Err(DriverError::InvalidArgument),
        }
    }
}

#[cfg(feature = "tier2")]
impl<R: RegisterBus> RegisterAccess for Ds3231<R> {
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
    use crate::platform::mock::{MockClock, MockI2c, MockI2cDevice};
    use crate::transport::{I2cTransport, SharedTransport, Transport};

    type Bus = SharedTransport<I2cTransport<MockI2c, MockClock>>;

    /// Saturday 2024-06-15 12:45:30, 25.25 °C, oscillator stopped
    fn rtc() -> MockI2cDevice {
        MockI2cDevice::new(ADDRESS)
            .with_registers(0x00, &[0x30, 0x45, 0x12, 0x06, 0x15, 0x06, 0x24])
            .with_registers(0x0E, &[0x1C, 0x88, 0x00, 0x19, 0x40])
    }

    fn bus_with(device: MockI2cDevice) -> Bus {
        let mut bus = MockI2c::new();
        bus.add_device(device);
        let i2c = SharedTransport::new(I2cTransport::new("i2c0", bus, MockClock::new()));
        i2c.lock(|t| t.init()).unwrap();
        i2c
    }

    fn register(i2c: &Bus, reg: u8) -> u8 {
        i2c.lock(|t| t.bus().device(ADDRESS).map(|d| d.register(reg))).unwrap_or(0)
    }

    #[test]
    fn test_bcd_helpers() {
        assert_eq!(bcd_to_bin(0x59), Some(59));
        assert_eq!(bcd_to_bin(0x5A), None);
        assert_eq!(bin_to_bcd(47), 0x47);
        // 12-hour mode, 11 PM
        assert_eq!(decode_hours(0x40 | 0x20 | 0x11), Some(23));
        // 12 AM is midnight
        assert_eq!(decode_hours(0x40 | 0x12), Some(0));
        assert_eq!(decode_hours(0x24), None);
        assert_eq!(decode_temperature(0xFE, 0x40), -1.75);
    }

    #[test]
    fn test_time_codec_century() {
        let time = DateTime {
            year: 2105,
            month: 12,
            day: 31,
            weekday: 1,
            hour: 23,
            minute: 59,
            second: 58,
        };
        let raw = encode_time(&time).unwrap();
        assert_eq!(raw, [0x58, 0x59, 0x23, 0x01, 0x31, 0x92, 0x05]);
        assert_eq!(decode_time(&raw), Some(time));
        assert_eq!(encode_time(&DateTime { month: 13, ..time }), None);
    }

    #[test]
    fn test_init_and_sample() {
        let i2c = bus_with(rtc());
        let mut clock = Ds3231::new(I2cDevice::new(&i2c, ADDRESS));
        clock.init().unwrap();
        assert!(clock.oscillator_stopped());
        assert_eq!(clock.square_wave(), SquareWave::Off);

        let sample = clock.read_data();
        assert_eq!(
            sample,
            Sample::new(SampleValue::Clock {
                time: DateTime {
                    year: 2024,
                    month: 6,
                    day: 15,
                    weekday: 6,
                    hour: 12,
                    minute: 45,
                    second: 30,
                },
                temperature_c: 25.25,
            })
        );
    }

    #[test]
    fn test_invalid_bcd_fails_identification() {
        let i2c = bus_with(rtc().with_register(0x01, 0x7F));
        let mut clock = Ds3231::new(I2cDevice::new(&i2c, ADDRESS));
        assert_eq!(clock.init(), Err(DriverError::IdentificationFailure));
        assert!(!clock.is_initialized());
    }

    #[test]
    fn test_init_restarts_stopped_oscillator() {
        let i2c = bus_with(rtc().with_register(0x0E, 0x9C));
        let mut clock = Ds3231::new(I2cDevice::new(&i2c, ADDRESS));
        clock.init().unwrap();
        assert_eq!(register(&i2c, 0x0E), 0x1C);
    }

    #[test]
    fn test_alarm_flag() {
        let i2c = bus_with(rtc().with_register(0x0F, 0x89));
        let mut clock = Ds3231::new(I2cDevice::new(&i2c, ADDRESS));
        assert_eq!(clock.alarm1_fired(), Err(DriverError::NotReady));
        clock.init().unwrap();
        assert_eq!(clock.alarm1_fired(), Ok(true));
        clock.clear_alarm1().unwrap();
        assert_eq!(clock.alarm1_fired(), Ok(false));
        assert_eq!(register(&i2c, 0x0F), 0x88);
    }

    #[test]
    fn test_map() {
        assert_eq!(validate_map(&REGISTER_MAP), Ok(()));
    }

    #[cfg(feature = "tier1")]
    #[test]
    fn test_set_time_clears_osf() {
        let i2c = bus_with(rtc());
        let mut clock = Ds3231::new(I2cDevice::new(&i2c, ADDRESS));
        clock.init().unwrap();
        assert_eq!(clock.get_parameter("osf"), Ok(ParamValue::Bool(true)));

        let time = DateTime {
            year: 2025,
            month: 1,
            day: 2,
            weekday: 4,
            hour: 3,
            minute: 4,
            second: 5,
        };
        clock.set_time(&time).unwrap();
        assert_eq!(clock.read_time(), Ok(time));
        assert_eq!(register(&i2c, 0x0F), 0x08);
        assert_eq!(clock.get_parameter("osf"), Ok(ParamValue::Bool(false)));
        assert_eq!(
            clock.set_parameter("osf", &ParamValue::Bool(true)),
            Err(DriverError::AccessViolation)
        );
    }

    #[cfg(feature = "tier1")]
    #[test]
    fn test_alarm_and_square_wave() {
        let i2c = bus_with(rtc());
        let mut clock = Ds3231::new(I2cDevice::new(&i2c, ADDRESS));
        clock.init().unwrap();

        clock.set_parameter("sqw", &ParamValue::Text("1024hz")).unwrap();
        assert_eq!(register(&i2c, 0x0E), 0x08);
        assert_eq!(clock.get_parameter("sqw"), Ok(ParamValue::Text("1024hz")));

        let alarm = Alarm1 {
            matching: AlarmMatch::HourMinuteSecond,
            day: 0,
            hour: 7,
            minute: 30,
            second: 0,
        };
        clock.set_alarm1(&alarm).unwrap();
        let a1 = i2c.lock(|t| {
            t.bus()
                .device(ADDRESS)
                .map(|d| [d.register(0x07), d.register(0x08), d.register(0x09), d.register(0x0A)])
        });
        assert_eq!(a1, Some([0x00, 0x30, 0x07, 0x80]));
        assert_eq!(register(&i2c, 0x0E), 0x0D);
        assert_eq!(clock.square_wave(), SquareWave::Off);

        let bad = Alarm1 { hour: 24, ..alarm };
        assert_eq!(clock.set_alarm1(&bad), Err(DriverError::InvalidArgument));
    }

    #[cfg(feature = "tier1")]
    #[test]
    fn test_aging_offset() {
        let i2c = bus_with(rtc());
        let mut clock = Ds3231::new(I2cDevice::new(&i2c, ADDRESS));
        clock.init().unwrap();
        clock.set_parameter("aging", &ParamValue::Int(-3)).unwrap();
        assert_eq!(register(&i2c, 0x10), 0xFD);
        assert_eq!(register(&i2c, 0x0E) & 0x20, 0x20);
        assert_eq!(
            clock.set_parameter("aging", &ParamValue::Int(200)),
            Err(DriverError::InvalidArgument)
        );
    }

    #[cfg(feature = "tier2")]
    #[test]
    fn test_temperature_registers_are_read_only() {
        let i2c = bus_with(rtc());
        let mut clock = Ds3231::new(I2cDevice::new(&i2c, ADDRESS));
        clock.init().unwrap();
        assert_eq!(clock.reg_write(0x11, &[0]), Err(DriverError::AccessViolation));
        let mut buf = [0u8; 1];
        clock.reg_read(0x11, &mut buf).unwrap();
        assert_eq!(buf[0], 0x19);
    }
}
