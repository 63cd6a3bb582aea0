//! TCA9555 16-bit I2C I/O expander
//!
//! Port 0 is the low byte and port 1 the high byte of every 16-bit value.
//! A set direction bit makes the pin an input, matching the chip's
//! configuration register.

use super::bus::RegisterBus;
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

const DRIVER_ID: &str = "tca9555";

const REG_INPUT: u8 = 0x00;
const REG_OUTPUT: u8 = 0x02;
const REG_POLARITY: u8 = 0x04;
const REG_CONFIG: u8 = 0x06;

/// Pattern written to the polarity register during identification
const PROBE_PATTERN: u8 = 0xA5;

/// Number of I/O pins
pub const PIN_COUNT: u8 = 16;

pub static REGISTER_MAP: [RegisterDescriptor; 8] = [
    RegisterDescriptor::new(0x00, "INPUT0", 1, Access::ReadOnly, 0xFF),
    RegisterDescriptor::new(0x01, "INPUT1", 1, Access::ReadOnly, 0xFF),
    RegisterDescriptor::new(0x02, "OUTPUT0", 1, Access::ReadWrite, 0xFF),
    RegisterDescriptor::new(0x03, "OUTPUT1", 1, Access::ReadWrite, 0xFF),
    RegisterDescriptor::new(0x04, "POLARITY0", 1, Access::ReadWrite, 0x00),
    RegisterDescriptor::new(0x05, "POLARITY1", 1, Access::ReadWrite, 0x00),
    RegisterDescriptor::new(0x06, "CONFIG0", 1, Access::ReadWrite, 0xFF),
    RegisterDescriptor::new(0x07, "CONFIG1", 1, Access::ReadWrite, 0xFF),
];

static SCHEMA: CapabilitySchema = CapabilitySchema {
    settings: &[
        Setting::new("direction", ValueType::Int)
            .writable()
            .range(0.0, 65535.0, 1.0)
            .active(TIER1),
        Setting::new("polarity", ValueType::Int)
            .writable()
            .range(0.0, 65535.0, 1.0)
            .active(TIER1),
        Setting::new("outputs", ValueType::Int)
            .writable()
            .range(0.0, 65535.0, 1.0)
            .active(TIER1),
    ],
    signals: &[Signal::new("inputs", ValueType::Int)],
    commands: &[
        Command::new("write_outputs", "value:int"),
        Command::new("reg_read", "addr:int len:int").active(TIER2),
        Command::new("reg_write", "addr:int data:blob").active(TIER2),
    ],
};

/// Pin setup applied during `init`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tca9555Config {
    /// Bit set = input
    pub direction: u16,
    /// Bit set = inverted input
    pub polarity: u16,
    /// Output latch
    pub outputs: u16,
}

impl Default for Tca9555Config {
    /// Power-on state of the chip
    fn default() -> Self {
        Self {
            direction: 0xFFFF,
            polarity: 0x0000,
            outputs: 0xFFFF,
        }
    }
}

pub struct Tca9555<R> {
    bus: R,
    config: Tca9555Config,
    state: DriverState,
}

impl<R: RegisterBus> Tca9555<R> {
    pub fn new(bus: R) -> Self {
        Self::with_config(bus, Tca9555Config::default())
    }

    pub fn with_config(bus: R, config: Tca9555Config) -> Self {
        Self {
            bus,
            config,
            state: DriverState::new(),
        }
    }

    pub fn config(&self) -> &Tca9555Config {
        &self.config
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn release(self) -> R {
        self.bus
    }

    fn read_pair(&mut self, reg: u8) -> Result<u16, DriverError> {
        let mut raw = [0u8; 2];
        self.bus.read_regs(reg, &mut raw)?;
        Ok(u16::from_le_bytes(raw))
    }

    fn write_pair(&mut self, reg: u8, value: u16) -> Result<(), DriverError> {
        self.bus.write_regs(reg, &value.to_le_bytes())?;
        Ok(())
    }

    /// Scratch write to the polarity register and read it back
    fn identify(&mut self) -> Result<(), DriverError> {
        let saved = self.bus.read_reg(REG_POLARITY)?;
        self.bus.write_reg(REG_POLARITY, PROBE_PATTERN)?;
        // Restore before judging the echo, even if the read-back failed
        let echoed = self.bus.read_reg(REG_POLARITY);
        let restored = self.bus.write_reg(REG_POLARITY, saved);
        let echoed = echoed?;
        restored?;
        if echoed != PROBE_PATTERN {
            log_error!("{}: polarity register echoed {:#x}", DRIVER_ID, echoed);
            return Err(DriverError::IdentificationFailure);
        }
        Ok(())
    }

    /// Make every pin an input, write latch and polarity, then the directions
    fn apply(&mut self, config: &Tca9555Config) -> Result<(), DriverError> {
        self.write_pair(REG_CONFIG, 0xFFFF)?;
        self.write_pair(REG_OUTPUT, config.outputs)?;
        self.write_pair(REG_POLARITY, config.polarity)?;
        self.write_pair(REG_CONFIG, config.direction)
    }

    /// Input port levels after polarity inversion
    pub fn read_inputs(&mut self) -> Result<u16, DriverError> {
        self.state.ensure_ready()?;
        let result = self.read_pair(REG_INPUT);
        self.state.record(result)
    }

    /// Set the output latch of both ports
    pub fn write_outputs(&mut self, value: u16) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        let result = self.write_pair(REG_OUTPUT, value);
        if result.is_ok() {
            self.config.outputs = value;
        }
        self.state.record(result)
    }

    /// Drive one output pin
    pub fn set_pin(&mut self, pin: u8, high: bool) -> Result<(), DriverError> {
        if pin >= PIN_COUNT {
            return Err(DriverError::InvalidArgument);
        }
        let mask = 1u16 << pin;
        let value = if high {
            self.config.outputs | mask
        } else {
            self.config.outputs & !mask
        };
        self.write_outputs(value)
    }

    /// Level of one input pin
    pub fn read_pin(&mut self, pin: u8) -> Result<bool, DriverError> {
        if pin >= PIN_COUNT {
            return Err(DriverError::InvalidArgument);
        }
        Ok(self.read_inputs()? & (1 << pin) != 0)
    }
}

#[cfg(feature = "tier1")]
impl<R: RegisterBus> Tca9555<R> {
    fn reconfigure<F: FnOnce(&mut Tca9555Config)>(&mut self, change: F) -> Result<(), DriverError> {
        self.state.ensure_ready()?;
        let mut next = self.config;
        change(&mut next);
        let result = self.apply(&next);
        if result.is_ok() {
            self.config = next;
            log_debug!(
                "{}: direction {:#x} polarity {:#x}",
                DRIVER_ID,
                next.direction,
                next.polarity
            );
        }
        self.state.record(result)
    }

    /// Pin directions, bit set = input
    pub fn set_direction(&mut self, inputs: u16) -> Result<(), DriverError> {
        self.reconfigure(|c| c.direction = inputs)
    }

    /// Input inversion, bit set = inverted
    pub fn set_polarity(&mut self, inverted: u16) -> Result<(), DriverError> {
        self.reconfigure(|c| c.polarity = inverted)
    }
}

impl<R: RegisterBus> Driver for Tca9555<R> {
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
        self.identify()?;
        let config = self.config;
        self.apply(&config)?;
        self.state.set_initialized(true);
        log_info!("{}: ready, direction {:#x}", DRIVER_ID, config.direction);
        Ok(())
    }

    /// Leaves every pin as an input
    fn deinit(&mut self) {
        if self.state.is_initialized() {
            let _ = self.write_pair(REG_CONFIG, 0xFFFF);
        }
        self.state.set_initialized(false);
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    fn read_data(&mut self) -> Sample {
        self.read_inputs().map(|inputs| SampleValue::Digital { inputs }).into()
    }

    fn schema(&self) -> &'static CapabilitySchema {
        &SCHEMA
    }
}

impl<R> I2cAddressed for Tca9555<R> {
    fn valid_addresses() -> &'static [u8] {
        &[0x20, 0x21, 0x22, 0x23, 0x24, 0x25, 0x26, 0x27]
    }
}

#[cfg(feature = "tier1")]
impl<R: RegisterBus> Configurable for Tca9555<R> {
    fn get_parameter(&self, name: &str) -> Result<ParamValue<'static>, DriverError> {
        let value = match name {
            "direction" => self.config.direction,
            "polarity" => self.config.polarity,
            "outputs" => self.config.outputs,
            _ => return Err(DriverError::InvalidArgument),
        };
        Ok(ParamValue::Int(i32::from(value)))
    }

    fn set_parameter(&mut self, name: &str, value: &ParamValue<'_>) -> Result<(), DriverError> {
        check_settable(&SCHEMA, name, value)?;
        let bits = value
            .as_i32()
            .and_then(|v| u16::try_from(v).ok())
            .ok_or(DriverError::InvalidArgument)?;
        match name {
            "direction" => self.set_direction(bits),
            "polarity" => self.set_polarity(bits),
            "outputs" => self.write_outputs(bits),
            _ => Err(DriverError::InvalidArgument),
        }
    }
}

#[cfg(feature = "tier2")]
impl<R: RegisterBus> RegisterAccess for Tca9555<R> {
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
    use crate::transport::{I2cTransport, SharedTransport, Transport, TransportError};

    type Bus = SharedTransport<I2cTransport<MockI2c, MockClock>>;

    fn expander() -> MockI2cDevice {
        MockI2cDevice::new(0x20)
            .with_registers(REG_INPUT, &[0x0F, 0x80])
            .with_read_only(0x00)
            .with_read_only(0x01)
            .with_registers(REG_OUTPUT, &[0xFF, 0xFF])
            .with_registers(REG_CONFIG, &[0xFF, 0xFF])
    }

    fn bus_with(device: MockI2cDevice) -> Bus {
        let mut bus = MockI2c::new();
        bus.add_device(device);
        let i2c = SharedTransport::new(I2cTransport::new("i2c0", bus, MockClock::new()));
        i2c.lock(|t| t.init()).unwrap();
        i2c
    }

    fn chip(i2c: &Bus) -> MockI2cDevice {
        i2c.lock(|t| t.bus().device(0x20).cloned()).unwrap()
    }

    #[test]
    fn test_init_applies_config() {
        let i2c = bus_with(expander());
        let config = Tca9555Config {
            direction: 0xFF00,
            polarity: 0x0000,
            outputs: 0x00A5,
        };
        let mut io = Tca9555::with_config(I2cDevice::new(&i2c, 0x20), config);
        io.init().unwrap();

        let dev = chip(&i2c);
        assert_eq!(dev.register(0x02), 0xA5);
        assert_eq!(dev.register(0x03), 0x00);
        assert_eq!(dev.register(0x06), 0x00);
        assert_eq!(dev.register(0x07), 0xFF);
        assert_eq!(dev.register(0x04), 0x00);
    }

    #[test]
    fn test_identification() {
        let i2c = bus_with(expander().with_read_only(REG_POLARITY));
        let mut io = Tca9555::new(I2cDevice::new(&i2c, 0x20));
        assert_eq!(io.init(), Err(DriverError::IdentificationFailure));
        assert!(!io.is_initialized());

        let mut absent = Tca9555::new(I2cDevice::new(&i2c, 0x27));
        assert_eq!(absent.init(), Err(DriverError::Bus(TransportError::Nack)));
    }

    /// Fails the `nth` read of `reg` (counted from one)
    struct FailingRead<B> {
        inner: B,
        reg: u8,
        nth: u32,
        seen: u32,
    }

    impl<B: RegisterBus> RegisterBus for FailingRead<B> {
        fn location(&self) -> DeviceAddress {
            self.inner.location()
        }

        fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), TransportError> {
            if reg == self.reg {
                self.seen += 1;
                if self.seen == self.nth {
                    return Err(TransportError::Nack);
                }
            }
            self.inner.read_regs(reg, buf)
        }

        fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<(), TransportError> {
            self.inner.write_regs(reg, data)
        }

        fn delay_ms(&mut self, ms: u32) {
            self.inner.delay_ms(ms);
        }
    }

    #[test]
    fn test_failed_readback_restores_polarity() {
        let i2c = bus_with(expander().with_register(REG_POLARITY, 0x12));
        let flaky = FailingRead {
            inner: I2cDevice::new(&i2c, 0x20),
            reg: REG_POLARITY,
            nth: 2,
            seen: 0,
        };
        let mut io = Tca9555::new(flaky);
        assert_eq!(io.init(), Err(DriverError::Bus(TransportError::Nack)));
        assert!(!io.is_initialized());
        assert_eq!(chip(&i2c).register(REG_POLARITY), 0x12);
        assert_eq!(chip(&i2c).register(REG_CONFIG), 0xFF);
    }

    #[test]
    fn test_failed_identification_leaves_chip_untouched() {
        let i2c = bus_with(
            expander()
                .with_register(REG_POLARITY, 0x12)
                .with_read_only(REG_POLARITY),
        );
        let mut io = Tca9555::new(I2cDevice::new(&i2c, 0x20));
        assert_eq!(io.init(), Err(DriverError::IdentificationFailure));
        let dev = chip(&i2c);
        assert_eq!(dev.register(REG_POLARITY), 0x12);
        assert_eq!(dev.register(REG_OUTPUT), 0xFF);
        assert_eq!(dev.register(REG_CONFIG), 0xFF);
    }

    #[test]
    fn test_inputs_and_outputs() {
        let i2c = bus_with(expander());
        let mut io = Tca9555::new(I2cDevice::new(&i2c, 0x20));
        assert_eq!(io.write_outputs(0), Err(DriverError::NotReady));
        io.init().unwrap();

        assert_eq!(io.read_data(), Sample::new(SampleValue::Digital { inputs: 0x800F }));
        assert_eq!(io.read_pin(15), Ok(true));
        assert_eq!(io.read_pin(4), Ok(false));
        assert_eq!(io.read_pin(16), Err(DriverError::InvalidArgument));

        io.write_outputs(0x1234).unwrap();
        io.set_pin(0, true).unwrap();
        let dev = chip(&i2c);
        assert_eq!(dev.register(0x02), 0x35);
        assert_eq!(dev.register(0x03), 0x12);
    }

    #[test]
    fn test_deinit_releases_pins() {
        let i2c = bus_with(expander());
        let config = Tca9555Config {
            direction: 0x0000,
            ..Tca9555Config::default()
        };
        let mut io = Tca9555::with_config(I2cDevice::new(&i2c, 0x20), config);
        io.init().unwrap();
        io.deinit();
        assert!(!io.is_initialized());
        assert_eq!(chip(&i2c).register(0x06), 0xFF);
        assert!(!io.read_data().valid);
    }

    #[test]
    fn test_map_and_addresses() {
        assert_eq!(validate_map(&REGISTER_MAP), Ok(()));
        assert!(Tca9555::<I2cDevice<'_, MockI2c, MockClock>>::supports_address(0x27));
        assert!(!Tca9555::<I2cDevice<'_, MockI2c, MockClock>>::supports_address(0x28));
    }

    #[cfg(feature = "tier1")]
    #[test]
    fn test_direction_goes_through_all_inputs() {
        let i2c = bus_with(expander());
        let mut io = Tca9555::new(I2cDevice::new(&i2c, 0x20));
        io.init().unwrap();
        i2c.lock(|t| t.bus_mut().clear_transactions());

        io.set_parameter("direction", &ParamValue::Int(0x00FF)).unwrap();
        assert_eq!(io.get_parameter("direction"), Ok(ParamValue::Int(0x00FF)));
        let dev = chip(&i2c);
        assert_eq!(dev.register(0x06), 0xFF);
        assert_eq!(dev.register(0x07), 0x00);

        let first = i2c.lock(|t| t.bus().transactions().first().cloned());
        assert_eq!(
            first,
            Some(crate::platform::mock::I2cTransaction::Write {
                addr: 0x20,
                data: std::vec![0x06, 0xFF, 0xFF],
            })
        );

        assert_eq!(
            io.set_parameter("polarity", &ParamValue::Int(70_000)),
            Err(DriverError::InvalidArgument)
        );
    }

    #[cfg(feature = "tier2")]
    #[test]
    fn test_register_policy() {
        let i2c = bus_with(expander());
        let mut io = Tca9555::new(I2cDevice::new(&i2c, 0x20));
        io.init().unwrap();

        assert_eq!(io.reg_write(0x00, &[0]), Err(DriverError::AccessViolation));
        io.reg_write(0x02, &[0x55]).unwrap();
        let mut buf = [0u8; 1];
        io.reg_read(0x02, &mut buf).unwrap();
        assert_eq!(buf[0], 0x55);
        assert_eq!(io.reg_read(0x08, &mut buf), Err(DriverError::InvalidArgument));
    }
}
