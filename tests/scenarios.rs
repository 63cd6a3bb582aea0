//! End-to-end scenarios against the mock platform
//!
//! Everything here goes through the public API only.

use pico_drivers::core::resources::{self, ResourceArbiter, ResourceKind, SharedResources};
use pico_drivers::devices::identify::expect_chip_id;
use pico_drivers::devices::schema::{self, Command, Setting, Signal};
use pico_drivers::devices::{
    CapabilitySchema, DeviceAddress, Driver, DriverError, DriverState, I2cDevice, RegisterBus,
    Sample, ValueType,
};
use pico_drivers::platform::error::I2cError;
use pico_drivers::platform::mock::{
    MockAdc, MockClock, MockI2c, MockI2cDevice, MockPwm, MockSpi, MockSpiDevice,
};
use pico_drivers::platform::traits::{AdcConfig, I2cConfig, PwmConfig, SpiConfig};
use pico_drivers::transport::{
    crc8, AdcTransport, I2cTransport, PwmTransport, Rom, SharedTransport, SpiTransport, Transport,
    TransportError,
    TransportRegistry, TransportState,
};
use serial_test::serial;

type SharedI2c = SharedTransport<I2cTransport<MockI2c, MockClock>>;

fn i2c_with(devices: &[MockI2cDevice]) -> SharedI2c {
    let mut bus = MockI2c::new();
    for device in devices {
        bus.add_device(device.clone());
    }
    let i2c = SharedTransport::new(I2cTransport::new("i2c0", bus, MockClock::new()));
    i2c.lock(|t| t.init()).unwrap();
    i2c
}

/// Sensor identified by a single chip-id register
struct ChipIdSensor<R> {
    bus: R,
    state: DriverState,
}

const CHIP_ID_REG: u8 = 0xD0;
const CHIP_ID: u8 = 0x61;

static SENSOR_SCHEMA: CapabilitySchema = CapabilitySchema {
    settings: &[],
    signals: &[Signal::new("temp", ValueType::Float).units("°C")],
    commands: &[],
};

impl<R: RegisterBus> ChipIdSensor<R> {
    fn new(bus: R) -> Self {
        Self {
            bus,
            state: DriverState::new(),
        }
    }
}

impl<R: RegisterBus> Driver for ChipIdSensor<R> {
    fn driver_id(&self) -> &'static str {
        "chipid"
    }

    fn address(&self) -> DeviceAddress {
        self.bus.location()
    }

    fn init(&mut self) -> Result<(), DriverError> {
        if self.state.is_initialized() {
            return Ok(());
        }
        expect_chip_id(&mut self.bus, "chipid", CHIP_ID_REG, CHIP_ID)?;
        self.state.set_initialized(true);
        Ok(())
    }

    fn deinit(&mut self) {
        self.state.set_initialized(false);
    }

    fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    fn read_data(&mut self) -> Sample {
        Sample::invalid()
    }

    fn schema(&self) -> &'static CapabilitySchema {
        &SENSOR_SCHEMA
    }
}

#[test]
fn test_bus_scan() {
    let mut i2c = I2cTransport::new("i2c0", MockI2c::new(), MockClock::new());
    i2c.init_with(I2cConfig {
        sda_pin: 21,
        scl_pin: 22,
        speed_hz: 400_000,
        ..I2cConfig::default()
    })
    .unwrap();
    assert_eq!(i2c.state(), TransportState::Ready);
    assert_eq!(i2c.config().get("speed"), Some("400000"));

    let mut found = [0u8; 16];
    assert_eq!(i2c.scan(&mut found), Ok(0));

    i2c.bus_mut().add_device(MockI2cDevice::new(0x68));
    assert_eq!(i2c.scan(&mut found), Ok(1));
    assert_eq!(found[0], 0x68);

    // A scan is one transaction however many addresses it probes
    assert_eq!(i2c.status().success_count, 2);
    assert_eq!(i2c.status().error_count, 0);
}

#[cfg(feature = "tier2")]
mod register_policy {
    use super::*;
    use pico_drivers::devices::{Access, RegisterAccess, RegisterDescriptor};

    static MAP: [RegisterDescriptor; 2] = [
        RegisterDescriptor::new(0x00, "INPUT", 1, Access::ReadOnly, 0xFF),
        RegisterDescriptor::new(0x02, "OUTPUT", 1, Access::ReadWrite, 0xFF),
    ];

    impl<R: RegisterBus> RegisterAccess for ChipIdSensor<R> {
        fn register_map(&self) -> &'static [RegisterDescriptor] {
            &MAP
        }

        fn register_bus(&mut self) -> &mut dyn RegisterBus {
            &mut self.bus
        }
    }

    #[test]
    fn test_register_access_policy() {
        let i2c = i2c_with(&[MockI2cDevice::new(0x20)
            .with_register(CHIP_ID_REG, CHIP_ID)
            .with_register(0x00, 0xFF)
            .with_register(0x02, 0xFF)]);
        let mut io = ChipIdSensor::new(I2cDevice::new(&i2c, 0x20));

        let mut buf = [0u8; 1];
        assert_eq!(io.reg_read(0x02, &mut buf), Err(DriverError::NotReady));
        io.init().unwrap();

        assert_eq!(io.reg_write(0x00, &[0]), Err(DriverError::AccessViolation));
        io.reg_write(0x02, &[0x55]).unwrap();
        io.reg_read(0x02, &mut buf).unwrap();
        assert_eq!(buf[0], 0x55);

        // The refused write never reached the bus
        let input = i2c.lock(|t| t.bus().device(0x20).map(|d| d.register(0x00)));
        assert_eq!(input, Some(0xFF));

        assert_eq!(io.find_register_by_name("output").map(|r| r.addr), Some(0x02));
    }
}

#[test]
fn test_resource_arbitration() {
    let table = SharedResources::<8>::new();

    assert_eq!(table.claim(ResourceKind::GpioPin, 5, "drvA"), Ok(()));
    assert!(table.claim(ResourceKind::GpioPin, 5, "drvB").is_err());
    assert_eq!(table.claim(ResourceKind::GpioPin, 5, "drvA"), Ok(()));
    assert_eq!(table.claimed_count(), 1);
    assert_eq!(table.owner_of(ResourceKind::GpioPin, 5).as_deref(), Some("drvA"));

    assert!(table.release(ResourceKind::GpioPin, 5, "drvB").is_err());
    assert!(table.is_claimed(ResourceKind::GpioPin, 5));
    assert_eq!(table.release(ResourceKind::GpioPin, 5, "drvA"), Ok(()));
    assert!(!table.is_claimed(ResourceKind::GpioPin, 5));
    assert_eq!(table.claimed_count(), 0);
}

#[test]
#[serial]
fn test_global_resource_table() {
    let table = resources::global();
    table.claim(ResourceKind::AdcChannel, 3, "scenario").unwrap();
    assert!(table.is_claimed(ResourceKind::AdcChannel, 3));
    assert!(table.claim(ResourceKind::AdcChannel, 3, "other").is_err());

    let mut dump = String::new();
    table.dump(&mut dump).unwrap();
    assert!(dump.contains("scenario"));

    assert_eq!(table.release_all("scenario"), 1);
    assert!(!resources::global().is_claimed(ResourceKind::AdcChannel, 3));
}

#[test]
fn test_driver_identification() {
    let i2c = i2c_with(&[
        MockI2cDevice::new(0x76).with_register(CHIP_ID_REG, 0x61),
        MockI2cDevice::new(0x77).with_register(CHIP_ID_REG, 0x60),
    ]);

    let mut good = ChipIdSensor::new(I2cDevice::new(&i2c, 0x76));
    assert_eq!(good.init(), Ok(()));
    assert!(good.is_initialized());
    assert_eq!(good.address(), DeviceAddress::I2c(0x76));

    let mut wrong = ChipIdSensor::new(I2cDevice::new(&i2c, 0x77));
    assert_eq!(wrong.init(), Err(DriverError::IdentificationFailure));
    assert!(!wrong.is_initialized());

    let mut absent = ChipIdSensor::new(I2cDevice::new(&i2c, 0x78));
    assert_eq!(absent.init(), Err(DriverError::Bus(TransportError::Nack)));
    assert!(!absent.is_initialized());
}

static RATE_SCHEMA: CapabilitySchema = CapabilitySchema {
    settings: &[Setting::new("rate", ValueType::Int)
        .writable()
        .range(1.0, 100.0, 1.0)
        .units("Hz")],
    signals: &[Signal::new("temp", ValueType::Float).units("°C")],
    commands: &[],
};

#[test]
fn test_schema_serialization() {
    let mut text = String::new();
    RATE_SCHEMA.serialize(&mut text).unwrap();
    assert_eq!(
        text,
        "[settings]\nrate:int:rw:1.00-100.00:Hz\n[signals]\ntemp:float:ro:°C\n"
    );
    assert_eq!(RATE_SCHEMA.to_string(), text);
}

static MIXED_SCHEMA: CapabilitySchema = CapabilitySchema {
    settings: &[
        Setting::new("gain", ValueType::Enum).writable(),
        Setting::new("hidden", ValueType::Bool).active(false),
        Setting::new("offset", ValueType::Float).writable().range(-1.5, 1.5, 0.1).units("V"),
    ],
    signals: &[Signal::new("raw", ValueType::Int), Signal::new("led", ValueType::Bool).writable()],
    commands: &[Command::new("reset", ""), Command::new("reg_read", "addr:int len:int")],
};

#[test]
fn test_schema_round_trip() {
    for schema in [&RATE_SCHEMA, &MIXED_SCHEMA, &SENSOR_SCHEMA] {
        let text = schema.to_string();
        let parsed = schema::parse(&text).unwrap();
        assert!(parsed.describes(schema), "{}", text);
    }
    let text = MIXED_SCHEMA.to_string();
    assert!(!text.contains("hidden"));
    assert!(!schema::parse(&text).unwrap().describes(&RATE_SCHEMA));
}

#[test]
fn test_onewire_crc() {
    let body = [0x28, 0x61, 0x64, 0x02, 0x00, 0x00, 0x00];
    let crc = crc8(&body);
    assert_eq!(crc, 0xE3);

    let mut bytes = [0u8; 8];
    bytes[..7].copy_from_slice(&body);
    bytes[7] = crc;
    let rom = Rom(bytes);
    assert!(rom.is_valid());
    assert_eq!(rom.family(), 0x28);
    assert_eq!(crc8(&bytes), 0);

    bytes[7] ^= 0x01;
    assert!(!Rom(bytes).is_valid());
}

#[test]
fn test_status_counters_are_monotonic() {
    let i2c = i2c_with(&[MockI2cDevice::new(0x40).with_registers(0x00, &[1, 2, 3, 4])]);
    let mut last = (0, 0);
    let mut check = |i2c: &SharedI2c| {
        let status = i2c.lock(|t| t.status().clone());
        assert!(status.success_count >= last.0);
        assert!(status.error_count >= last.1);
        last = (status.success_count, status.error_count);
    };

    let mut buf = [0u8; 4];
    i2c.lock(|t| t.read_regs(0x40, 0x00, &mut buf)).unwrap();
    check(&i2c);
    assert!(i2c.lock(|t| t.read_regs(0x41, 0x00, &mut buf)).is_err());
    check(&i2c);
    i2c.lock(|t| t.bus_mut().fail_next(2, I2cError::Timeout));
    assert!(i2c.lock(|t| t.write_reg(0x40, 0x01, 9)).is_err());
    check(&i2c);
    assert!(i2c.lock(|t| t.read_reg(0x40, 0x01)).is_err());
    check(&i2c);
    assert_eq!(i2c.lock(|t| t.read_reg(0x40, 0x01)), Ok(2));
    check(&i2c);
    assert_eq!(
        i2c.lock(|t| t.write_regs(0x40, 0x00, &[0u8; 64])),
        Err(TransportError::BufferOverflow)
    );
    check(&i2c);

    let status = i2c.lock(|t| t.status().clone());
    assert_eq!(status.success_count, 2);
    assert!(status.error_count >= 3);
    assert!(status.last_error.is_some());
    assert!(!status.last_error_msg.is_empty());
}

#[test]
fn test_spi_transactions_bracket_chip_select() {
    let mut bus = MockSpi::new();
    bus.add_device(MockSpiDevice::new(5).with_register(0x0F, 0x33));
    let mut spi = SpiTransport::new("spi0", bus, MockClock::new());
    spi.init_with(SpiConfig {
        cs_pin: 5,
        ..SpiConfig::default()
    })
    .unwrap();
    assert!(spi.manages_cs());
    assert_eq!(spi.bus().cs_history().last(), Some(&(5, false)));

    for _ in 0..3 {
        spi.begin_transaction().unwrap();
        assert_eq!(spi.begin_transaction(), Err(TransportError::TransactionActive));
        assert_eq!(spi.bus().cs_history().last(), Some(&(5, true)));
        spi.end_transaction().unwrap();
        assert_eq!(spi.end_transaction(), Err(TransportError::NoTransaction));
        assert_eq!(spi.bus().cs_history().last(), Some(&(5, false)));
        assert!(!spi.in_transaction());
    }

    let mut reply = [0u8; 1];
    spi.transaction(|t| t.write_read(&[0x0F], &mut reply)).unwrap();
    assert!(!spi.in_transaction());
    assert_eq!(spi.bus().cs_history().last(), Some(&(5, false)));
}

#[test]
fn test_adc_and_pwm_boundaries() {
    let mut adc = AdcTransport::new("adc0", MockAdc::new(4), MockClock::new());
    adc.init_with(AdcConfig::default()).unwrap();
    assert!(adc.read(0).is_ok());
    assert!(adc.read(3).is_ok());
    assert_eq!(adc.read(4), Err(TransportError::InvalidChannel));
    assert_eq!(adc.set_resolution(9), Ok(()));
    assert_eq!(adc.set_resolution(12), Ok(()));
    assert_eq!(adc.set_resolution(8), Err(TransportError::InvalidArgument));
    assert_eq!(adc.set_resolution(13), Err(TransportError::InvalidArgument));
    assert_eq!(adc.resolution(), 12);

    let mut pwm = PwmTransport::new("pwm0", MockPwm::new(4), MockClock::new());
    pwm.init_with(PwmConfig {
        resolution_bits: 10,
        ..PwmConfig::default()
    })
    .unwrap();
    let channel = pwm.attach(15, 0, 0).unwrap();
    assert_eq!(pwm.frequency_of(15), Some(1_000));

    pwm.write(15, 0).unwrap();
    assert_eq!(pwm.duty_of(15), Some(0));
    pwm.write(15, 1023).unwrap();
    assert_eq!(pwm.duty_of(15), Some(1023));
    pwm.write(15, 5000).unwrap();
    assert_eq!(pwm.duty_of(15), Some(1023));
    assert_eq!(pwm.unit().channel(channel).map(|c| c.duty), Some(1023));
}

#[test]
fn test_registry_over_shared_transports() {
    let i2c = i2c_with(&[MockI2cDevice::new(0x68)]);
    let spi = SharedTransport::new(SpiTransport::new("spi0", MockSpi::new(), MockClock::new()));
    let twin = SharedTransport::new(SpiTransport::new("spi0", MockSpi::new(), MockClock::new()));

    let mut registry: TransportRegistry<'_, 4> = TransportRegistry::new();
    registry.register(&i2c).unwrap();
    registry.register(&spi).unwrap();
    assert!(registry.register(&twin).is_err());
    assert_eq!(registry.len(), 2);

    assert!(registry.init_all());
    assert_eq!(registry.iter_ready().count(), 2);
    assert!(registry.lookup("spi0").is_some());
    assert!(registry.lookup("uart0").is_none());

    let mut dump = String::new();
    registry.dump(&mut dump).unwrap();
    assert!(dump.starts_with("i2c0 i2c "));
    assert_eq!(dump.lines().count(), 2);

    // A driver and the registry see the same transport
    let mut sensor = ChipIdSensor::new(I2cDevice::new(&i2c, 0x68));
    assert!(sensor.init().is_err());
    let errors = registry.lookup("i2c0").map(|t| t.status().error_count);
    assert_eq!(errors, Some(i2c.lock(|t| t.status().error_count)));
}
