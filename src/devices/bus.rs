//! Register access over shared transports
//!
//! Drivers are generic over [`RegisterBus`] so the same chip logic runs on
//! I2C or SPI. Each register transfer takes the transport lock once, so a
//! pointer write and the following read cannot be split by another driver.

use crate::core::traits::TimeSource;
use crate::platform::traits::{GpioPort, I2cBus, PinMode, SpiBus};
use crate::transport::{GpioTransport, I2cTransport, SharedTransport, SpiTransport, TransportError};

use super::endpoint::{PinRole, SpiEndpoint};
use super::DeviceAddress;

/// Byte-addressed register file
pub trait RegisterBus {
    /// Bus location of the device
    fn location(&self) -> DeviceAddress;

    /// Read consecutive registers starting at `reg`
    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Write consecutive registers starting at `reg`
    fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<(), TransportError>;

    /// Block for `ms` milliseconds on the bus clock
    fn delay_ms(&mut self, ms: u32);

    fn read_reg(&mut self, reg: u8) -> Result<u8, TransportError> {
        let mut value = [0u8];
        self.read_regs(reg, &mut value)?;
        Ok(value[0])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), TransportError> {
        self.write_regs(reg, &[value])
    }

    /// Read-modify-write of the bits in `mask`
    fn update_reg(&mut self, reg: u8, mask: u8, value: u8) -> Result<(), TransportError> {
        let current = self.read_reg(reg)?;
        self.write_reg(reg, (current & !mask) | (value & mask))
    }
}

/// Auxiliary pins of an SPI device
pub trait ControlPins {
    /// Endpoint the pins come from
    fn endpoint(&self) -> &SpiEndpoint;

    /// Configure every assigned pin (outputs idle high, interrupt lines as
    /// inputs)
    fn setup_pins(&mut self) -> Result<(), TransportError>;

    /// Drive the pin of `role`
    ///
    /// # Errors
    ///
    /// `InvalidPin` if the endpoint has no such pin.
    fn write_pin(&mut self, role: PinRole, high: bool) -> Result<(), TransportError>;

    /// Sample the pin of `role`
    fn read_pin(&mut self, role: PinRole) -> Result<bool, TransportError>;
}

/// Device at a fixed address on a shared I2C transport
pub struct I2cDevice<'a, B, C> {
    i2c: &'a SharedTransport<I2cTransport<B, C>>,
    address: u8,
    clock: C,
}

impl<'a, B: I2cBus, C: TimeSource> I2cDevice<'a, B, C> {
    pub fn new(i2c: &'a SharedTransport<I2cTransport<B, C>>, address: u8) -> Self {
        let clock = i2c.lock(|t| t.clock().clone());
        Self { i2c, address, clock }
    }

    /// 7-bit device address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Shared transport
    pub fn transport(&self) -> &'a SharedTransport<I2cTransport<B, C>> {
        self.i2c
    }
}

impl<B: I2cBus, C: TimeSource> RegisterBus for I2cDevice<'_, B, C> {
    fn location(&self) -> DeviceAddress {
        DeviceAddress::I2c(self.address)
    }

    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), TransportError> {
        let address = self.address;
        self.i2c.lock(|t| t.read_regs(address, reg, buf))
    }

    fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<(), TransportError> {
        let address = self.address;
        self.i2c.lock(|t| t.write_regs(address, reg, data))
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }
}

/// Meaning of bit 7 of the SPI command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBit {
    /// Set for writes (radios)
    Write,
    /// Set for reads (most sensors)
    Read,
}

/// Device on a shared SPI transport with pins on a shared GPIO transport
///
/// When the SPI transport's own chip select is the endpoint's `cs` the
/// transport drives it; otherwise the device toggles it through GPIO around
/// every frame.
pub struct SpiDevice<'a, SB, SC, GP, GC> {
    spi: &'a SharedTransport<SpiTransport<SB, SC>>,
    gpio: &'a SharedTransport<GpioTransport<GP, GC>>,
    endpoint: SpiEndpoint,
    command_bit: CommandBit,
    managed_cs: bool,
    clock: SC,
}

impl<'a, SB, SC, GP, GC> SpiDevice<'a, SB, SC, GP, GC>
where
    SB: SpiBus,
    SC: TimeSource,
    GP: GpioPort,
    GC: TimeSource,
{
    pub fn new(
        spi: &'a SharedTransport<SpiTransport<SB, SC>>,
        gpio: &'a SharedTransport<GpioTransport<GP, GC>>,
        endpoint: SpiEndpoint,
        command_bit: CommandBit,
    ) -> Self {
        let (managed_cs, clock) = spi.lock(|t| {
            (
                t.manages_cs() && t.spi_config().cs_pin == endpoint.cs(),
                t.clock().clone(),
            )
        });
        Self {
            spi,
            gpio,
            endpoint,
            command_bit,
            managed_cs,
            clock,
        }
    }

    /// Whether the SPI transport drives chip select
    pub fn manages_cs(&self) -> bool {
        self.managed_cs
    }

    fn command(&self, reg: u8, write: bool) -> u8 {
        let reg = reg & 0x7F;
        match (self.command_bit, write) {
            (CommandBit::Write, true) | (CommandBit::Read, false) => reg | 0x80,
            _ => reg,
        }
    }

    /// Run `f` in one transaction with chip select asserted
    fn frame<F>(&mut self, f: F) -> Result<(), TransportError>
    where
        F: FnOnce(&mut SpiTransport<SB, SC>) -> Result<(), TransportError>,
    {
        let cs = self.endpoint.cs();
        let managed = self.managed_cs;
        let gpio = self.gpio;
        self.spi.lock(|spi| {
            spi.transaction(|spi| {
                if !managed {
                    gpio.lock(|g| g.digital_write(cs, false))?;
                }
                let result = f(spi);
                if !managed {
                    let released = gpio.lock(|g| g.digital_write(cs, true));
                    return result.and(released);
                }
                result
            })
        })
    }
}

impl<SB, SC, GP, GC> RegisterBus for SpiDevice<'_, SB, SC, GP, GC>
where
    SB: SpiBus,
    SC: TimeSource,
    GP: GpioPort,
    GC: TimeSource,
{
    fn location(&self) -> DeviceAddress {
        DeviceAddress::Spi { cs: self.endpoint.cs() }
    }

    fn read_regs(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), TransportError> {
        let command = self.command(reg, false);
        self.frame(|spi| spi.write_read(&[command], buf))
    }

    fn write_regs(&mut self, reg: u8, data: &[u8]) -> Result<(), TransportError> {
        let command = self.command(reg, true);
        self.frame(|spi| {
            spi.write(&[command])?;
            spi.write(data)
        })
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }
}

impl<SB, SC, GP, GC> ControlPins for SpiDevice<'_, SB, SC, GP, GC>
where
    SB: SpiBus,
    SC: TimeSource,
    GP: GpioPort,
    GC: TimeSource,
{
    fn endpoint(&self) -> &SpiEndpoint {
        &self.endpoint
    }

    fn setup_pins(&mut self) -> Result<(), TransportError> {
        let endpoint = self.endpoint;
        let managed = self.managed_cs;
        self.gpio.lock(|g| {
            for (role, pin) in endpoint.assigned() {
                match role {
                    PinRole::Cs if managed => {}
                    PinRole::Cs | PinRole::Rst | PinRole::Dc => {
                        g.pin_mode(pin, PinMode::Output)?;
                        g.digital_write(pin, true)?;
                    }
                    PinRole::Busy | PinRole::Dio0 | PinRole::Dio1 => {
                        g.pin_mode(pin, PinMode::Input)?
                    }
                }
            }
            Ok(())
        })
    }

    fn write_pin(&mut self, role: PinRole, high: bool) -> Result<(), TransportError> {
        let pin = self.endpoint.pin(role).ok_or(TransportError::InvalidPin)?;
        self.gpio.lock(|g| g.digital_write(pin, high))
    }

    fn read_pin(&mut self, role: PinRole) -> Result<bool, TransportError> {
        let pin = self.endpoint.pin(role).ok_or(TransportError::InvalidPin)?;
        self.gpio.lock(|g| g.digital_read(pin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{
        MockClock, MockGpio, MockI2c, MockI2cDevice, MockSpi, MockSpiDevice,
    };
    use crate::platform::traits::SpiConfig;
    use crate::transport::Transport;

    #[test]
    fn test_i2c_device_register_helpers() {
        let mut bus = MockI2c::new();
        bus.add_device(MockI2cDevice::new(0x20).with_register(0x06, 0xFF));
        let i2c = SharedTransport::new(I2cTransport::new("i2c0", bus, MockClock::new()));
        i2c.lock(|t| t.init()).unwrap();

        let mut dev = I2cDevice::new(&i2c, 0x20);
        assert_eq!(dev.location(), DeviceAddress::I2c(0x20));
        dev.update_reg(0x06, 0x0F, 0x00).unwrap();
        assert_eq!(dev.read_reg(0x06), Ok(0xF0));

        let mut missing = I2cDevice::new(&i2c, 0x21);
        assert_eq!(missing.read_reg(0x00), Err(TransportError::Nack));
    }

    #[test]
    fn test_spi_device_gpio_chip_select() {
        let mut bus = MockSpi::new();
        bus.add_device(MockSpiDevice::new(5).with_register(0x42, 0x12));
        let clock = MockClock::new();
        let spi = SharedTransport::new(SpiTransport::new("spi0", bus, clock.clone()));
        let gpio = SharedTransport::new(GpioTransport::new("gpio", MockGpio::new(30), clock));
        spi.lock(|t| t.init()).unwrap();
        gpio.lock(|t| t.init()).unwrap();

        let endpoint = SpiEndpoint::parse("spi0:cs=5,rst=16,dio0=26").unwrap();
        let mut dev = SpiDevice::new(&spi, &gpio, endpoint, CommandBit::Write);
        assert!(!dev.manages_cs());
        dev.setup_pins().unwrap();
        assert_eq!(gpio.lock(|g| g.pin_mode_of(26)), Some(PinMode::Input));

        gpio.lock(|g| g.port_mut().clear_writes());
        assert_eq!(dev.read_reg(0x42), Ok(0x12));
        assert_eq!(gpio.lock(|g| g.port().writes().to_vec()), vec![(5, false), (5, true)]);

        dev.write_regs(0x06, &[0x6C, 0x80]).unwrap();
        assert_eq!(spi.lock(|t| t.bus().sent()[2..].to_vec()), vec![0x86, 0x6C, 0x80]);
        assert_eq!(spi.lock(|t| t.bus().device(5).map(|d| d.register(0x07))), Some(0x80));
        assert_eq!(dev.write_pin(PinRole::Dc, true), Err(TransportError::InvalidPin));
    }

    #[test]
    fn test_spi_device_managed_chip_select() {
        let mut bus = MockSpi::new();
        bus.add_device(MockSpiDevice::new(9).with_read_flag().with_register(0x50, 0x58));
        let clock = MockClock::new();
        let spi = SharedTransport::new(SpiTransport::new("spi1", bus, clock.clone()));
        let gpio = SharedTransport::new(GpioTransport::new("gpio", MockGpio::new(30), clock));
        spi.lock(|t| {
            t.init_with(SpiConfig {
                cs_pin: 9,
                ..SpiConfig::default()
            })
        })
        .unwrap();
        gpio.lock(|t| t.init()).unwrap();

        let mut dev = SpiDevice::new(&spi, &gpio, SpiEndpoint::new(1, 9), CommandBit::Read);
        assert!(dev.manages_cs());
        dev.setup_pins().unwrap();
        assert_eq!(dev.read_reg(0x50), Ok(0x58));
        assert_eq!(spi.lock(|t| t.bus().sent()[0]), 0xD0);
        assert!(gpio.lock(|g| g.port().writes().is_empty()));
    }
}
