//! `embedded-hal` 1.0 adapters
//!
//! Most chip HALs already implement the `embedded-hal` blocking traits. These
//! wrappers turn such a peripheral into the crate's [`I2cBus`] / [`SpiBus`]
//! so it can sit behind a transport without a bespoke binding.
//!
//! # Example
//!
//! ```ignore
//! use pico_drivers::platform::ehal::EhalI2c;
//! use pico_drivers::transport::I2cTransport;
//!
//! let i2c = hal::i2c::I2C::i2c0(pac.I2C0, sda, scl, 400.kHz(), &mut pac.RESETS, clocks);
//! let transport = I2cTransport::new("i2c0", EhalI2c::new(i2c), clock);
//! ```

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::{Error as _, ErrorKind as I2cErrorKind, I2c};
use embedded_hal::spi::{Error as _, ErrorKind as SpiErrorKind, SpiBus as EhalSpiBus};

use crate::platform::{
    error::{GpioError, I2cError, PlatformError, SpiError},
    traits::{I2cBus, I2cConfig, SpiBus, SpiConfig},
    Result,
};

/// [`I2cBus`] over any `embedded_hal::i2c::I2c`
///
/// The wrapped peripheral is already configured; `configure` only records the
/// requested settings since `embedded-hal` has no runtime clock change.
pub struct EhalI2c<I> {
    i2c: I,
    config: Option<I2cConfig>,
}

impl<I: I2c> EhalI2c<I> {
    /// Wrap a configured `embedded-hal` I2C peripheral
    pub fn new(i2c: I) -> Self {
        Self { i2c, config: None }
    }

    /// Settings passed to the last `configure`
    pub fn config(&self) -> Option<&I2cConfig> {
        self.config.as_ref()
    }

    /// Give the peripheral back
    pub fn free(self) -> I {
        self.i2c
    }
}

impl<I: I2c> I2cBus for EhalI2c<I> {
    fn configure(&mut self, config: &I2cConfig) -> Result<()> {
        self.config = Some(*config);
        Ok(())
    }

    fn release(&mut self) {
        self.config = None;
    }

    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.i2c
            .write(addr, data)
            .map_err(|e| map_i2c_error(e.kind()))
    }

    fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()> {
        self.i2c
            .read(addr, buffer)
            .map_err(|e| map_i2c_error(e.kind()))
    }

    fn write_read(&mut self, addr: u8, write_data: &[u8], read_buffer: &mut [u8]) -> Result<()> {
        self.i2c
            .write_read(addr, write_data, read_buffer)
            .map_err(|e| map_i2c_error(e.kind()))
    }
}

/// Map `embedded-hal` I2C error kinds to platform I2C errors
pub fn map_i2c_error(kind: I2cErrorKind) -> PlatformError {
    match kind {
        I2cErrorKind::NoAcknowledge(_) => PlatformError::I2c(I2cError::Nack),
        I2cErrorKind::ArbitrationLoss => PlatformError::I2c(I2cError::ArbitrationLost),
        I2cErrorKind::Overrun => PlatformError::I2c(I2cError::Overrun),
        _ => PlatformError::I2c(I2cError::BusError),
    }
}

/// Map `embedded-hal` SPI error kinds to platform SPI errors
pub fn map_spi_error(kind: SpiErrorKind) -> PlatformError {
    match kind {
        SpiErrorKind::Overrun => PlatformError::Spi(SpiError::Overrun),
        SpiErrorKind::ModeFault => PlatformError::Spi(SpiError::ModeFault),
        _ => PlatformError::Spi(SpiError::TransferFailed),
    }
}

/// [`SpiBus`] over any `embedded_hal::spi::SpiBus` plus an optional
/// chip-select pin
///
/// The chip select is only driven for the pin number it was registered with;
/// other CS lines belong to drivers and are toggled through the GPIO transport.
pub struct EhalSpi<B, P> {
    bus: B,
    cs: Option<(u8, P)>,
}

impl<B: EhalSpiBus, P: OutputPin> EhalSpi<B, P> {
    /// Wrap a configured bus with a transport-managed chip select on `cs_pin`
    pub fn new(bus: B, cs_pin: u8, cs: P) -> Self {
        Self {
            bus,
            cs: Some((cs_pin, cs)),
        }
    }

    /// Wrap a configured bus whose chip selects are all driver-managed
    pub fn without_cs(bus: B) -> Self {
        Self { bus, cs: None }
    }

    /// Give the bus and chip select back
    pub fn free(self) -> (B, Option<P>) {
        (self.bus, self.cs.map(|(_, p)| p))
    }
}

impl<B: EhalSpiBus, P: OutputPin> SpiBus for EhalSpi<B, P> {
    fn configure(&mut self, _config: &SpiConfig) -> Result<()> {
        // Idle level for the chip select
        if let Some((_, cs)) = self.cs.as_mut() {
            cs.set_high()
                .map_err(|_| PlatformError::Gpio(GpioError::InvalidMode))?;
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Some((_, cs)) = self.cs.as_mut() {
            let _ = cs.set_high();
        }
    }

    fn end(&mut self) {
        let _ = self.bus.flush();
    }

    fn set_cs(&mut self, pin: u8, active: bool) -> Result<()> {
        match self.cs.as_mut() {
            Some((cs_pin, cs)) if *cs_pin == pin => {
                let result = if active { cs.set_low() } else { cs.set_high() };
                result.map_err(|_| PlatformError::Gpio(GpioError::InvalidMode))
            }
            _ => Err(PlatformError::Gpio(GpioError::InvalidPin)),
        }
    }

    fn transfer_in_place(&mut self, data: &mut [u8]) -> Result<()> {
        self.bus
            .transfer_in_place(data)
            .map_err(|e| map_spi_error(e.kind()))
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.bus.write(data).map_err(|e| map_spi_error(e.kind()))
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<()> {
        // SpiBus::read clocks out an unspecified word, so send 0xFF explicitly
        buffer.fill(0xFF);
        self.bus
            .transfer_in_place(buffer)
            .map_err(|e| map_spi_error(e.kind()))
    }
}
