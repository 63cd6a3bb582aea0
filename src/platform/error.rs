//! Errors reported by HAL bindings
//!
//! Bindings translate their peripheral errors into [`PlatformError`];
//! transports then fold those into `TransportError` before drivers see them.

use core::fmt;

pub type Result<T> = core::result::Result<T, PlatformError>;

/// Failure of a platform peripheral, tagged by bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlatformError {
    Uart(UartError),
    I2c(I2cError),
    Spi(SpiError),
    Pwm(PwmError),
    Gpio(GpioError),
    Adc(AdcError),
    OneWire(OneWireError),
    /// Pins, clock or framing rejected by the peripheral
    InvalidConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartError {
    /// TX FIFO did not accept the byte
    WriteFailed,
    /// RX FIFO reported an error on read
    ReadFailed,
    Timeout,
    /// Divider cannot reach the requested rate
    InvalidBaudRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cError {
    /// Bus-level fault (stuck line, illegal START/STOP)
    BusError,
    /// Address or data byte not acknowledged
    Nack,
    /// Another master won the bus
    ArbitrationLost,
    Timeout,
    /// Address outside the 7-bit range
    InvalidAddress,
    Overrun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiError {
    TransferFailed,
    Timeout,
    ModeFault,
    Overrun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PwmError {
    /// Compare value above the counter top
    InvalidDutyCycle,
    /// Frequency outside what the slice divider can produce
    InvalidFrequency,
    /// No such channel, or the channel is not attached
    ChannelUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioError {
    /// Pin number not present on the port
    InvalidPin,
    /// Operation does not match the pin's configured mode
    InvalidMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    InvalidChannel,
    /// Resolution not supported by the converter
    InvalidResolution,
    /// Conversion did not complete
    ConversionFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OneWireError {
    /// Line held low (short circuit or missing pull-up)
    LineStuckLow,
    /// Slot timing could not be met
    Timing,
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::Uart(e) => write!(f, "uart: {:?}", e),
            PlatformError::I2c(e) => write!(f, "i2c: {:?}", e),
            PlatformError::Spi(e) => write!(f, "spi: {:?}", e),
            PlatformError::Pwm(e) => write!(f, "pwm: {:?}", e),
            PlatformError::Gpio(e) => write!(f, "gpio: {:?}", e),
            PlatformError::Adc(e) => write!(f, "adc: {:?}", e),
            PlatformError::OneWire(e) => write!(f, "onewire: {:?}", e),
            PlatformError::InvalidConfig => write!(f, "invalid peripheral configuration"),
        }
    }
}
