//! Transport layer
//!
//! A transport owns one physical bus or pin surface and serializes every
//! access to it. All variants share the same lifecycle (`init`, `deinit`,
//! `reset`), the same health statistics and a key/value view of their
//! configuration; each adds its own operations on top.
//!
//! # Sharing
//!
//! A bus transport is used by many drivers. Wrap it in a [`SharedTransport`]
//! and hand out `&SharedTransport<T>`; every call made inside
//! [`SharedTransport::lock`] runs in one critical section, so multi-phase
//! transactions cannot interleave with another user of the same bus.
//!
//! # Example
//!
//! ```ignore
//! use pico_drivers::platform::mock::{MockClock, MockI2c};
//! use pico_drivers::transport::{I2cTransport, SharedTransport, Transport};
//!
//! let i2c = SharedTransport::new(I2cTransport::new("i2c0", MockI2c::new(), MockClock::new()));
//! i2c.lock(|bus| bus.init())?;
//! let mut found = [0u8; 16];
//! let count = i2c.lock(|bus| bus.scan(&mut found))?;
//! ```

use core::fmt;

use crate::platform::error::{
    AdcError, GpioError, I2cError, OneWireError, PlatformError, PwmError, SpiError, UartError,
};

pub mod adc;
pub mod config;
pub mod gpio;
pub mod i2c;
pub mod onewire;
pub mod pwm;
pub mod registry;
pub mod shared;
pub mod spi;
pub mod status;
pub mod uart;

pub use adc::AdcTransport;
pub use config::{ConfigError, TransportConfig};
pub use gpio::GpioTransport;
pub use i2c::I2cTransport;
pub use onewire::{crc8, OneWireTransport, Rom};
pub use pwm::PwmTransport;
pub use registry::{RegistryError, TransportRegistry, MAX_TRANSPORTS};
pub use shared::SharedTransport;
pub use spi::SpiTransport;
pub use status::{Status, TransportCore, TransportState};
pub use uart::UartTransport;

/// Result type for transport operations
pub type Result<T> = core::result::Result<T, TransportError>;

/// Transport type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportType {
    /// Digital pins
    Gpio,
    /// Analog inputs
    Adc,
    /// PWM outputs
    Pwm,
    /// I2C bus
    I2c,
    /// SPI bus
    Spi,
    /// UART line
    Uart,
    /// OneWire line
    OneWire,
    /// CAN controller
    Can,
    /// USB device or host port
    Usb,
    /// Packet radio link
    Radio,
}

impl TransportType {
    /// Lowercase name used in dumps
    pub const fn as_str(self) -> &'static str {
        match self {
            TransportType::Gpio => "gpio",
            TransportType::Adc => "adc",
            TransportType::Pwm => "pwm",
            TransportType::I2c => "i2c",
            TransportType::Spi => "spi",
            TransportType::Uart => "uart",
            TransportType::OneWire => "onewire",
            TransportType::Can => "can",
            TransportType::Usb => "usb",
            TransportType::Radio => "radio",
        }
    }

    /// Tier the type belongs to
    ///
    /// On-chip pin surfaces are tier 0, byte/register buses tier 1 and
    /// higher-level links tier 2.
    pub const fn tier(self) -> TransportTier {
        match self {
            TransportType::Gpio | TransportType::Adc | TransportType::Pwm => TransportTier::Tier0,
            TransportType::I2c
            | TransportType::Spi
            | TransportType::Uart
            | TransportType::OneWire => TransportTier::Tier1,
            TransportType::Can | TransportType::Usb | TransportType::Radio => TransportTier::Tier2,
        }
    }
}

/// Transport tier tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportTier {
    /// Pin-level peripherals
    Tier0,
    /// Byte and register buses
    Tier1,
    /// Higher-level links
    Tier2,
}

impl TransportTier {
    /// Numeric tier
    pub const fn as_u8(self) -> u8 {
        match self {
            TransportTier::Tier0 => 0,
            TransportTier::Tier1 => 1,
            TransportTier::Tier2 => 2,
        }
    }

    /// Array index used by per-tier counters
    pub const fn index(self) -> usize {
        self.as_u8() as usize
    }
}

/// Transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No response within the allowed time
    Timeout,
    /// Device did not acknowledge
    Nack,
    /// Low-level bus failure (arbitration, framing, overrun)
    BusError,
    /// I2C address outside `0x08..=0x77`
    InvalidAddress,
    /// Transfer does not fit the provided or internal buffer
    BufferOverflow,
    /// Transport is not initialized
    NotInitialized,
    /// Pin is invalid or was never configured
    InvalidPin,
    /// Channel is out of range or unavailable
    InvalidChannel,
    /// Argument out of range
    InvalidArgument,
    /// Configuration cannot change while initialized
    ConfigFrozen,
    /// A transaction is already open
    TransactionActive,
    /// Operation requires an open transaction
    NoTransaction,
    /// No device answered
    NoDevice,
    /// Received data failed its CRC
    CrcMismatch,
    /// Operation not supported in this mode
    Unsupported,
    /// Transport is disabled
    Disabled,
}

impl TransportError {
    /// Short lowercase description
    pub const fn as_str(self) -> &'static str {
        match self {
            TransportError::Timeout => "timeout",
            TransportError::Nack => "nack",
            TransportError::BusError => "bus error",
            TransportError::InvalidAddress => "invalid address",
            TransportError::BufferOverflow => "buffer overflow",
            TransportError::NotInitialized => "not initialized",
            TransportError::InvalidPin => "invalid pin",
            TransportError::InvalidChannel => "invalid channel",
            TransportError::InvalidArgument => "invalid argument",
            TransportError::ConfigFrozen => "config frozen",
            TransportError::TransactionActive => "transaction active",
            TransportError::NoTransaction => "no transaction",
            TransportError::NoDevice => "no device",
            TransportError::CrcMismatch => "crc mismatch",
            TransportError::Unsupported => "unsupported",
            TransportError::Disabled => "disabled",
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PlatformError> for TransportError {
    fn from(error: PlatformError) -> Self {
        match error {
            PlatformError::I2c(I2cError::Nack) => TransportError::Nack,
            PlatformError::I2c(I2cError::Timeout) => TransportError::Timeout,
            PlatformError::I2c(I2cError::InvalidAddress) => TransportError::InvalidAddress,
            PlatformError::I2c(
                I2cError::BusError | I2cError::ArbitrationLost | I2cError::Overrun,
            ) => TransportError::BusError,
            PlatformError::Spi(SpiError::Timeout) => TransportError::Timeout,
            PlatformError::Spi(_) => TransportError::BusError,
            PlatformError::Uart(UartError::Timeout) => TransportError::Timeout,
            PlatformError::Uart(UartError::InvalidBaudRate) => TransportError::InvalidArgument,
            PlatformError::Uart(_) => TransportError::BusError,
            PlatformError::Gpio(GpioError::InvalidPin) => TransportError::InvalidPin,
            PlatformError::Gpio(_) => TransportError::InvalidArgument,
            PlatformError::Pwm(PwmError::ChannelUnavailable) => TransportError::InvalidChannel,
            PlatformError::Pwm(_) => TransportError::InvalidArgument,
            PlatformError::Adc(AdcError::InvalidChannel) => TransportError::InvalidChannel,
            PlatformError::Adc(AdcError::InvalidResolution) => TransportError::InvalidArgument,
            PlatformError::Adc(AdcError::ConversionFailed) => TransportError::BusError,
            PlatformError::OneWire(OneWireError::LineStuckLow | OneWireError::Timing) => {
                TransportError::BusError
            }
            PlatformError::InvalidConfig => TransportError::InvalidArgument,
        }
    }
}

/// Common transport surface
///
/// Implementors provide the platform-specific `init`/`deinit` and expose their
/// [`TransportCore`]; everything else has a default built on the core.
pub trait Transport {
    /// Shared bookkeeping
    fn core(&self) -> &TransportCore;

    /// Mutable shared bookkeeping
    fn core_mut(&mut self) -> &mut TransportCore;

    /// Short capability descriptor, e.g. `"i2c:master,scan,repeated_start"`
    fn capabilities(&self) -> &'static str;

    /// Bring the peripheral up with the current configuration
    ///
    /// Idempotent when already `Ready`. From `Error` the transport is
    /// deinitialized first.
    ///
    /// # Errors
    ///
    /// Returns the platform failure (state becomes `Error`) or `Disabled`.
    fn init(&mut self) -> Result<()>;

    /// Release the peripheral and return to `Uninitialized`
    fn deinit(&mut self);

    /// `deinit()` followed by `init()`
    fn reset(&mut self) -> Result<()> {
        log_info!("Transport {} reset", self.core().name());
        self.deinit();
        self.init()
    }

    /// Stop the transport and mark it `Disabled`
    fn disable(&mut self) {
        self.deinit();
        self.core_mut().disable();
    }

    /// Transport name
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Transport type
    fn transport_type(&self) -> TransportType {
        self.core().kind()
    }

    /// Transport tier
    fn tier(&self) -> TransportTier {
        self.core().tier()
    }

    /// Current state
    fn state(&self) -> TransportState {
        self.core().state()
    }

    /// Whether the transport is `Ready`
    fn is_ready(&self) -> bool {
        self.state() == TransportState::Ready
    }

    /// Health snapshot
    fn status(&self) -> &Status {
        self.core().status()
    }

    /// Configuration map
    fn config(&self) -> &TransportConfig {
        self.core().config()
    }
}

/// Object-safe, shareable transport handle used by the registry
///
/// Implemented by [`SharedTransport`], which serializes each call through its
/// critical-section mutex.
pub trait ManagedTransport: Sync {
    /// Transport name
    fn name(&self) -> &str;

    /// Transport type
    fn transport_type(&self) -> TransportType;

    /// Transport tier
    fn tier(&self) -> TransportTier {
        self.transport_type().tier()
    }

    /// Current state
    fn state(&self) -> TransportState;

    /// Copy of the health snapshot
    fn status(&self) -> Status;

    /// Capability descriptor
    fn capabilities(&self) -> &'static str;

    /// See [`Transport::init`]
    fn init(&self) -> Result<()>;

    /// See [`Transport::deinit`]
    fn deinit(&self);

    /// See [`Transport::reset`]
    fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tiers() {
        assert_eq!(TransportType::Gpio.tier(), TransportTier::Tier0);
        assert_eq!(TransportType::Pwm.tier(), TransportTier::Tier0);
        assert_eq!(TransportType::I2c.tier(), TransportTier::Tier1);
        assert_eq!(TransportType::OneWire.tier(), TransportTier::Tier1);
        assert_eq!(TransportType::Radio.tier(), TransportTier::Tier2);
    }

    #[test]
    fn test_platform_error_mapping() {
        assert_eq!(
            TransportError::from(PlatformError::I2c(I2cError::Nack)),
            TransportError::Nack
        );
        assert_eq!(
            TransportError::from(PlatformError::I2c(I2cError::ArbitrationLost)),
            TransportError::BusError
        );
        assert_eq!(
            TransportError::from(PlatformError::Gpio(GpioError::InvalidPin)),
            TransportError::InvalidPin
        );
        assert_eq!(
            TransportError::from(PlatformError::Adc(AdcError::InvalidChannel)),
            TransportError::InvalidChannel
        );
    }
}
