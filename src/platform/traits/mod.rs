//! Platform abstraction traits
//!
//! This module defines the raw bus primitives a HAL binding must provide.
//! Transports are built on top of these traits and never touch hardware
//! registers directly.

pub mod adc;
pub mod gpio;
pub mod i2c;
pub mod onewire;
pub mod pwm;
pub mod spi;
pub mod uart;

// Re-export trait interfaces
pub use adc::{AdcConfig, AdcUnit};
pub use gpio::{GpioConfig, GpioPort, PinMode};
pub use i2c::{I2cBus, I2cConfig, I2cMode};
pub use onewire::{OneWireConfig, OneWireLine};
pub use pwm::{PwmConfig, PwmUnit};
pub use spi::{SpiBitOrder, SpiBus, SpiConfig, SpiMode, CS_UNMANAGED};
pub use uart::{UartConfig, UartParity, UartPort, UartStopBits};
