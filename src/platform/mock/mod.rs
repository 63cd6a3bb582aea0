//! Mock platform implementation for testing
//!
//! This module provides mock implementations of the platform traits that can
//! be used for unit testing without requiring actual hardware. Bus mocks
//! simulate register-file devices so drivers can be exercised end to end.
//!
//! # Feature Gate
//!
//! This module is available in two contexts:
//! - During test builds (`#[cfg(test)]`)
//! - When the `mock` feature is enabled
//!
//! # Example
//!
//! ```ignore
//! use pico_drivers::platform::mock::{MockClock, MockI2c, MockI2cDevice};
//! use pico_drivers::transport::I2cTransport;
//!
//! let mut bus = MockI2c::new();
//! bus.add_device(MockI2cDevice::new(0x76).with_register(0xD0, 0x58));
//! let mut i2c = I2cTransport::new("i2c0", bus, MockClock::new());
//! i2c.init().unwrap();
//! assert_eq!(i2c.read_reg(0x76, 0xD0).unwrap(), 0x58);
//! ```

#![cfg(any(test, feature = "mock"))]

mod adc;
mod clock;
mod gpio;
mod i2c;
mod onewire;
mod pwm;
mod spi;
mod uart;

pub use adc::MockAdc;
pub use clock::MockClock;
pub use gpio::MockGpio;
pub use i2c::{I2cTransaction, MockI2c, MockI2cDevice};
pub use onewire::{MockDs18b20, MockOneWire};
pub use pwm::{MockPwm, MockPwmChannel};
pub use spi::{MockSpi, MockSpiDevice};
pub use uart::MockUart;
