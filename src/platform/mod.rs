//! Platform abstraction layer
//!
//! This module is the only place where HAL bindings enter the crate. A board
//! support crate implements the traits in [`traits`] (or wraps its
//! `embedded-hal` drivers with [`ehal`]) and hands the result to the
//! transports.

pub mod ehal;
pub mod error;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types
pub use error::{PlatformError, Result};
pub use traits::{AdcUnit, GpioPort, I2cBus, OneWireLine, PwmUnit, SpiBus, UartPort};
