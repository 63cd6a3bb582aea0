#![cfg_attr(not(any(test, feature = "mock")), no_std)]

//! pico_drivers - Peripheral transports and tiered device drivers for microcontrollers
//!
//! This library provides a uniform way to discover, claim and operate on-board
//! peripherals (GPIO, ADC, PWM, buses) and off-board chips attached over I2C,
//! SPI or OneWire.
//!
//! ## Layers
//!
//! - [`platform`]: HAL boundary traits, embedded-hal adapters and host mocks
//! - [`core`]: logging, time source and the resource manager
//! - [`transport`]: bus/pin transports with shared lifecycle, statistics and registry
//! - [`devices`]: register schema, capability schema, driver tier model and example drivers

// Logging macros must be declared before the modules that use them
#[macro_use]
pub mod core;

// Platform abstraction layer (HAL boundary)
pub mod platform;

// Transports over the platform primitives
pub mod transport;

// Driver framework and example chip drivers
pub mod devices;
