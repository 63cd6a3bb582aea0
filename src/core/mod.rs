//! Core infrastructure
//!
//! This module contains the fundamental components shared by transports and
//! drivers: logging macros, the time source abstraction and the process-wide
//! resource manager.

#[macro_use]
pub mod logging;
pub mod resources;
pub mod traits;
