//! Core traits for platform-agnostic driver functionality.
//!
//! This module provides trait abstractions that decouple the transport layer
//! and drivers from platform-specific services.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │          Transports / Drivers (no feature gates)         │
//! │                          │                               │
//! │                          ▼                               │
//! │        ┌────────────────────────────────────┐            │
//! │        │ TimeSource                         │            │
//! │        │ + now_ms() / now_us()              │            │
//! │        │ + delay_us() / delay_ms() (block)  │            │
//! │        └────────────────────────────────────┘            │
//! │             │                         │                  │
//! │             ▼                         ▼                  │
//! │   HAL binding (board crate)   MockClock (platform::mock) │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod time;

pub use time::TimeSource;
