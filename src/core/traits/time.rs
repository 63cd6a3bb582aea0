//! Time abstraction trait for platform-agnostic timing operations.
//!
//! This module provides the `TimeSource` trait that abstracts over the
//! platform clock so that transports can timestamp their status and drivers
//! can wait for conversions without depending on a particular HAL.

/// Platform-agnostic time source with blocking delays.
///
/// The runtime model is single-threaded and cooperative: delays busy-wait or
/// use the platform's blocking delay and never suspend.
///
/// # Example
///
/// ```ignore
/// use pico_drivers::core::traits::TimeSource;
///
/// fn wait_for_conversion<T: TimeSource>(time: &T) {
///     let start = time.now_us();
///     time.delay_ms(10);
///     assert!(time.elapsed_since(start) >= 10_000);
/// }
/// ```
pub trait TimeSource: Clone + Send {
    /// Returns current time in milliseconds since system start.
    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }

    /// Returns current time in microseconds since system start.
    fn now_us(&self) -> u64;

    /// Returns elapsed time in microseconds since a reference point.
    ///
    /// Uses saturating subtraction to handle potential overflow.
    fn elapsed_since(&self, reference_us: u64) -> u64 {
        self.now_us().saturating_sub(reference_us)
    }

    /// Block for at least `us` microseconds.
    fn delay_us(&self, us: u32);

    /// Block for at least `ms` milliseconds.
    fn delay_ms(&self, ms: u32) {
        self.delay_us(ms.saturating_mul(1000));
    }
}
