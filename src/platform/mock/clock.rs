//! Mock clock implementation for testing

use crate::core::traits::TimeSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Mock clock
///
/// Uses simulated time: delays advance the clock instantly. Clones share the
/// same counter so a transport and the test observing it agree on "now".
#[derive(Debug, Clone)]
pub struct MockClock {
    now_us: Arc<AtomicU64>,
}

impl MockClock {
    /// Create a clock starting at 1 ms so the first timestamp is non-zero
    pub fn new() -> Self {
        Self::starting_at(1_000)
    }

    /// Create a clock starting at `us`
    pub fn starting_at(us: u64) -> Self {
        Self {
            now_us: Arc::new(AtomicU64::new(us)),
        }
    }

    /// Advance simulated time by `us`
    pub fn advance_us(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::SeqCst);
    }

    /// Advance simulated time by `ms`
    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms.saturating_mul(1000));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MockClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }

    fn delay_us(&self, us: u32) {
        self.advance_us(us as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_delay_us() {
        let clock = MockClock::starting_at(0);
        assert_eq!(clock.now_us(), 0);

        clock.delay_us(1000);
        assert_eq!(clock.now_us(), 1000);

        clock.delay_us(500);
        assert_eq!(clock.now_us(), 1500);
    }

    #[test]
    fn test_mock_clock_delay_ms() {
        let clock = MockClock::starting_at(0);
        clock.delay_ms(5);
        assert_eq!(clock.now_ms(), 5);
        assert_eq!(clock.elapsed_since(1000), 4000);
    }

    #[test]
    fn test_mock_clock_clones_share_time() {
        let clock = MockClock::new();
        let other = clock.clone();
        other.advance_ms(2);
        assert_eq!(clock.now_us(), 3_000);
    }
}
