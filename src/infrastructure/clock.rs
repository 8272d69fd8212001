//! Clock adapters for time operations.
//!
//! Alarms and throttles read time through the [`Clock`] port, so production
//! code uses [`SystemClock`] and tests substitute `MockClock` (in
//! `crate::infrastructure::mocks`, available with the `test-helpers`
//! feature or in test builds):
//!
//! ```toml
//! [dev-dependencies]
//! tracing-triage = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use std::time::Instant;

/// Monotonic wall time from `Instant::now()`.
///
/// This is the default clock of [`MessageAlarm`](crate::MessageAlarm).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frequency::Frequency;
    use std::time::Duration;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now();

        assert!(t2 > t1);
    }

    #[test]
    fn test_cycle_wait_shrinks_with_real_time() {
        let clock = SystemClock::new();
        let cycle = Frequency::every_minute().start(clock.now());

        let first = cycle.wait_time_before_next_cycle(clock.now()).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        let second = cycle.wait_time_before_next_cycle(clock.now()).unwrap();

        assert!(second < first);
        assert!(first <= Duration::from_secs(60));
    }
}
