//! Manually driven clock.

use crate::application::ports::Clock;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A clock that only moves when a test moves it.
///
/// Rate windows, alarm cooldowns and throttle cycles all read time through
/// [`Clock`], so driving this clock makes them deterministic. Clones share
/// the same time.
///
/// ```
/// use tracing_triage::infrastructure::mocks::MockClock;
/// use tracing_triage::{Clock, Frequency};
/// use std::time::{Duration, Instant};
///
/// let clock = MockClock::new(Instant::now());
/// let cycle = Frequency::every_minute().start(clock.now());
///
/// clock.advance(Duration::from_secs(45));
/// assert_eq!(
///     cycle.wait_time_before_next_cycle(clock.now()),
///     Some(Duration::from_secs(15))
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<Instant>>,
}

impl MockClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.update(|now| *now += duration);
    }

    /// Jump to `instant`. May move time backwards.
    pub fn set(&self, instant: Instant) {
        self.update(|now| *now = instant);
    }

    fn update(&self, change: impl FnOnce(&mut Instant)) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        change(&mut now);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rate::RateCalculator;

    #[test]
    fn test_mock_clock_drives_rate_windows() {
        let clock = MockClock::new(Instant::now());
        let mut calculator = RateCalculator::new(Duration::from_secs(60), clock.now());

        for _ in 0..30 {
            clock.advance(Duration::from_secs(1));
            calculator.increment(clock.now());
        }

        assert_eq!(calculator.count(), 30);
        assert!((calculator.rate(clock.now()).per_minute_count() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_clones_share_time() {
        let start = Instant::now();
        let clock = MockClock::new(start);
        let shared = clock.clone();

        std::thread::spawn(move || shared.advance(Duration::from_secs(5)))
            .join()
            .unwrap();
        assert_eq!(clock.now(), start + Duration::from_secs(5));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
