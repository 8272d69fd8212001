//! Event rates and sliding-window rate calculation.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

const MINUTE: Duration = Duration::from_secs(60);

/// A number of events per unit of time.
///
/// Rates compare by their per-minute value, so `Rate::per_second(1.0)` equals
/// `Rate::per_minute(60.0)`.
#[derive(Debug, Clone, Copy)]
pub struct Rate {
    count: f64,
    per: Duration,
}

impl Rate {
    /// No events.
    pub const ZERO: Rate = Rate {
        count: 0.0,
        per: MINUTE,
    };

    /// `count` events per `per`.
    pub fn new(count: f64, per: Duration) -> Self {
        Self { count, per }
    }

    /// `count` events per second.
    pub fn per_second(count: f64) -> Self {
        Self::new(count, Duration::from_secs(1))
    }

    /// `count` events per minute.
    pub fn per_minute(count: f64) -> Self {
        Self::new(count, MINUTE)
    }

    /// `count` events per hour.
    pub fn per_hour(count: f64) -> Self {
        Self::new(count, MINUTE * 60)
    }

    /// `count` events per day.
    pub fn per_day(count: f64) -> Self {
        Self::new(count, MINUTE * 60 * 24)
    }

    /// Number of events in one `per` period.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// The period the count refers to.
    pub fn per(&self) -> Duration {
        self.per
    }

    /// Events per minute.
    ///
    /// A non-zero count over a zero period is infinitely fast.
    pub fn per_minute_count(&self) -> f64 {
        if self.per.is_zero() {
            if self.count == 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            self.count * MINUTE.as_secs_f64() / self.per.as_secs_f64()
        }
    }

    /// Check if this rate is strictly faster than another.
    pub fn is_faster_than(&self, other: Rate) -> bool {
        self.per_minute_count() > other.per_minute_count()
    }

    /// Check if this rate is strictly slower than another.
    pub fn is_slower_than(&self, other: Rate) -> bool {
        self.per_minute_count() < other.per_minute_count()
    }
}

impl PartialEq for Rate {
    fn eq(&self, other: &Self) -> bool {
        self.per_minute_count() == other.per_minute_count()
    }
}

impl PartialOrd for Rate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.per_minute_count()
            .partial_cmp(&other.per_minute_count())
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}/minute", self.per_minute_count())
    }
}

/// Sliding-window event rate calculator.
///
/// Counts events over a fixed-size window ending "now". Until one full window
/// has elapsed since creation or the last reset, the rate is computed over the
/// elapsed time instead, so an early burst reports its true speed rather than
/// being diluted over the whole window.
///
/// Not synchronized: callers that share a calculator must serialize access.
///
/// # Example
/// ```
/// use tracing_triage::RateCalculator;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let mut calculator = RateCalculator::new(Duration::from_secs(60), start);
/// for _ in 0..10 {
///     calculator.increment(start);
/// }
///
/// // 10 events over the first 5 seconds is 120 per minute, not 10 per minute
/// let rate = calculator.rate(start + Duration::from_secs(5));
/// assert_eq!(rate.per_minute_count(), 120.0);
/// ```
#[derive(Debug, Clone)]
pub struct RateCalculator {
    window: Duration,
    started: Instant,
    count: u64,
    event_timestamps: VecDeque<Instant>,
}

impl RateCalculator {
    /// The default one-minute window.
    pub const DEFAULT_WINDOW: Duration = MINUTE;

    /// Create a calculator whose window starts at `now`.
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            started: now,
            count: 0,
            event_timestamps: VecDeque::new(),
        }
    }

    /// The window size.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Total events recorded since creation or the last reset.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Record one event at `now`.
    pub fn increment(&mut self, now: Instant) {
        self.expire_old_events(now);
        self.count = self.count.saturating_add(1);
        self.event_timestamps.push_back(now);
    }

    /// Events per unit time over the current window.
    ///
    /// Returns [`Rate::ZERO`] when no time has elapsed since the window
    /// started, so the rate is never a division by zero.
    pub fn rate(&self, now: Instant) -> Rate {
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed.is_zero() {
            return Rate::ZERO;
        }

        let in_window = self
            .event_timestamps
            .iter()
            .rev()
            .take_while(|timestamp| now.saturating_duration_since(**timestamp) <= self.window)
            .count();

        Rate::new(in_window as f64, elapsed.min(self.window))
    }

    /// Zero the counter and restart the window at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.count = 0;
        self.started = now;
        self.event_timestamps.clear();
    }

    /// Remove events that fell out of the window.
    fn expire_old_events(&mut self, now: Instant) {
        while let Some(&oldest) = self.event_timestamps.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.event_timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}
