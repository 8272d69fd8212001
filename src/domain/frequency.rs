//! Repeating intervals.
//!
//! A [`Frequency`] is an immutable interval specification. Starting it yields
//! a [`Cycle`], a cursor over the instants at which the interval repeats.
//! Cycles are used to throttle repeated messages and to gate alarm
//! re-triggering.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

const SECOND: Duration = Duration::from_secs(1);
const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Error returned when text cannot be parsed as a frequency.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid frequency: `{text}`")]
pub struct FrequencyParseError {
    /// The text that failed to parse
    pub text: String,
}

/// A repeating interval, e.g. "every 30 minutes".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frequency {
    cycle_length: Duration,
}

impl Frequency {
    /// Repeat every `cycle_length`.
    pub const fn every(cycle_length: Duration) -> Self {
        Self { cycle_length }
    }

    /// Happen once and never repeat.
    pub const fn once() -> Self {
        Self::every(Duration::MAX)
    }

    /// Repeat with no delay.
    pub const fn continuously() -> Self {
        Self::every(Duration::ZERO)
    }

    /// Repeat every second.
    pub const fn every_second() -> Self {
        Self::every(SECOND)
    }

    /// Repeat every 30 seconds.
    pub const fn every_30_seconds() -> Self {
        Self::every(Duration::from_secs(30))
    }

    /// Repeat every minute.
    pub const fn every_minute() -> Self {
        Self::every(MINUTE)
    }

    /// Repeat `times` times per second.
    pub fn cycles_per_second(times: u32) -> Self {
        Self::every(SECOND / times.max(1))
    }

    /// Repeat `times` times per minute.
    pub fn cycles_per_minute(times: u32) -> Self {
        Self::every(MINUTE / times.max(1))
    }

    /// Repeat `times` times per hour.
    pub fn cycles_per_hour(times: u32) -> Self {
        Self::every(HOUR / times.max(1))
    }

    /// Repeat `times` times per day.
    pub fn cycles_per_day(times: u32) -> Self {
        Self::every(DAY / times.max(1))
    }

    /// The interval between repetitions.
    pub fn cycle_length(&self) -> Duration {
        self.cycle_length
    }

    /// Check if this frequency never repeats.
    pub fn is_once(&self) -> bool {
        self.cycle_length == Duration::MAX
    }

    /// Check if this frequency repeats with no delay.
    pub fn is_continuous(&self) -> bool {
        self.cycle_length.is_zero()
    }

    /// Start a cycle anchored at `now`.
    pub fn start(&self, now: Instant) -> Cycle {
        Cycle {
            start: now,
            cycle_length: self.cycle_length,
            last: None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_once() {
            f.write_str("once")
        } else if self.is_continuous() {
            f.write_str("continuously")
        } else {
            write!(f, "every {:?}", self.cycle_length)
        }
    }
}

impl FromStr for Frequency {
    type Err = FrequencyParseError;

    /// Parse text such as `"every 30 seconds"`, `"every minute"`,
    /// `"2.5 hours"`, `"once"` or `"continuously"`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let error = || FrequencyParseError {
            text: text.to_string(),
        };

        let lowered = text.trim().to_ascii_lowercase();
        let trimmed = lowered
            .strip_prefix("every")
            .unwrap_or(lowered.as_str())
            .trim();

        match trimmed {
            "" => return Err(error()),
            "once" => return Ok(Frequency::once()),
            "continuously" => return Ok(Frequency::continuously()),
            _ => {}
        }

        // "every minute" means one minute
        let (amount, unit) = match trimmed.find(|c: char| !(c.is_ascii_digit() || c == '.')) {
            Some(0) => ("1", trimmed),
            Some(index) => (&trimmed[..index], trimmed[index..].trim()),
            None => return Err(error()),
        };

        let amount: f64 = amount.parse().map_err(|_| error())?;
        let unit = match unit {
            "ms" | "millisecond" | "milliseconds" => Duration::from_millis(1),
            "s" | "sec" | "second" | "seconds" => SECOND,
            "m" | "min" | "minute" | "minutes" => MINUTE,
            "h" | "hour" | "hours" => HOUR,
            "d" | "day" | "days" => DAY,
            "w" | "week" | "weeks" => DAY * 7,
            _ => return Err(error()),
        };

        let seconds = amount * unit.as_secs_f64();
        Duration::try_from_secs_f64(seconds)
            .map(Frequency::every)
            .map_err(|_| error())
    }
}

/// A cursor over the repetitions of a [`Frequency`].
#[derive(Debug, Clone)]
pub struct Cycle {
    start: Instant,
    cycle_length: Duration,
    last: Option<Instant>,
}

impl Cycle {
    /// When the cycle started.
    pub fn start(&self) -> Instant {
        self.start
    }

    /// The last instant returned by this cursor.
    pub fn last(&self) -> Option<Instant> {
        self.last
    }

    /// Advance the cursor.
    ///
    /// The first call returns the cycle's start, so the first check against a
    /// fresh cycle always succeeds. Every later call returns the previously
    /// returned instant plus one cycle length. Returns `None` once the next
    /// instant is unrepresentable, which is how [`Frequency::once`] ends.
    pub fn next(&mut self) -> Option<Instant> {
        let next = match self.last {
            None => Some(self.start),
            Some(last) => last.checked_add(self.cycle_length),
        };
        if next.is_some() {
            self.last = next;
        }
        next
    }

    /// Advance the cursor to the first cycle boundary strictly after `now`.
    ///
    /// Boundaries are `start + k * cycle_length` for `k >= 1`, so an idle
    /// period never leaves a backlog of already-passed boundaries behind. A
    /// continuous cycle returns `now`.
    pub fn next_after(&mut self, now: Instant) -> Option<Instant> {
        let next = self.boundary_after(now);
        if next.is_some() {
            self.last = next;
        }
        next
    }

    /// Time remaining until the next boundary after `now`.
    ///
    /// Returns `None` if the cycle never repeats.
    pub fn wait_time_before_next_cycle(&self, now: Instant) -> Option<Duration> {
        self.boundary_after(now)
            .map(|boundary| boundary.saturating_duration_since(now))
    }

    fn boundary_after(&self, now: Instant) -> Option<Instant> {
        if self.cycle_length.is_zero() {
            return Some(now);
        }

        let length = self.cycle_length.as_nanos();
        let elapsed = now.saturating_duration_since(self.start).as_nanos();
        let offset = (elapsed / length + 1).checked_mul(length)?;
        let seconds = u64::try_from(offset / 1_000_000_000).ok()?;
        let nanos = (offset % 1_000_000_000) as u32;

        self.start.checked_add(Duration::new(seconds, nanos))
    }
}
