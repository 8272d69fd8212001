//! Error-rate alarms.
//!
//! A [`MessageAlarm`] listens for alarming messages (problems or worse, by
//! default), tracks how fast they arrive, and invokes a callback when the
//! rate exceeds a threshold. After each trigger the callback stays silent for
//! one full cooldown period, so a sustained burst produces one trigger per
//! cooldown period.
//!
//! ```text
//! Idle --alarming message--> Accumulating --rate > threshold--> triggered
//!   ^                             ^                                  |
//!   |                             +--------- cooldown elapsed -------+
//!   +------------------------------------------ (rate reset) --------+
//! ```

use crate::application::error::BuildError;
use crate::application::listener::{Listener, TransmitError};
use crate::application::metrics::Metrics;
use crate::application::ports::Clock;
use crate::domain::frequency::Frequency;
use crate::domain::kind::MessageKind;
use crate::domain::message::Message;
use crate::domain::ranking::Scales;
use crate::domain::rate::{Rate, RateCalculator};
use crate::infrastructure::clock::SystemClock;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Callback invoked with the observed rate when an alarm fires.
pub type TriggerCallback = Arc<dyn Fn(Rate) -> Result<(), TransmitError> + Send + Sync>;

/// Predicate deciding which messages count toward an alarm's rate.
pub type AlarmPredicate = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// Observable phase of an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    /// No alarming message counted since the last reset
    Idle,
    /// Counting alarming messages, free to trigger
    Accumulating,
    /// Triggered recently, further triggers are suppressed
    CoolingDown,
}

/// Mutable alarm state, always accessed under one lock.
#[derive(Debug)]
struct Tracking {
    rate: RateCalculator,
    triggered: bool,
    next_allowed: Option<Instant>,
}

impl Tracking {
    /// Check the cooldown and, if triggering is allowed, start the next one.
    ///
    /// The first trigger is always allowed. Each allowed trigger blocks the
    /// next one for a full cycle length from `now`. `next_allowed` is `None`
    /// after a trigger only when that sum overflows, as it does for
    /// [`Frequency::once`].
    fn consume_cooldown(&mut self, frequency: Frequency, now: Instant) -> bool {
        let allowed = !self.triggered || self.next_allowed.map_or(false, |at| now >= at);
        if allowed {
            self.triggered = true;
            self.next_allowed = now.checked_add(frequency.cycle_length());
        }
        allowed
    }

    fn is_cooling_down(&self, now: Instant) -> bool {
        self.triggered && self.next_allowed.map_or(true, |at| now < at)
    }
}

/// A listener that fires a callback when alarming messages arrive too fast.
///
/// The increment, rate check, cooldown check and reset happen under a single
/// lock, so concurrent callers never both fire within one cooldown. The
/// callback runs after the lock is released and its error is returned from
/// [`on_message`](Listener::on_message).
///
/// # Example
/// ```
/// use tracing_triage::{Broadcaster, MessageAlarm, Rate, Scales, Transceiver};
/// use std::sync::Arc;
///
/// let alarm = MessageAlarm::builder(|rate: Rate| {
///     eprintln!("error rate {}", rate);
///     Ok(())
/// })
/// .with_trigger_rate(Rate::per_minute(10.0))
/// .build()
/// .unwrap();
///
/// let broadcaster = Broadcaster::new("service", Arc::new(Scales::standard()));
/// broadcaster.add_listener(Arc::new(alarm));
/// broadcaster.problem("Request failed", &[]).unwrap();
/// ```
pub struct MessageAlarm {
    trigger_rate: Rate,
    maximum_trigger_frequency: Frequency,
    is_alarming: AlarmPredicate,
    on_trigger: TriggerCallback,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    tracking: Mutex<Tracking>,
}

impl MessageAlarm {
    /// Start configuring an alarm that invokes `on_trigger` when it fires.
    pub fn builder<F>(on_trigger: F) -> MessageAlarmBuilder
    where
        F: Fn(Rate) -> Result<(), TransmitError> + Send + Sync + 'static,
    {
        MessageAlarmBuilder::new(Arc::new(on_trigger))
    }

    /// The rate that must be exceeded to fire.
    pub fn trigger_rate(&self) -> Rate {
        self.trigger_rate
    }

    /// The cooldown between triggers.
    pub fn maximum_trigger_frequency(&self) -> Frequency {
        self.maximum_trigger_frequency
    }

    /// Alarm metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The current phase of the alarm.
    pub fn state(&self) -> AlarmState {
        let now = self.clock.now();
        let tracking = self.lock();
        if tracking.is_cooling_down(now) {
            AlarmState::CoolingDown
        } else if tracking.rate.count() == 0 {
            AlarmState::Idle
        } else {
            AlarmState::Accumulating
        }
    }

    /// The rate of alarming messages since the last trigger.
    pub fn current_rate(&self) -> Rate {
        let now = self.clock.now();
        self.lock().rate.rate(now)
    }

    /// Count the message if alarming and return the rate if the alarm fires.
    fn record(&self, message: &Message) -> Option<Rate> {
        if !(self.is_alarming)(message) {
            return None;
        }

        let now = self.clock.now();
        let mut tracking = self.lock();
        tracking.rate.increment(now);

        let rate = tracking.rate.rate(now);
        if !rate.is_faster_than(self.trigger_rate) {
            return None;
        }

        if !tracking.consume_cooldown(self.maximum_trigger_frequency, now) {
            self.metrics.record_trigger_suppressed();
            debug!(
                rate = %rate,
                trigger_rate = %self.trigger_rate,
                "Alarm trigger suppressed by cooldown"
            );
            return None;
        }

        tracking.rate.reset(now);
        Some(rate)
    }

    fn lock(&self) -> MutexGuard<'_, Tracking> {
        self.tracking.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Listener for MessageAlarm {
    fn on_message(&self, message: &Message) -> Result<(), TransmitError> {
        if let Some(rate) = self.record(message) {
            self.metrics.record_alarm_trigger();
            warn!(
                rate = %rate,
                trigger_rate = %self.trigger_rate,
                kind = %message.kind(),
                "Alarm triggered"
            );
            (self.on_trigger)(rate)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MessageAlarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageAlarm")
            .field("trigger_rate", &self.trigger_rate)
            .field("maximum_trigger_frequency", &self.maximum_trigger_frequency)
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for [`MessageAlarm`].
pub struct MessageAlarmBuilder {
    on_trigger: TriggerCallback,
    trigger_rate: Rate,
    maximum_trigger_frequency: Frequency,
    window: Duration,
    clock: Option<Arc<dyn Clock>>,
    scales: Option<Arc<Scales>>,
    threshold: MessageKind,
    is_alarming: Option<AlarmPredicate>,
    metrics: Option<Metrics>,
}

impl MessageAlarmBuilder {
    fn new(on_trigger: TriggerCallback) -> Self {
        Self {
            on_trigger,
            trigger_rate: Rate::per_minute(10.0),
            maximum_trigger_frequency: Frequency::every(Duration::from_secs(30 * 60)),
            window: RateCalculator::DEFAULT_WINDOW,
            clock: None,
            scales: None,
            threshold: MessageKind::Problem,
            is_alarming: None,
            metrics: None,
        }
    }

    /// Fire when alarming messages arrive faster than `rate`.
    ///
    /// Default: 10 per minute.
    pub fn with_trigger_rate(mut self, rate: Rate) -> Self {
        self.trigger_rate = rate;
        self
    }

    /// Fire at most once per cycle length of `frequency`, measured from the
    /// previous trigger.
    ///
    /// Default: every 30 minutes.
    pub fn with_maximum_trigger_frequency(mut self, frequency: Frequency) -> Self {
        self.maximum_trigger_frequency = frequency;
        self
    }

    /// Measure the rate over a sliding `window`.
    ///
    /// Default: one minute. Must be greater than zero.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Read time from `clock`.
    ///
    /// Default: the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Rank the threshold kind with `scales`.
    ///
    /// Default: the standard scales.
    pub fn with_scales(mut self, scales: Arc<Scales>) -> Self {
        self.scales = Some(scales);
        self
    }

    /// Count messages at least as severe as `kind`.
    ///
    /// Default: problem. Ignored if [`alarming_when`](Self::alarming_when)
    /// is set.
    pub fn with_threshold(mut self, kind: MessageKind) -> Self {
        self.threshold = kind;
        self
    }

    /// Count messages matching `predicate` instead of a severity threshold.
    pub fn alarming_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.is_alarming = Some(Arc::new(predicate));
        self
    }

    /// Record trigger statistics into shared metrics.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the alarm.
    ///
    /// # Errors
    /// Returns `BuildError::ZeroWindow` for an empty window, or
    /// `BuildError::Rank` if the threshold kind has no severity.
    pub fn build(self) -> Result<MessageAlarm, BuildError> {
        if self.window.is_zero() {
            return Err(BuildError::ZeroWindow);
        }

        let is_alarming = match self.is_alarming {
            Some(predicate) => predicate,
            None => {
                let scales = self
                    .scales
                    .unwrap_or_else(|| Arc::new(Scales::standard()));
                let threshold = scales.severity_of(&self.threshold)?;
                Arc::new(move |message: &Message| message.severity() >= threshold)
            }
        };

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));
        let tracking = Tracking {
            rate: RateCalculator::new(self.window, clock.now()),
            triggered: false,
            next_allowed: None,
        };

        Ok(MessageAlarm {
            trigger_rate: self.trigger_rate,
            maximum_trigger_frequency: self.maximum_trigger_frequency,
            is_alarming,
            on_trigger: self.on_trigger,
            clock,
            metrics: self.metrics.unwrap_or_default(),
            tracking: Mutex::new(tracking),
        })
    }
}

impl fmt::Debug for MessageAlarmBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageAlarmBuilder")
            .field("trigger_rate", &self.trigger_rate)
            .field("maximum_trigger_frequency", &self.maximum_trigger_frequency)
            .field("window", &self.window)
            .field("threshold", &self.threshold)
            .finish()
    }
}
