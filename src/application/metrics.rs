//! Observability metrics for message delivery.
//!
//! Counts what happened to messages as they moved through broadcasters,
//! throttles and alarms. A single [`Metrics`] can be shared by every part of
//! a broadcast graph.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking delivery statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Cloning shares the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Messages delivered to every matching listener
    messages_transmitted: AtomicU64,
    /// Deliveries aborted by a listener error
    transmit_failures: AtomicU64,
    /// Messages consumed by a frequency throttle
    messages_throttled: AtomicU64,
    /// Alarm callbacks invoked
    alarm_triggers: AtomicU64,
    /// Alarm triggers skipped during cooldown
    triggers_suppressed: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                messages_transmitted: AtomicU64::new(0),
                transmit_failures: AtomicU64::new(0),
                messages_throttled: AtomicU64::new(0),
                alarm_triggers: AtomicU64::new(0),
                triggers_suppressed: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_transmitted(&self) {
        self.inner
            .messages_transmitted
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transmit_failure(&self) {
        self.inner.transmit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_throttled(&self) {
        self.inner.messages_throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_alarm_trigger(&self) {
        self.inner.alarm_triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_trigger_suppressed(&self) {
        self.inner
            .triggers_suppressed
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of messages delivered without error.
    pub fn messages_transmitted(&self) -> u64 {
        self.inner.messages_transmitted.load(Ordering::Relaxed)
    }

    /// Get the number of deliveries aborted by a listener error.
    pub fn transmit_failures(&self) -> u64 {
        self.inner.transmit_failures.load(Ordering::Relaxed)
    }

    /// Get the number of messages consumed by a throttle.
    pub fn messages_throttled(&self) -> u64 {
        self.inner.messages_throttled.load(Ordering::Relaxed)
    }

    /// Get the number of alarm callbacks invoked.
    pub fn alarm_triggers(&self) -> u64 {
        self.inner.alarm_triggers.load(Ordering::Relaxed)
    }

    /// Get the number of alarm triggers skipped during cooldown.
    pub fn triggers_suppressed(&self) -> u64 {
        self.inner.triggers_suppressed.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_transmitted: self.messages_transmitted(),
            transmit_failures: self.transmit_failures(),
            messages_throttled: self.messages_throttled(),
            alarm_triggers: self.alarm_triggers(),
            triggers_suppressed: self.triggers_suppressed(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.messages_transmitted.store(0, Ordering::Relaxed);
        self.inner.transmit_failures.store(0, Ordering::Relaxed);
        self.inner.messages_throttled.store(0, Ordering::Relaxed);
        self.inner.alarm_triggers.store(0, Ordering::Relaxed);
        self.inner.triggers_suppressed.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Messages delivered to every matching listener
    pub messages_transmitted: u64,
    /// Deliveries aborted by a listener error
    pub transmit_failures: u64,
    /// Messages consumed by a frequency throttle
    pub messages_throttled: u64,
    /// Alarm callbacks invoked
    pub alarm_triggers: u64,
    /// Alarm triggers skipped during cooldown
    pub triggers_suppressed: u64,
}

impl MetricsSnapshot {
    /// Fraction of throttle decisions that consumed the message (0.0 to 1.0).
    ///
    /// Returns 0.0 if nothing has been transmitted or throttled.
    pub fn throttle_rate(&self) -> f64 {
        let total = self
            .messages_transmitted
            .saturating_add(self.messages_throttled);
        if total == 0 {
            0.0
        } else {
            self.messages_throttled as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initial_state() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_record_and_snapshot() {
        let metrics = Metrics::new();
        metrics.record_transmitted();
        metrics.record_transmitted();
        metrics.record_transmit_failure();
        metrics.record_throttled();
        metrics.record_alarm_trigger();
        metrics.record_trigger_suppressed();
        metrics.record_trigger_suppressed();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.messages_transmitted, 2);
        assert_eq!(snapshot.transmit_failures, 1);
        assert_eq!(snapshot.messages_throttled, 1);
        assert_eq!(snapshot.alarm_triggers, 1);
        assert_eq!(snapshot.triggers_suppressed, 2);
    }

    #[test]
    fn test_throttle_rate() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().throttle_rate(), 0.0);

        metrics.record_transmitted();
        assert_eq!(metrics.snapshot().throttle_rate(), 0.0);

        metrics.record_throttled();
        metrics.record_throttled();
        metrics.record_throttled();
        assert!((metrics.snapshot().throttle_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_transmitted();
        metrics.record_alarm_trigger();

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_clone_shares_counters() {
        let metrics1 = Metrics::new();
        metrics1.record_throttled();

        let metrics2 = metrics1.clone();
        metrics2.record_throttled();

        assert_eq!(metrics1.messages_throttled(), 2);
        assert_eq!(metrics2.messages_throttled(), 2);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::thread;

        let metrics = Metrics::new();
        let mut handles = vec![];

        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.record_transmitted();
                    m.record_throttled();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.messages_transmitted(), 1000);
        assert_eq!(metrics.messages_throttled(), 1000);
    }
}
