//! Per-message delivery throttling.
//!
//! Messages built with a maximum frequency are forwarded at most once per
//! cycle of that frequency for each [`ThrottleKey`]. Use a
//! [`FrequencyThrottle`] as the handler of a
//! [`Repeater`](crate::application::broadcaster::Repeater) so everything
//! downstream of it sees throttled traffic.

use crate::application::broadcaster::{Disposition, MessageHandler};
use crate::application::listener::TransmitError;
use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, Storage};
use crate::domain::frequency::Frequency;
use crate::domain::message::Message;
use crate::domain::signature::ThrottleKey;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Delivery state tracked for each throttle key.
#[derive(Debug, Clone, Default)]
pub struct DeliveryRecord {
    last_delivered: Option<Instant>,
    throttled: u64,
}

impl DeliveryRecord {
    /// When a message with this key was last forwarded.
    pub fn last_delivered(&self) -> Option<Instant> {
        self.last_delivered
    }

    /// Messages consumed since the last forward.
    pub fn throttled(&self) -> u64 {
        self.throttled
    }

    /// Decide whether a message may be forwarded at `now`, updating state.
    fn admit(&mut self, frequency: &Frequency, now: Instant) -> bool {
        let due = match self.last_delivered {
            None => true,
            Some(_) if frequency.is_once() => false,
            Some(last) => now.saturating_duration_since(last) >= frequency.cycle_length(),
        };

        if due {
            self.last_delivered = Some(now);
            self.throttled = 0;
        } else {
            self.throttled = self.throttled.saturating_add(1);
        }
        due
    }
}

/// Consumes messages that repeat faster than their maximum frequency.
///
/// Generic over the storage implementation. In production, use
/// `Arc<ShardedStorage>`.
#[derive(Clone)]
pub struct FrequencyThrottle<S>
where
    S: Storage<ThrottleKey, DeliveryRecord> + Clone,
{
    storage: S,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl<S> FrequencyThrottle<S>
where
    S: Storage<ThrottleKey, DeliveryRecord> + Clone,
{
    /// Create a throttle over `storage`, reading time from `clock`.
    pub fn new(storage: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            metrics: Metrics::new(),
        }
    }

    /// Record throttling statistics into shared metrics.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Throttling metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Number of tracked throttle keys.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Messages consumed across all keys since each key last forwarded.
    ///
    /// Unlike the throttled counter in [`Metrics`], this drops back as keys
    /// forward again, so it shows how much is being held back right now.
    pub fn pending_throttled(&self) -> u64 {
        let mut total = 0u64;
        self.storage
            .for_each(|_, record| total = total.saturating_add(record.throttled));
        total
    }

    /// Forget every key.
    pub fn clear(&self) {
        self.storage.clear();
    }

    /// Forget keys whose last forward is at least `age` old.
    ///
    /// A purged key starts over: its next message is forwarded.
    pub fn purge_older_than(&self, age: Duration) {
        let now = self.clock.now();
        self.storage.retain(|_, record| {
            record
                .last_delivered
                .map_or(false, |last| now.saturating_duration_since(last) < age)
        });
    }
}

impl<S> MessageHandler for FrequencyThrottle<S>
where
    S: Storage<ThrottleKey, DeliveryRecord> + Clone,
{
    fn handle(&self, message: &Message) -> Result<Disposition, TransmitError> {
        let Some(frequency) = message.maximum_frequency().copied() else {
            return Ok(Disposition::Forward);
        };

        let key = ThrottleKey::of(message);
        let now = self.clock.now();
        let (forward, throttled) = self.storage.with_entry_mut(key, DeliveryRecord::default, |record| {
            let forward = record.admit(&frequency, now);
            (forward, record.throttled)
        });

        if forward {
            return Ok(Disposition::Forward);
        }

        self.metrics.record_throttled();
        trace!(
            key = %key,
            kind = %message.kind(),
            %frequency,
            throttled,
            "Message throttled"
        );
        Ok(Disposition::Consume)
    }
}

impl<S> std::fmt::Debug for FrequencyThrottle<S>
where
    S: Storage<ThrottleKey, DeliveryRecord> + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrequencyThrottle")
            .field("keys", &self.storage.len())
            .field("clock", &self.clock)
            .finish()
    }
}
