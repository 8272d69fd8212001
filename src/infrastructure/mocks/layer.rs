//! Capturing tracing layer for asserting on emitted events.

use crate::infrastructure::visitor::FieldVisitor;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::Level;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// An event seen by [`MockCaptureLayer`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    /// The `message` field, or empty if the event had none.
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

/// A layer that records every event it sees.
///
/// Clones share one event list, so a test keeps a clone and hands the other
/// to the subscriber.
///
/// ```
/// use tracing_triage::infrastructure::mocks::MockCaptureLayer;
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let capture = MockCaptureLayer::new();
/// let subscriber = tracing_subscriber::registry().with(capture.clone());
///
/// tracing::subscriber::with_default(subscriber, || {
///     tracing::warn!(target: "app::disk", free_mb = 12u64, "Disk nearly full");
/// });
///
/// let events = capture.events_from("app::disk");
/// assert_eq!(events[0].message, "Disk nearly full");
/// assert_eq!(events[0].fields["free_mb"], "12");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockCaptureLayer {
    captured: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl MockCaptureLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events, in the order they were emitted.
    pub fn get_captured(&self) -> Vec<CapturedEvent> {
        self.events().clone()
    }

    /// Events whose target is exactly `target`.
    pub fn events_from(&self, target: &str) -> Vec<CapturedEvent> {
        self.events()
            .iter()
            .filter(|event| event.target == target)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events().len()
    }

    pub fn clear(&self) {
        self.events().clear();
    }

    // A failed assertion on another thread must not hide what was captured
    fn events(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        self.captured.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> Layer<S> for MockCaptureLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);
        let (message, fields) = visitor.into_parts();

        let metadata = event.metadata();
        self.events().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: message.unwrap_or_default(),
            fields,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{error, info};
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_captures_in_emission_order() {
        let capture = MockCaptureLayer::new();
        let subscriber = tracing_subscriber::registry().with(capture.clone());

        tracing::subscriber::with_default(subscriber, || {
            info!(target: "app::auth", user = "alice", "Signed in");
            error!(target: "app::db", code = 57u64);
        });

        let events = capture.get_captured();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, Level::INFO);
        assert_eq!(events[0].message, "Signed in");
        assert_eq!(events[0].fields.get("user").map(String::as_str), Some("alice"));

        assert_eq!(events[1].target, "app::db");
        assert!(events[1].message.is_empty());
        assert_eq!(capture.events_from("app::db").len(), 1);
        assert!(capture.events_from("app").is_empty());

        capture.clear();
        assert_eq!(capture.count(), 0);
    }
}
