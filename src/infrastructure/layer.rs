//! Tracing integration layer.
//!
//! Provides a `tracing::Layer` that turns `tracing` events into messages
//! and transmits them through a [`Broadcaster`], so alarms, throttles and
//! message lists see ordinary log output.

use crate::application::broadcaster::Broadcaster;
use crate::application::error::BuildError;
use crate::application::metrics::Metrics;
use crate::domain::kind::MessageKind;
use crate::domain::message::{CodeContext, Message};
use crate::infrastructure::visitor::FieldVisitor;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Events from targets under this prefix are never forwarded.
///
/// This covers the crate's own diagnostics and [`TracingSink`] output, so
/// forwarding cannot loop back into the broadcaster.
///
/// [`TracingSink`]: crate::infrastructure::tracing_sink::TracingSink
const INTERNAL_TARGET_PREFIX: &str = "tracing_triage";

/// The message kind an event of `level` becomes.
pub fn kind_for_level(level: &Level) -> MessageKind {
    match *level {
        Level::ERROR => MessageKind::Problem,
        Level::WARN => MessageKind::Warning,
        Level::INFO => MessageKind::Information,
        Level::DEBUG => MessageKind::Narration,
        _ => MessageKind::Trace,
    }
}

/// Builder for configuring a [`BroadcastLayer`].
#[derive(Debug)]
pub struct BroadcastLayerBuilder {
    broadcaster: Arc<Broadcaster>,
    exempt_targets: BTreeSet<String>,
    metrics: Option<Metrics>,
}

impl BroadcastLayerBuilder {
    /// Set targets whose events are not forwarded.
    ///
    /// Duplicate and empty targets are ignored. Matching is exact.
    ///
    /// ```no_run
    /// # use tracing_triage::{BroadcastLayer, Broadcaster, Scales};
    /// # use std::sync::Arc;
    /// let broadcaster = Arc::new(Broadcaster::new("logs", Arc::new(Scales::standard())));
    /// let layer = BroadcastLayer::builder(broadcaster)
    ///     .with_exempt_targets(vec!["hyper::proto".to_string()])
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn with_exempt_targets(mut self, targets: Vec<String>) -> Self {
        self.exempt_targets = targets.into_iter().filter(|t| !t.is_empty()).collect();
        self
    }

    /// Count forwarded events and forwarding failures in `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the layer.
    ///
    /// # Errors
    /// Returns `BuildError::Rank` if a kind that events map to has no rank
    /// in the broadcaster's scales.
    pub fn build(self) -> Result<BroadcastLayer, BuildError> {
        let scales = self.broadcaster.shared_scales();
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            let kind = kind_for_level(&level);
            scales.severity_of(&kind)?;
            scales.importance_of(&kind)?;
        }

        Ok(BroadcastLayer {
            broadcaster: self.broadcaster,
            exempt_targets: Arc::new(self.exempt_targets),
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}

/// A `tracing::Layer` that forwards events to a broadcaster.
///
/// Each event becomes a message:
/// - the level picks the kind (ERROR is a problem, WARN a warning, INFO
///   information, DEBUG narration, TRACE trace)
/// - the `message` field is the text
/// - other fields follow as `key=value` arguments
/// - target and line form the code context, so throttles key on call sites
///
/// A listener error cannot be returned from a layer. It is counted in the
/// layer's metrics and logged under this crate's target instead.
#[derive(Clone)]
pub struct BroadcastLayer {
    broadcaster: Arc<Broadcaster>,
    exempt_targets: Arc<BTreeSet<String>>,
    metrics: Metrics,
}

impl BroadcastLayer {
    /// Start configuring a layer that forwards to `broadcaster`.
    pub fn builder(broadcaster: Arc<Broadcaster>) -> BroadcastLayerBuilder {
        BroadcastLayerBuilder {
            broadcaster,
            exempt_targets: BTreeSet::new(),
            metrics: None,
        }
    }

    /// The broadcaster events are forwarded to.
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Forwarding metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Check if events from `target` are forwarded.
    pub fn forwards(&self, target: &str) -> bool {
        !target.starts_with(INTERNAL_TARGET_PREFIX) && !self.exempt_targets.contains(target)
    }

    /// Convert an event into a message.
    fn to_message(&self, event: &tracing::Event<'_>) -> Option<Message> {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);
        let (message, fields) = visitor.into_parts();

        // Literal `$` in log text must survive interpolation
        let mut text = message
            .unwrap_or_else(|| metadata.name().to_string())
            .replace('$', "$$");
        for _ in 0..fields.len() {
            text.push_str(" $");
        }

        let context = match metadata.line() {
            Some(line) => CodeContext::new(format!("{}:{}", metadata.target(), line)),
            None => CodeContext::new(metadata.target().to_string()),
        };

        Message::builder(kind_for_level(metadata.level()), text)
            .arguments(fields.iter().map(|(key, value)| format!("{}={}", key, value)))
            .context(context)
            .build(self.broadcaster.shared_scales())
            .ok()
    }
}

impl std::fmt::Debug for BroadcastLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastLayer")
            .field("broadcaster", &self.broadcaster)
            .field("exempt_targets", &self.exempt_targets)
            .finish()
    }
}

impl<S> Layer<S> for BroadcastLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if !self.forwards(event.metadata().target()) {
            return;
        }
        let Some(message) = self.to_message(event) else {
            return;
        };

        match self.broadcaster.deliver(&message) {
            Ok(()) => self.metrics.record_transmitted(),
            Err(error) => {
                self.metrics.record_transmit_failure();
                tracing::warn!(
                    target: "tracing_triage::layer",
                    broadcaster = %self.broadcaster.name(),
                    %error,
                    "Listener failed on forwarded event"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::listener::{Listener, TransmitError};
    use crate::application::listeners::MessageList;
    use crate::domain::ranking::Scales;
    use tracing::{error, info, warn};
    use tracing_subscriber::layer::SubscriberExt;

    fn setup() -> (Arc<Broadcaster>, Arc<MessageList>) {
        let scales = Arc::new(Scales::standard());
        let broadcaster = Arc::new(Broadcaster::new("logs", Arc::clone(&scales)));
        let list = Arc::new(MessageList::new(scales));
        broadcaster.add_listener(list.clone());
        (broadcaster, list)
    }

    #[test]
    fn test_level_to_kind() {
        assert_eq!(kind_for_level(&Level::ERROR), MessageKind::Problem);
        assert_eq!(kind_for_level(&Level::WARN), MessageKind::Warning);
        assert_eq!(kind_for_level(&Level::INFO), MessageKind::Information);
        assert_eq!(kind_for_level(&Level::DEBUG), MessageKind::Narration);
        assert_eq!(kind_for_level(&Level::TRACE), MessageKind::Trace);
    }

    #[test]
    fn test_build_requires_level_kinds() {
        let broadcaster = Arc::new(Broadcaster::new("empty", Arc::new(Scales::empty())));
        let result = BroadcastLayer::builder(broadcaster).build();
        assert!(matches!(result, Err(BuildError::Rank(_))));
    }

    #[test]
    fn test_exempt_targets_deduplication() {
        let (broadcaster, _) = setup();
        let layer = BroadcastLayer::builder(broadcaster)
            .with_exempt_targets(vec![
                "myapp::noisy".to_string(),
                "myapp::noisy".to_string(),
                "".to_string(),
                "myapp::audit".to_string(),
            ])
            .build()
            .unwrap();

        assert_eq!(layer.exempt_targets.len(), 2);
        assert!(!layer.forwards("myapp::noisy"));
        assert!(layer.forwards("myapp::noisy::child"));
        assert!(!layer.forwards("tracing_triage::sink"));
        assert!(layer.forwards("myapp"));
    }

    #[test]
    fn test_events_become_messages() {
        let (broadcaster, list) = setup();
        let layer = BroadcastLayer::builder(broadcaster).build().unwrap();
        let subscriber = tracing_subscriber::registry().with(layer.clone());

        tracing::subscriber::with_default(subscriber, || {
            error!(target: "myapp::db", host = "primary", attempt = 3u64, "Cannot connect");
            warn!(target: "myapp::billing", "Charged $5 twice");
            info!(target: "tracing_triage::sink", "Already a message");
        });

        let messages = list.messages();
        assert_eq!(messages.len(), 2);

        assert_eq!(*messages[0].kind(), MessageKind::Problem);
        assert_eq!(messages[0].description(), "Cannot connect attempt=3 host=primary");
        assert!(messages[0]
            .context()
            .unwrap()
            .as_str()
            .starts_with("myapp::db:"));

        assert_eq!(*messages[1].kind(), MessageKind::Warning);
        assert_eq!(messages[1].description(), "Charged $5 twice");

        assert_eq!(layer.metrics().messages_transmitted(), 2);
    }

    #[test]
    fn test_listener_errors_are_counted() {
        let (broadcaster, _) = setup();
        broadcaster.add_listener(Arc::new(crate::application::listeners::ThrowingListener));
        let layer = BroadcastLayer::builder(Arc::clone(&broadcaster))
            .build()
            .unwrap();
        let subscriber = tracing_subscriber::registry().with(layer.clone());

        tracing::subscriber::with_default(subscriber, || {
            error!(target: "myapp", "Disk failed");
            info!(target: "myapp", "Recovered");
        });

        assert_eq!(layer.metrics().transmit_failures(), 1);
        assert_eq!(layer.metrics().messages_transmitted(), 1);
        assert_eq!(broadcaster.metrics().transmit_failures(), 1);
    }

    #[test]
    fn test_listener_trait_objects_see_forwarded_events() {
        struct Counter(std::sync::atomic::AtomicUsize);

        impl Listener for Counter {
            fn on_message(&self, _message: &Message) -> Result<(), TransmitError> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        }

        let (broadcaster, _) = setup();
        let counter = Arc::new(Counter(std::sync::atomic::AtomicUsize::new(0)));
        broadcaster.add_listener(counter.clone());
        let layer = BroadcastLayer::builder(broadcaster).build().unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            for i in 0..3 {
                info!(target: "myapp", i, "tick");
            }
        });

        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
