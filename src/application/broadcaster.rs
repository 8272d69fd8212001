//! Broadcasters and repeaters.
//!
//! A [`Broadcaster`] fans messages out to an ordered audience of listeners,
//! each guarded by a filter. A [`Repeater`] is a listener that owns a
//! broadcaster: whatever it receives goes through its [`MessageHandler`] and
//! is then forwarded to its own audience, never back upstream.

use crate::application::listener::{accept_all, Listener, MessageFilter, Transceiver, TransmitError};
use crate::application::listeners::NullListener;
use crate::application::metrics::Metrics;
use crate::domain::message::Message;
use crate::domain::ranking::Scales;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

#[derive(Clone)]
struct AudienceMember {
    listener: Arc<dyn Listener>,
    filter: MessageFilter,
}

impl AudienceMember {
    fn is<L: Listener + ?Sized>(&self, listener: &Arc<L>) -> bool {
        same_listener(&self.listener, listener)
    }
}

/// Compare listeners by allocation, ignoring vtables.
fn same_listener<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Fans messages out to an ordered list of filtered listeners.
///
/// Delivery is synchronous and in registration order. The first listener
/// that returns an error stops delivery, and the error is returned to the
/// caller.
///
/// The audience is copy-on-write: a transmit works on a snapshot, so
/// listeners may change the audience while a message is being delivered.
/// Such changes apply from the next message on.
pub struct Broadcaster {
    name: String,
    scales: Arc<Scales>,
    audience: RwLock<Arc<Vec<AudienceMember>>>,
    metrics: Metrics,
}

impl Broadcaster {
    /// Create a broadcaster with no listeners.
    pub fn new(name: impl Into<String>, scales: Arc<Scales>) -> Self {
        Self {
            name: name.into(),
            scales,
            audience: RwLock::new(Arc::new(Vec::new())),
            metrics: Metrics::new(),
        }
    }

    /// Record delivery statistics into shared metrics.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// The name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared scales messages are ranked with.
    pub fn shared_scales(&self) -> &Arc<Scales> {
        &self.scales
    }

    /// Delivery metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Add a listener that receives every message.
    ///
    /// Returns false if the listener was already in the audience.
    pub fn add_listener(&self, listener: Arc<dyn Listener>) -> bool {
        self.add_filtered_listener(listener, accept_all())
    }

    /// Add a listener that receives messages matching `filter`.
    ///
    /// Returns false if the listener was already in the audience, in which
    /// case its existing filter is kept.
    pub fn add_filtered_listener(&self, listener: Arc<dyn Listener>, filter: MessageFilter) -> bool {
        self.update(|members| {
            if members.iter().any(|member| member.is(&listener)) {
                return false;
            }
            members.push(AudienceMember { listener, filter });
            true
        })
    }

    /// Remove a listener. Returns false if it was not in the audience.
    pub fn remove_listener<L: Listener + ?Sized>(&self, listener: &Arc<L>) -> bool {
        self.update(|members| {
            let before = members.len();
            members.retain(|member| !member.is(listener));
            members.len() != before
        })
    }

    /// Check if a listener is in the audience.
    pub fn contains_listener<L: Listener + ?Sized>(&self, listener: &Arc<L>) -> bool {
        self.snapshot().iter().any(|member| member.is(listener))
    }

    /// Remove every listener.
    pub fn clear_listeners(&self) {
        self.update(|members| members.clear());
    }

    /// Check if any listener is registered.
    pub fn has_listeners(&self) -> bool {
        !self.snapshot().is_empty()
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.snapshot().len()
    }

    /// Replace the audience with a single listener that discards everything.
    pub fn silence(&self) {
        let null: Arc<dyn Listener> = Arc::new(NullListener);
        self.update(|members| {
            members.clear();
            members.push(AudienceMember {
                listener: null,
                filter: accept_all(),
            });
        });
    }

    /// Check if every listener discards what it receives.
    ///
    /// A broadcaster with no listeners is deaf.
    pub fn is_deaf(&self) -> bool {
        self.snapshot().iter().all(|member| member.listener.is_deaf())
    }

    /// Add every listener of `other`, with its filter, to this audience.
    ///
    /// Listeners already present are skipped.
    pub fn copy_listeners_from(&self, other: &Broadcaster) {
        let incoming = other.snapshot();
        self.update(|members| {
            for member in incoming.iter() {
                if !members.iter().any(|existing| existing.is(&member.listener)) {
                    members.push(member.clone());
                }
            }
        });
    }

    /// Deliver a message to every listener whose filter matches it.
    ///
    /// # Errors
    /// Returns the first listener error. Listeners after the failing one do
    /// not see the message.
    pub fn deliver(&self, message: &Message) -> Result<(), TransmitError> {
        let audience = self.snapshot();
        if audience.is_empty() {
            trace!(broadcaster = %self.name, kind = %message.kind(), "No listeners for message");
        }

        for member in audience.iter() {
            if !(member.filter)(message) {
                continue;
            }
            if let Err(error) = member.listener.on_message(message) {
                self.metrics.record_transmit_failure();
                return Err(error);
            }
        }

        self.metrics.record_transmitted();
        Ok(())
    }

    /// Transmit several messages in order, stopping at the first error.
    pub fn transmit_all<I>(&self, messages: I) -> Result<(), TransmitError>
    where
        I: IntoIterator<Item = Message>,
    {
        messages
            .into_iter()
            .try_for_each(|message| self.deliver(&message))
    }

    fn snapshot(&self) -> Arc<Vec<AudienceMember>> {
        Arc::clone(&self.audience.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn update<R>(&self, f: impl FnOnce(&mut Vec<AudienceMember>) -> R) -> R {
        let mut audience = self.audience.write().unwrap_or_else(PoisonError::into_inner);
        f(Arc::make_mut(&mut audience))
    }
}

impl Transceiver for Broadcaster {
    fn scales(&self) -> &Scales {
        &self.scales
    }

    fn transmit(&self, message: Message) -> Result<Message, TransmitError> {
        self.deliver(&message)?;
        Ok(message)
    }
}

impl fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("name", &self.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// What a repeater does with a message after handling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Re-transmit to the repeater's own audience
    Forward,
    /// Stop here
    Consume,
}

/// Per-message behavior of a [`Repeater`].
pub trait MessageHandler: Send + Sync {
    /// Handle a received message and decide whether it travels on.
    fn handle(&self, message: &Message) -> Result<Disposition, TransmitError>;
}

/// Handler that forwards everything unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forward;

impl MessageHandler for Forward {
    fn handle(&self, _message: &Message) -> Result<Disposition, TransmitError> {
        Ok(Disposition::Forward)
    }
}

/// A listener that forwards what it receives to its own audience.
///
/// The handler may inspect or consume each message, but re-transmission is
/// always to the repeater's own broadcaster.
pub struct Repeater<H = Forward> {
    handler: H,
    broadcaster: Broadcaster,
}

impl Repeater<Forward> {
    /// Create a repeater that forwards everything.
    pub fn new(broadcaster: Broadcaster) -> Self {
        Self::with_handler(broadcaster, Forward)
    }
}

impl<H: MessageHandler> Repeater<H> {
    /// Create a repeater with a custom handler.
    pub fn with_handler(broadcaster: Broadcaster, handler: H) -> Self {
        Self {
            handler,
            broadcaster,
        }
    }

    /// The handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The downstream broadcaster.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Subscribe this repeater to `upstream`.
    ///
    /// Returns false if already subscribed, or if `upstream` is this
    /// repeater's own broadcaster.
    pub fn listen_to(self: &Arc<Self>, upstream: &Broadcaster) -> bool
    where
        H: 'static,
    {
        self.listen_to_filtered(upstream, accept_all())
    }

    /// Subscribe this repeater to the messages of `upstream` that match `filter`.
    pub fn listen_to_filtered(self: &Arc<Self>, upstream: &Broadcaster, filter: MessageFilter) -> bool
    where
        H: 'static,
    {
        if std::ptr::eq(upstream, &self.broadcaster) {
            return false;
        }
        let listener: Arc<dyn Listener> = Arc::clone(self) as Arc<dyn Listener>;
        upstream.add_filtered_listener(listener, filter)
    }
}

impl<H: MessageHandler> Listener for Repeater<H> {
    fn on_message(&self, message: &Message) -> Result<(), TransmitError> {
        match self.handler.handle(message)? {
            Disposition::Forward => self.broadcaster.deliver(message),
            Disposition::Consume => Ok(()),
        }
    }

    fn is_deaf(&self) -> bool {
        self.broadcaster.is_deaf()
    }
}

impl<H: MessageHandler> Transceiver for Repeater<H> {
    fn scales(&self) -> &Scales {
        self.broadcaster.scales()
    }

    fn transmit(&self, message: Message) -> Result<Message, TransmitError> {
        self.broadcaster.transmit(message)
    }
}

impl<H: fmt::Debug> fmt::Debug for Repeater<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repeater")
            .field("handler", &self.handler)
            .field("broadcaster", &self.broadcaster)
            .finish()
    }
}
