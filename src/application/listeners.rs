//! Built-in listeners.

use crate::application::broadcaster::Broadcaster;
use crate::application::listener::{Listener, MessageFilter, Transceiver, TransmitError};
use crate::domain::kind::MessageKind;
use crate::domain::message::{Message, Status};
use crate::domain::ranking::{RankError, Scales};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Turns failure-status messages into errors.
///
/// Place one at the edge of a broadcast graph to get traditional error
/// propagation: a problem anywhere upstream becomes an `Err` from the
/// originating `transmit`. Other messages are logged at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrowingListener;

impl Listener for ThrowingListener {
    fn on_message(&self, message: &Message) -> Result<(), TransmitError> {
        if message.is_failure() {
            return Err(TransmitError::Failure(message.formatted()));
        }
        debug!(kind = %message.kind(), "{}", message.formatted());
        Ok(())
    }
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl Listener for NullListener {
    fn on_message(&self, _message: &Message) -> Result<(), TransmitError> {
        Ok(())
    }

    fn is_deaf(&self) -> bool {
        true
    }
}

/// Collects messages for later inspection.
///
/// Also a [`Transceiver`], so code can report straight into a list.
pub struct MessageList {
    scales: Arc<Scales>,
    filter: Option<MessageFilter>,
    messages: Mutex<Vec<Message>>,
}

impl MessageList {
    /// Create a list that keeps every message.
    pub fn new(scales: Arc<Scales>) -> Self {
        Self {
            scales,
            filter: None,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Create a list that keeps messages matching `filter`.
    pub fn filtered(scales: Arc<Scales>, filter: MessageFilter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::new(scales)
        }
    }

    /// Collect everything `broadcaster` transmits while `code` runs.
    ///
    /// The list stops listening when `code` returns, whether or not it
    /// succeeded. An error from `code` is recorded as a problem.
    pub fn capture<F>(broadcaster: &Broadcaster, code: F) -> Arc<MessageList>
    where
        F: FnOnce() -> Result<(), TransmitError>,
    {
        let list = Arc::new(MessageList::new(Arc::clone(broadcaster.shared_scales())));
        broadcaster.add_listener(list.clone());
        let outcome = code();
        broadcaster.remove_listener(&list);

        if let Err(error) = outcome {
            // Recording into a list cannot fail
            let _ = list.problem("Code failed: $", &[&error]);
        }
        list
    }

    /// A copy of the collected messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.lock().clone()
    }

    /// Each collected message with its cause, oldest first.
    pub fn formatted(&self) -> Vec<String> {
        self.lock().iter().map(Message::formatted).collect()
    }

    /// Collected messages of one kind.
    pub fn messages_of_kind(&self, kind: &MessageKind) -> Vec<Message> {
        self.lock()
            .iter()
            .filter(|message| message.kind() == kind)
            .cloned()
            .collect()
    }

    /// Number of collected messages of one kind.
    pub fn count(&self, kind: &MessageKind) -> usize {
        self.lock()
            .iter()
            .filter(|message| message.kind() == kind)
            .count()
    }

    /// Number of collected messages with a status.
    pub fn count_with_status(&self, status: Status) -> usize {
        self.lock()
            .iter()
            .filter(|message| message.status() == status)
            .count()
    }

    /// Number of collected messages at least as severe as `kind`.
    ///
    /// # Errors
    /// Returns `RankError::UnregisteredKind` if `kind` has no severity.
    pub fn count_worse_than_or_equal_to(&self, kind: &MessageKind) -> Result<usize, RankError> {
        let threshold = self.scales.severity_of(kind)?;
        Ok(self
            .lock()
            .iter()
            .filter(|message| message.severity() >= threshold)
            .count())
    }

    /// Check if any collected message is a problem or worse.
    pub fn failed(&self) -> bool {
        match self.count_worse_than_or_equal_to(&MessageKind::Problem) {
            Ok(count) => count > 0,
            Err(_) => self.lock().iter().any(Message::is_failure),
        }
    }

    /// One right-aligned `Kinds: count` line per kind.
    pub fn statistics(&self, kinds: &[MessageKind]) -> Vec<String> {
        kinds
            .iter()
            .map(|kind| format!("{:>24}: {}", format!("{}s", kind), self.count(kind)))
            .collect()
    }

    /// Re-send every collected message to `listener`, oldest first.
    pub fn broadcast_to(&self, listener: &dyn Listener) -> Result<(), TransmitError> {
        self.messages()
            .iter()
            .try_for_each(|message| listener.on_message(message))
    }

    /// Number of collected messages.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing has been collected.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget every collected message.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Listener for MessageList {
    fn on_message(&self, message: &Message) -> Result<(), TransmitError> {
        if self.filter.as_ref().map_or(true, |filter| filter(message)) {
            self.lock().push(message.clone());
        }
        Ok(())
    }
}

impl Transceiver for MessageList {
    fn scales(&self) -> &Scales {
        &self.scales
    }

    fn transmit(&self, message: Message) -> Result<Message, TransmitError> {
        self.on_message(&message)?;
        Ok(message)
    }
}

impl std::fmt::Debug for MessageList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageList")
            .field("messages", &self.len())
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}
