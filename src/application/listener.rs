//! Listener and transceiver contracts.
//!
//! A [`Listener`] accepts messages. A [`Transceiver`] can build messages from
//! its own [`Scales`] and send them on, and gets the familiar
//! `problem(...)`/`warning(...)` helpers for free.

use crate::domain::kind::MessageKind;
use crate::domain::message::{Message, Status};
use crate::domain::ranking::{Rank, RankError, Scales};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error raised while delivering a message.
///
/// Delivery stops at the first listener that returns an error, and the error
/// reaches the caller of `transmit` unchanged.
#[derive(Debug, Error)]
pub enum TransmitError {
    /// A failure-status message was turned into an error
    #[error("{0}")]
    Failure(String),
    /// A message could not be built because its kind has no rank
    #[error(transparent)]
    Rank(#[from] RankError),
    /// A listener failed for its own reasons
    #[error("listener failed: {0}")]
    Listener(#[source] Box<dyn StdError + Send + Sync>),
}

impl TransmitError {
    /// Wrap an arbitrary listener failure.
    pub fn listener(error: impl StdError + Send + Sync + 'static) -> Self {
        TransmitError::Listener(Box::new(error))
    }
}

/// Something that accepts messages.
pub trait Listener: Send + Sync {
    /// Handle one message.
    ///
    /// Returning an error aborts delivery to any listener registered after
    /// this one on the same broadcaster.
    fn on_message(&self, message: &Message) -> Result<(), TransmitError>;

    /// Check if this listener discards everything it receives.
    fn is_deaf(&self) -> bool {
        false
    }
}

impl<F> Listener for F
where
    F: Fn(&Message) -> Result<(), TransmitError> + Send + Sync,
{
    fn on_message(&self, message: &Message) -> Result<(), TransmitError> {
        self(message)
    }
}

/// Predicate deciding whether a listener receives a message.
pub type MessageFilter = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// Accept every message.
pub fn accept_all() -> MessageFilter {
    Arc::new(|_| true)
}

/// Accept messages whose severity is at least `minimum`.
pub fn severity_at_least(minimum: Rank) -> MessageFilter {
    Arc::new(move |message| message.severity() >= minimum)
}

/// Accept messages of exactly one kind.
pub fn kind_is(kind: MessageKind) -> MessageFilter {
    Arc::new(move |message| *message.kind() == kind)
}

/// Accept messages with a failure status.
pub fn failures() -> MessageFilter {
    Arc::new(|message| message.status() == Status::Failed)
}

/// A participant that builds messages and sends them on.
///
/// Implementors provide [`scales`](Transceiver::scales) and
/// [`transmit`](Transceiver::transmit); every other method is a helper that
/// builds a message of one kind and transmits it. Text uses `$` placeholders
/// filled from `arguments`.
pub trait Transceiver: Send + Sync {
    /// Scales used to rank messages built by this transceiver.
    fn scales(&self) -> &Scales;

    /// Send a message on, returning it for further use.
    fn transmit(&self, message: Message) -> Result<Message, TransmitError>;

    /// Build a message of any kind and transmit it.
    fn announce(
        &self,
        kind: MessageKind,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<Message, TransmitError> {
        let message = Message::builder(kind, text)
            .arguments(arguments.iter())
            .build(self.scales())?;
        self.transmit(message)
    }

    /// Transmit a trace message.
    fn trace(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<Message, TransmitError> {
        self.announce(MessageKind::Trace, text, arguments)
    }

    /// Transmit an information message.
    fn information(
        &self,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<Message, TransmitError> {
        self.announce(MessageKind::Information, text, arguments)
    }

    /// Transmit a narration message.
    fn narrate(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<Message, TransmitError> {
        self.announce(MessageKind::Narration, text, arguments)
    }

    /// Transmit a step message.
    fn step(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<Message, TransmitError> {
        self.announce(MessageKind::Step, text, arguments)
    }

    /// Transmit a quibble message.
    fn quibble(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<Message, TransmitError> {
        self.announce(MessageKind::Quibble, text, arguments)
    }

    /// Transmit a glitch message.
    fn glitch(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<Message, TransmitError> {
        self.announce(MessageKind::Glitch, text, arguments)
    }

    /// Transmit a warning message.
    fn warning(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<Message, TransmitError> {
        self.announce(MessageKind::Warning, text, arguments)
    }

    /// Transmit a problem message.
    fn problem(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<Message, TransmitError> {
        self.announce(MessageKind::Problem, text, arguments)
    }

    /// Transmit an alert message.
    fn alert(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<Message, TransmitError> {
        self.announce(MessageKind::Alert, text, arguments)
    }

    /// Transmit a critical alert message.
    fn critical_alert(
        &self,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<Message, TransmitError> {
        self.announce(MessageKind::CriticalAlert, text, arguments)
    }

    /// Transmit an operation-halted message.
    fn halted(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<Message, TransmitError> {
        self.announce(MessageKind::OperationHalted, text, arguments)
    }

    /// Transmit a problem message if `condition` holds.
    fn problem_if(
        &self,
        condition: bool,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<Option<Message>, TransmitError> {
        if condition {
            self.problem(text, arguments).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Transmit a warning message if `condition` holds.
    fn warning_if(
        &self,
        condition: bool,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<Option<Message>, TransmitError> {
        if condition {
            self.warning(text, arguments).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(kind: MessageKind) -> Message {
        Message::new(&Scales::standard(), kind, "text").unwrap()
    }

    #[test]
    fn test_closure_listener() {
        let listener = |message: &Message| {
            if message.is_failure() {
                Err(TransmitError::Failure(message.formatted()))
            } else {
                Ok(())
            }
        };

        assert!(listener.on_message(&message(MessageKind::Information)).is_ok());
        assert!(listener.on_message(&message(MessageKind::Problem)).is_err());
        assert!(!listener.is_deaf());
    }

    #[test]
    fn test_filters() {
        let scales = Scales::standard();
        let warning_rank = scales.severity_of(&MessageKind::Warning).unwrap();

        let at_least_warning = severity_at_least(warning_rank);
        assert!(at_least_warning(&message(MessageKind::Warning)));
        assert!(at_least_warning(&message(MessageKind::CriticalAlert)));
        assert!(!at_least_warning(&message(MessageKind::Glitch)));

        let only_steps = kind_is(MessageKind::Step);
        assert!(only_steps(&message(MessageKind::Step)));
        assert!(!only_steps(&message(MessageKind::Trace)));

        let failed = failures();
        assert!(failed(&message(MessageKind::OperationFailed)));
        assert!(!failed(&message(MessageKind::Warning)));

        assert!(accept_all()(&message(MessageKind::Trace)));
    }

    #[test]
    fn test_error_display() {
        let error = TransmitError::from(RankError::UnregisteredKind(MessageKind::custom("Audit")));
        assert_eq!(error.to_string(), "message kind `Audit` has no registered rank");

        let error = TransmitError::listener(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        ));
        assert_eq!(error.to_string(), "listener failed: pipe closed");
        assert!(error.source().is_some());
    }
}
