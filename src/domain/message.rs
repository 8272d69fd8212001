//! Diagnostic messages.
//!
//! A [`Message`] is immutable once built. Its severity and importance are
//! resolved from [`Scales`] at construction, so every later comparison is a
//! plain rank comparison with no registry lookup.

use crate::domain::frequency::Frequency;
use crate::domain::kind::MessageKind;
use crate::domain::ranking::{Rank, RankError, Scales};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Outcome status carried by a message.
///
/// Statuses are ordered from least to most serious, so `Failed` is worse
/// than every other status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    /// The message does not describe an outcome
    NotApplicable,
    /// An operation succeeded
    Succeeded,
    /// An operation is still running
    InProgress,
    /// An operation failed
    Failed,
}

impl Status {
    /// The status a message of the given kind carries unless overridden.
    pub fn default_for(kind: &MessageKind) -> Self {
        match kind {
            MessageKind::Problem
            | MessageKind::Alert
            | MessageKind::CriticalAlert
            | MessageKind::OperationFailed
            | MessageKind::OperationHalted => Status::Failed,
            MessageKind::OperationStarted | MessageKind::Step => Status::InProgress,
            MessageKind::OperationSucceeded => Status::Succeeded,
            _ => Status::NotApplicable,
        }
    }

    /// Check if this status represents a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Status::Failed)
    }

    /// Check if this status is worse than another.
    pub fn is_worse_than(&self, other: Status) -> bool {
        *self > other
    }

    /// Check if this status is worse than or equal to another.
    pub fn is_worse_than_or_equal_to(&self, other: Status) -> bool {
        *self >= other
    }
}

/// Opaque identifier of the code that produced a message.
///
/// Only used as a comparable key for per-call-site throttling. Use the
/// [`code_context!`](crate::code_context) macro to capture the current
/// module and line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeContext(Cow<'static, str>);

impl CodeContext {
    /// Create a code context from any identifier.
    pub fn new(identifier: impl Into<Cow<'static, str>>) -> Self {
        CodeContext(identifier.into())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capture a [`CodeContext`] for the current module and line.
#[macro_export]
macro_rules! code_context {
    () => {
        $crate::domain::message::CodeContext::new(concat!(module_path!(), ":", line!()))
    };
}

/// Shared failure that caused a message.
pub type Cause = Arc<dyn Error + Send + Sync + 'static>;

/// An immutable diagnostic event.
#[derive(Debug, Clone)]
pub struct Message {
    kind: MessageKind,
    severity: Rank,
    importance: Rank,
    status: Status,
    created: Instant,
    text: String,
    arguments: Vec<String>,
    cause: Option<Cause>,
    maximum_frequency: Option<Frequency>,
    context: Option<CodeContext>,
}

impl Message {
    /// Build a message with no arguments.
    ///
    /// # Errors
    /// Returns `RankError::UnregisteredKind` if the kind has no rank in `scales`.
    pub fn new(
        scales: &Scales,
        kind: MessageKind,
        text: impl Into<String>,
    ) -> Result<Self, RankError> {
        Self::builder(kind, text).build(scales)
    }

    /// Start building a message.
    pub fn builder(kind: MessageKind, text: impl Into<String>) -> MessageBuilder {
        MessageBuilder::new(kind, text)
    }

    /// The message kind.
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// Severity rank.
    pub fn severity(&self) -> Rank {
        self.severity
    }

    /// Importance rank.
    pub fn importance(&self) -> Rank {
        self.importance
    }

    /// Outcome status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// When the message was created.
    pub fn created(&self) -> Instant {
        self.created
    }

    /// The uninterpolated text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Interpolation arguments.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// The failure that caused this message, if any.
    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    /// The maximum frequency at which this message should be delivered.
    pub fn maximum_frequency(&self) -> Option<&Frequency> {
        self.maximum_frequency.as_ref()
    }

    /// The code context that produced this message.
    pub fn context(&self) -> Option<&CodeContext> {
        self.context.as_ref()
    }

    /// Text with arguments interpolated.
    pub fn description(&self) -> String {
        interpolate(&self.text, &self.arguments)
    }

    /// Text with arguments interpolated, followed by the cause if present.
    pub fn formatted(&self) -> String {
        let description = self.description();
        match &self.cause {
            Some(cause) => format!("{}\n{}", description, cause),
            None => description,
        }
    }

    /// Check if this message reports a failure.
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Check if this message is more severe than messages of `kind`.
    pub fn is_worse_than(&self, kind: &MessageKind, scales: &Scales) -> Result<bool, RankError> {
        Ok(self.severity > scales.severity_of(kind)?)
    }

    /// Check if this message is at least as severe as messages of `kind`.
    pub fn is_worse_than_or_equal_to(
        &self,
        kind: &MessageKind,
        scales: &Scales,
    ) -> Result<bool, RankError> {
        Ok(self.severity >= scales.severity_of(kind)?)
    }

    /// Check if this message is more important than messages of `kind`.
    pub fn is_more_important_than(
        &self,
        kind: &MessageKind,
        scales: &Scales,
    ) -> Result<bool, RankError> {
        Ok(self.importance > scales.importance_of(kind)?)
    }

    /// Check if this message is at least as important as messages of `kind`.
    pub fn is_more_important_than_or_equal_to(
        &self,
        kind: &MessageKind,
        scales: &Scales,
    ) -> Result<bool, RankError> {
        Ok(self.importance >= scales.importance_of(kind)?)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.formatted())
    }
}

/// Builder for [`Message`].
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    kind: MessageKind,
    text: String,
    arguments: Vec<String>,
    status: Option<Status>,
    severity: Option<Rank>,
    importance: Option<Rank>,
    created: Option<Instant>,
    cause: Option<Cause>,
    maximum_frequency: Option<Frequency>,
    context: Option<CodeContext>,
}

impl MessageBuilder {
    fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            arguments: Vec::new(),
            status: None,
            severity: None,
            importance: None,
            created: None,
            cause: None,
            maximum_frequency: None,
            context: None,
        }
    }

    /// Append one interpolation argument.
    pub fn argument(mut self, argument: impl fmt::Display) -> Self {
        self.arguments.push(argument.to_string());
        self
    }

    /// Append several interpolation arguments.
    pub fn arguments<I, A>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: fmt::Display,
    {
        self.arguments
            .extend(arguments.into_iter().map(|a| a.to_string()));
        self
    }

    /// Attach the failure that caused this message.
    pub fn cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attach an already shared cause.
    pub fn shared_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Limit how often identical messages are delivered.
    pub fn maximum_frequency(mut self, frequency: Frequency) -> Self {
        self.maximum_frequency = Some(frequency);
        self
    }

    /// Record the code context that produced the message.
    pub fn context(mut self, context: CodeContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Override the kind's default status.
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Override the kind's severity.
    pub fn severity(mut self, severity: Rank) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Override the kind's importance.
    pub fn importance(mut self, importance: Rank) -> Self {
        self.importance = Some(importance);
        self
    }

    /// Override the creation time.
    pub fn created_at(mut self, created: Instant) -> Self {
        self.created = Some(created);
        self
    }

    /// Resolve ranks and build the message.
    ///
    /// # Errors
    /// Returns `RankError::UnregisteredKind` if a rank that was not overridden
    /// is missing from `scales`.
    pub fn build(self, scales: &Scales) -> Result<Message, RankError> {
        let severity = match self.severity {
            Some(rank) => rank,
            None => scales.severity_of(&self.kind)?,
        };
        let importance = match self.importance {
            Some(rank) => rank,
            None => scales.importance_of(&self.kind)?,
        };
        let status = self
            .status
            .unwrap_or_else(|| Status::default_for(&self.kind));

        Ok(Message {
            kind: self.kind,
            severity,
            importance,
            status,
            created: self.created.unwrap_or_else(Instant::now),
            text: self.text,
            arguments: self.arguments,
            cause: self.cause,
            maximum_frequency: self.maximum_frequency,
            context: self.context,
        })
    }
}

/// Replace each `$` in `text` with the next argument.
///
/// `$$` produces a literal `$`. A `$` with no argument left is kept as-is.
pub fn interpolate(text: &str, arguments: &[String]) -> String {
    let mut output = String::with_capacity(text.len() + arguments.iter().map(String::len).sum::<usize>());
    let mut remaining = arguments.iter();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            output.push(c);
            continue;
        }
        if chars.peek() == Some(&'$') {
            chars.next();
            output.push('$');
            continue;
        }
        match remaining.next() {
            Some(argument) => output.push_str(argument),
            None => output.push('$'),
        }
    }

    output
}
