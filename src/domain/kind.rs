//! Message kinds.
//!
//! A message kind is the tagged variant that classifies a diagnostic message.
//! Its severity and importance are not stored on the variant itself; they are
//! looked up in a [`RankRegistry`](crate::domain::ranking::RankRegistry) so
//! that independent scales can coexist.

use std::fmt;
use std::sync::Arc;

/// The kind of a diagnostic message.
///
/// Built-in kinds cover the standard severity ladder plus the operation
/// lifecycle. Applications can add their own kinds with [`MessageKind::custom`]
/// and register them between two existing anchors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// Low-level debugging detail
    Trace,
    /// Routine information
    Information,
    /// Narrative description of what the program is doing
    Narration,
    /// Something went wrong but was recovered from
    Glitch,
    /// Something may be wrong
    Warning,
    /// An operation could not be completed as requested
    Problem,
    /// Someone should look at this soon
    Alert,
    /// Someone should look at this now
    CriticalAlert,
    /// A minor validation complaint
    Quibble,
    /// A step within a larger operation
    Step,
    /// An operation has started
    OperationStarted,
    /// An operation finished successfully
    OperationSucceeded,
    /// An operation failed
    OperationFailed,
    /// An operation was halted and cannot continue
    OperationHalted,
    /// An application-defined kind
    Custom(Arc<str>),
}

impl MessageKind {
    /// The eight anchor kinds of the severity ladder, least severe first.
    pub const SEVERITY_LADDER: [MessageKind; 8] = [
        MessageKind::Trace,
        MessageKind::Information,
        MessageKind::Narration,
        MessageKind::Glitch,
        MessageKind::Warning,
        MessageKind::Problem,
        MessageKind::Alert,
        MessageKind::CriticalAlert,
    ];

    /// Every built-in kind ordered by importance, least important first.
    pub const IMPORTANCE_LADDER: [MessageKind; 14] = [
        MessageKind::Trace,
        MessageKind::OperationStarted,
        MessageKind::OperationSucceeded,
        MessageKind::Information,
        MessageKind::Step,
        MessageKind::Narration,
        MessageKind::Quibble,
        MessageKind::Glitch,
        MessageKind::Warning,
        MessageKind::Problem,
        MessageKind::OperationFailed,
        MessageKind::Alert,
        MessageKind::OperationHalted,
        MessageKind::CriticalAlert,
    ];

    /// Create an application-defined kind.
    pub fn custom(name: impl Into<Arc<str>>) -> Self {
        MessageKind::Custom(name.into())
    }

    /// The kind's display name, e.g. `"CriticalAlert"`.
    pub fn name(&self) -> &str {
        match self {
            MessageKind::Trace => "Trace",
            MessageKind::Information => "Information",
            MessageKind::Narration => "Narration",
            MessageKind::Glitch => "Glitch",
            MessageKind::Warning => "Warning",
            MessageKind::Problem => "Problem",
            MessageKind::Alert => "Alert",
            MessageKind::CriticalAlert => "CriticalAlert",
            MessageKind::Quibble => "Quibble",
            MessageKind::Step => "Step",
            MessageKind::OperationStarted => "OperationStarted",
            MessageKind::OperationSucceeded => "OperationSucceeded",
            MessageKind::OperationFailed => "OperationFailed",
            MessageKind::OperationHalted => "OperationHalted",
            MessageKind::Custom(name) => name,
        }
    }

    /// Check if this is an application-defined kind.
    pub fn is_custom(&self) -> bool {
        matches!(self, MessageKind::Custom(_))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
