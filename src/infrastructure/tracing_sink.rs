//! Message sink that re-emits messages as `tracing` events.
//!
//! Severity is mapped onto `tracing` levels with thresholds taken from the
//! scales:
//!
//! | Severity              | Level   |
//! |-----------------------|---------|
//! | problem or worse      | `ERROR` |
//! | warning or worse      | `WARN`  |
//! | information or worse  | `INFO`  |
//! | narration             | `DEBUG` |
//! | above trace           | `DEBUG` |
//! | trace                 | `TRACE` |
//!
//! Events use the [`SINK_TARGET`] target, which [`BroadcastLayer`] never
//! forwards, so a sink and a layer can share one subscriber.
//!
//! [`BroadcastLayer`]: crate::infrastructure::layer::BroadcastLayer

use crate::application::error::BuildError;
use crate::application::listener::{Listener, TransmitError};
use crate::domain::kind::MessageKind;
use crate::domain::message::Message;
use crate::domain::ranking::{Rank, Scales};
use tracing::{debug, error, info, trace, warn, Level};

/// Target of every event emitted by [`TracingSink`].
pub const SINK_TARGET: &str = "tracing_triage::sink";

/// Severity ranks at which each level starts.
#[derive(Debug, Clone, Copy)]
struct LevelThresholds {
    error: Rank,
    warn: Rank,
    info: Rank,
    trace: Rank,
}

impl LevelThresholds {
    fn from_scales(scales: &Scales) -> Result<Self, BuildError> {
        Ok(Self {
            error: scales.severity_of(&MessageKind::Problem)?,
            warn: scales.severity_of(&MessageKind::Warning)?,
            info: scales.severity_of(&MessageKind::Information)?,
            trace: scales.severity_of(&MessageKind::Trace)?,
        })
    }

    fn level_for(&self, severity: Rank) -> Level {
        if severity >= self.error {
            Level::ERROR
        } else if severity >= self.warn {
            Level::WARN
        } else if severity >= self.info {
            Level::INFO
        } else if severity > self.trace {
            Level::DEBUG
        } else {
            Level::TRACE
        }
    }
}

/// A listener that logs every message through `tracing`.
#[derive(Debug, Clone)]
pub struct TracingSink {
    thresholds: LevelThresholds,
    minimum: Option<Rank>,
}

impl TracingSink {
    /// Create a sink that ranks levels with `scales`.
    ///
    /// # Errors
    /// Returns `BuildError::Rank` if problem, warning, information or trace
    /// has no severity in `scales`.
    pub fn new(scales: &Scales) -> Result<Self, BuildError> {
        Ok(Self {
            thresholds: LevelThresholds::from_scales(scales)?,
            minimum: None,
        })
    }

    /// Only log messages at least as severe as `minimum`.
    pub fn with_minimum_severity(mut self, minimum: Rank) -> Self {
        self.minimum = Some(minimum);
        self
    }

    /// The level a message is logged at.
    ///
    /// Narration outranks information but logs at `DEBUG`, matching the
    /// kind [`BroadcastLayer`] gives `DEBUG` events.
    ///
    /// [`BroadcastLayer`]: crate::infrastructure::layer::BroadcastLayer
    pub fn level_for(&self, message: &Message) -> Level {
        match message.kind() {
            MessageKind::Narration => Level::DEBUG,
            _ => self.thresholds.level_for(message.severity()),
        }
    }

    /// Check if a message passes the minimum severity filter.
    pub fn accepts(&self, message: &Message) -> bool {
        self.minimum
            .map_or(true, |minimum| message.severity() >= minimum)
    }
}

impl Listener for TracingSink {
    fn on_message(&self, message: &Message) -> Result<(), TransmitError> {
        if !self.accepts(message) {
            return Ok(());
        }

        let kind = message.kind();
        let status = message.status();
        let text = message.formatted();
        let context = message.context().map(|context| context.as_str());

        match self.level_for(message) {
            Level::ERROR => error!(target: SINK_TARGET, %kind, ?status, context, "{}", text),
            Level::WARN => warn!(target: SINK_TARGET, %kind, ?status, context, "{}", text),
            Level::INFO => info!(target: SINK_TARGET, %kind, ?status, context, "{}", text),
            Level::DEBUG => debug!(target: SINK_TARGET, %kind, ?status, context, "{}", text),
            _ => trace!(target: SINK_TARGET, %kind, ?status, context, "{}", text),
        }
        Ok(())
    }
}
