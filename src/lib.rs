//! # tracing-triage
//!
//! Diagnostic message broadcasting and triage for the `tracing` ecosystem.
//!
//! Code reports what happens as typed [`Message`]s (problems, warnings,
//! steps, trace output and so on). Messages flow through a graph of
//! [`Broadcaster`]s and [`Repeater`]s to [`Listener`]s, which collect them,
//! log them, throttle them or raise alarms when failures come too fast.
//!
//! ## Quick Start
//!
//! ```rust
//! use tracing_triage::{Broadcaster, MessageList, Scales, Transceiver};
//! use std::sync::Arc;
//!
//! let scales = Arc::new(Scales::standard());
//! let broadcaster = Broadcaster::new("importer", Arc::clone(&scales));
//!
//! let list = Arc::new(MessageList::new(scales));
//! broadcaster.add_listener(list.clone());
//!
//! broadcaster.step("Importing $ rows", &[&120]).unwrap();
//! broadcaster.warning("Row $ has no id", &[&17]).unwrap();
//!
//! assert_eq!(list.len(), 2);
//! assert_eq!(list.formatted()[1], "Row 17 has no id");
//! ```
//!
//! ## Severity and Importance
//!
//! Every message kind has two independent ranks in `[0, 1]`, kept in
//! [`Scales`]. Severity says how bad a message is; importance says how much
//! a reader should care. [`Scales::standard`] ranks the built-in kinds, and
//! custom kinds can be anchored between existing ones:
//!
//! ```rust
//! use tracing_triage::{MessageKind, Scales};
//!
//! let scales = Scales::standard();
//! let audit = MessageKind::custom("audit");
//! scales
//!     .register_anchored(audit.clone(), &MessageKind::Information, &MessageKind::Warning)
//!     .unwrap();
//!
//! let audit_severity = scales.severity_of(&audit).unwrap();
//! assert!(audit_severity > scales.severity_of(&MessageKind::Information).unwrap());
//! assert!(audit_severity < scales.severity_of(&MessageKind::Warning).unwrap());
//! ```
//!
//! ## Throttling
//!
//! A message can carry a maximum frequency. A [`Repeater`] with a
//! [`FrequencyThrottle`] handler passes at most one such message per cycle
//! for each call site:
//!
//! ```rust
//! use tracing_triage::{
//!     Broadcaster, Frequency, FrequencyThrottle, Message, MessageKind, Repeater, Scales,
//!     ShardedStorage, SystemClock, Transceiver,
//! };
//! use std::sync::Arc;
//!
//! let scales = Arc::new(Scales::standard());
//! let upstream = Broadcaster::new("service", Arc::clone(&scales));
//! let throttle = FrequencyThrottle::new(Arc::new(ShardedStorage::new()), Arc::new(SystemClock));
//! let repeater = Arc::new(Repeater::with_handler(
//!     Broadcaster::new("throttled", Arc::clone(&scales)),
//!     throttle,
//! ));
//! repeater.listen_to(&upstream);
//!
//! for _ in 0..100 {
//!     let message = Message::builder(MessageKind::Warning, "Disk almost full")
//!         .maximum_frequency(Frequency::every_minute())
//!         .build(&scales)
//!         .unwrap();
//!     upstream.transmit(message).unwrap();
//! }
//!
//! assert_eq!(repeater.handler().metrics().messages_throttled(), 99);
//! ```
//!
//! ## Alarms
//!
//! A [`MessageAlarm`] fires a callback when problems arrive faster than a
//! trigger rate, at most once per cooldown period. See
//! [`application::alarm`] for the state machine.
//!
//! ## Validation
//!
//! Types implement [`Validation`] to check themselves and report issues.
//! Validations nest: a validator that validates its parts only counts the
//! issues reported inside its own call. See [`application::validation`].
//!
//! ## Tracing Integration
//!
//! [`BroadcastLayer`] turns `tracing` events into messages, so existing log
//! statements reach alarms and message lists. [`TracingSink`] goes the
//! other way and logs messages as `tracing` events:
//!
//! ```rust,no_run
//! use tracing_triage::{BroadcastLayer, Broadcaster, Scales, TracingSink};
//! use tracing_subscriber::prelude::*;
//! use std::sync::Arc;
//!
//! let scales = Arc::new(Scales::standard());
//! let broadcaster = Arc::new(Broadcaster::new("app", Arc::clone(&scales)));
//! broadcaster.add_listener(Arc::new(TracingSink::new(&scales).unwrap()));
//!
//! tracing_subscriber::registry()
//!     .with(BroadcastLayer::builder(Arc::clone(&broadcaster)).build().unwrap())
//!     .with(tracing_subscriber::fmt::layer())
//!     .init();
//! ```
//!
//! Sink events use their own target, which the layer never forwards, so
//! the two can share a subscriber without feedback.
//!
//! ## Observability
//!
//! Broadcasters, throttles, alarms and the layer count what they do in a
//! [`Metrics`] handle. Pass one handle to several components to aggregate:
//!
//! ```rust
//! use tracing_triage::{Broadcaster, Message, Metrics, Scales, Transceiver, TransmitError};
//! use std::sync::Arc;
//!
//! let metrics = Metrics::new();
//! let broadcaster = Broadcaster::new("app", Arc::new(Scales::standard()))
//!     .with_metrics(metrics.clone());
//! broadcaster.add_listener(Arc::new(|_: &Message| Ok::<(), TransmitError>(())));
//!
//! broadcaster.information("Started", &[]).unwrap();
//! assert_eq!(metrics.snapshot().messages_transmitted, 1);
//! ```

// Domain layer - pure values
pub mod domain;

// Application layer - broadcasting, throttling, alarms and validation
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    frequency::{Cycle, Frequency, FrequencyParseError},
    kind::MessageKind,
    message::{interpolate, Cause, CodeContext, Message, MessageBuilder, Status},
    ranking::{Rank, RankError, RankRegistry, Scales},
    rate::{Rate, RateCalculator},
    signature::ThrottleKey,
};

pub use application::{
    alarm::{AlarmState, MessageAlarm, MessageAlarmBuilder},
    broadcaster::{Broadcaster, Disposition, Forward, MessageHandler, Repeater},
    error::BuildError,
    listener::{
        accept_all, failures, kind_is, severity_at_least, Listener, MessageFilter, Transceiver,
        TransmitError,
    },
    listeners::{MessageList, NullListener, ThrowingListener},
    metrics::{Metrics, MetricsSnapshot},
    ports::{Clock, Storage},
    throttle::{DeliveryRecord, FrequencyThrottle},
    validation::{Checks, Validation, ValidationIssues, Validator},
};

pub use infrastructure::{
    clock::SystemClock,
    layer::{kind_for_level, BroadcastLayer, BroadcastLayerBuilder},
    storage::ShardedStorage,
    tracing_sink::{TracingSink, SINK_TARGET},
};
