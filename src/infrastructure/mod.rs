//! Infrastructure layer - external adapters and integrations.
//!
//! This layer provides adapters for:
//! - Clock abstraction (system time vs mock)
//! - Storage implementations (sharded maps)
//! - Tracing integration, in both directions: events into a broadcaster
//!   ([`layer::BroadcastLayer`]) and messages out as events
//!   ([`tracing_sink::TracingSink`])

pub mod clock;
pub mod layer;
pub mod storage;
pub mod tracing_sink;
pub(crate) mod visitor;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides controllable test doubles for alarms,
/// throttles and the tracing bridge.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// tracing-triage = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
