//! Domain layer - pure values with no clocks, locks or I/O.
//!
//! This layer contains the core concepts of the triage system:
//! - Message kinds and their severity/importance ranking
//! - Immutable diagnostic messages
//! - Throttle keys for per-call-site delivery limits
//! - Rates, rate calculation and repeating intervals
//!
//! Time-dependent operations take the current `Instant` as an argument,
//! so every type here is deterministic and easily testable.

pub mod frequency;
pub mod kind;
pub mod message;
pub mod ranking;
pub mod rate;
pub mod signature;
