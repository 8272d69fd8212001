//! Test doubles for infrastructure adapters.
//!
//! `MockClock` makes alarm cooldowns and throttle cycles deterministic.
//! `MockCaptureLayer` records the `tracing` events a sink emits.

pub mod clock;
pub mod layer;

pub use clock::MockClock;
pub use layer::MockCaptureLayer;
