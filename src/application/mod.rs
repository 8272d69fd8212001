//! Application layer - orchestration of domain logic.
//!
//! This layer wires messages through the broadcast graph and owns the
//! stateful pieces built on the domain:
//! - Listener and transceiver contracts, with message filters
//! - Broadcasters and repeaters (delivery)
//! - Frequency throttle (per-message suppression)
//! - Message alarm (error-rate triggers)
//! - Reentrant validation (thread-local issue counting)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod alarm;
pub mod broadcaster;
pub mod error;
pub mod listener;
pub mod listeners;
pub mod metrics;
pub mod ports;
pub mod throttle;
pub mod validation;
