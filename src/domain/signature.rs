//! Throttle keys for per-call-site delivery throttling.
//!
//! A throttle key identifies a class of repeated messages based on:
//! - Message kind
//! - Originating code context, if the caller supplied one
//! - Uninterpolated message text
//!
//! Arguments are deliberately left out: "Cannot connect to $" from the same
//! call site is one repeated message no matter which host it names.

use crate::domain::message::Message;
use ahash::AHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A hash identifying messages that throttle together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThrottleKey(u64);

impl ThrottleKey {
    /// Compute the key for a message.
    pub fn of(message: &Message) -> Self {
        let mut hasher = AHasher::default();

        message.kind().hash(&mut hasher);

        // Distinguish "no context" from an empty context
        match message.context() {
            Some(context) => {
                1u8.hash(&mut hasher);
                context.hash(&mut hasher);
            }
            None => 0u8.hash(&mut hasher),
        }

        message.text().hash(&mut hasher);

        ThrottleKey(hasher.finish())
    }

    /// Get the raw hash value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThrottleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
