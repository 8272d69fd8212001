//! Configuration errors.

use crate::domain::ranking::RankError;
use thiserror::Error;

/// Error returned when a builder's configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A rate window must be longer than zero
    #[error("rate window must be greater than zero")]
    ZeroWindow,
    /// A configured kind has no rank
    #[error(transparent)]
    Rank(#[from] RankError),
}
