//! Severity and importance ranking.
//!
//! A [`RankRegistry`] maps message kinds to a continuous rank in `[0, 1]`.
//! Ranks are write-once: registering a kind that already has a rank keeps the
//! existing rank, so two messages of the same kind always compare equal.
//!
//! [`Scales`] pairs a severity registry with a finer-grained importance
//! registry and is the value passed to everything that builds messages.

use crate::domain::kind::MessageKind;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Error raised by rank lookups and registrations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankError {
    /// A rank was requested for a kind that was never registered.
    #[error("message kind `{0}` has no registered rank")]
    UnregisteredKind(MessageKind),
    /// An interpolated registration referenced an unregistered anchor.
    #[error("cannot register `{kind}`: anchor `{anchor}` has no registered rank")]
    InvalidAnchor {
        /// The kind being registered
        kind: MessageKind,
        /// The anchor that was missing
        anchor: MessageKind,
    },
}

/// A position on a ranking scale, between 0.0 and 1.0 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Rank(f64);

impl Rank {
    /// The lowest possible rank.
    pub const MINIMUM: Rank = Rank(0.0);

    /// The highest possible rank.
    pub const MAXIMUM: Rank = Rank(1.0);

    /// Create a rank, returning `None` if the value is outside `[0, 1]` or NaN.
    pub fn new(value: f64) -> Option<Self> {
        if (0.0..=1.0).contains(&value) {
            Some(Rank(value))
        } else {
            None
        }
    }

    /// The raw rank value.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// The rank halfway between `self` and `other`.
    pub fn midpoint(&self, other: Rank) -> Rank {
        Rank(self.0 + (other.0 - self.0) / 2.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// An ordered, write-once registry of message kind ranks.
///
/// Lookups are lock-free reads on a sharded map, so a registry can be shared
/// behind an `Arc` by every broadcaster in a process.
#[derive(Debug, Default)]
pub struct RankRegistry {
    ranks: DashMap<MessageKind, Rank>,
}

impl RankRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            ranks: DashMap::new(),
        }
    }

    /// Get the rank of a kind.
    ///
    /// # Errors
    /// Returns `RankError::UnregisteredKind` if the kind was never registered.
    pub fn rank_of(&self, kind: &MessageKind) -> Result<Rank, RankError> {
        self.ranks
            .get(kind)
            .map(|rank| *rank)
            .ok_or_else(|| RankError::UnregisteredKind(kind.clone()))
    }

    /// Check if a kind has a rank.
    pub fn contains(&self, kind: &MessageKind) -> bool {
        self.ranks.contains_key(kind)
    }

    /// Assign evenly spaced ranks `i / (n - 1)` to the kinds, in order.
    ///
    /// Kinds that already have a rank keep it. A single kind is ranked 0.0.
    pub fn register_sequence(&self, kinds: &[MessageKind]) {
        let steps = kinds.len().saturating_sub(1).max(1) as f64;
        for (index, kind) in kinds.iter().enumerate() {
            self.ranks
                .entry(kind.clone())
                .or_insert(Rank(index as f64 / steps));
        }
    }

    /// Register a kind halfway between two registered anchors.
    ///
    /// Returns the kind's rank, which is the existing rank if the kind was
    /// already registered.
    ///
    /// # Errors
    /// Returns `RankError::InvalidAnchor` if either anchor is unregistered.
    pub fn register_anchored(
        &self,
        kind: MessageKind,
        low: &MessageKind,
        high: &MessageKind,
    ) -> Result<Rank, RankError> {
        let anchor_rank = |anchor: &MessageKind| {
            self.rank_of(anchor).map_err(|_| RankError::InvalidAnchor {
                kind: kind.clone(),
                anchor: anchor.clone(),
            })
        };
        let low_rank = anchor_rank(low)?;
        let high_rank = anchor_rank(high)?;

        let rank = *self
            .ranks
            .entry(kind)
            .or_insert(low_rank.midpoint(high_rank));
        Ok(rank)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Check if no kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// All registered kinds, lowest rank first.
    ///
    /// Kinds of equal rank are ordered by kind to keep the result stable.
    pub fn ladder(&self) -> Vec<(MessageKind, Rank)> {
        let mut ladder: Vec<(MessageKind, Rank)> = self
            .ranks
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        ladder.sort_by(|(a_kind, a_rank), (b_kind, b_rank)| {
            a_rank
                .partial_cmp(b_rank)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a_kind.cmp(b_kind))
        });
        ladder
    }
}

/// The severity and importance scales used to rank messages.
#[derive(Debug, Default)]
pub struct Scales {
    severity: RankRegistry,
    importance: RankRegistry,
}

impl Scales {
    /// Create scales with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create the standard scales.
    ///
    /// Severity is seeded with the eight-step ladder from trace to
    /// critical-alert, then the remaining built-in kinds are interpolated
    /// between their neighbours. Importance ranks all fourteen built-in kinds
    /// evenly.
    pub fn standard() -> Self {
        let scales = Self::empty();
        scales
            .severity
            .register_sequence(&MessageKind::SEVERITY_LADDER);

        use MessageKind::*;
        let interpolated = [
            (Quibble, Glitch, Warning),
            (Step, Information, Narration),
            (OperationStarted, Trace, Information),
            (OperationSucceeded, Trace, Information),
            (OperationFailed, Problem, Alert),
            (OperationHalted, Alert, CriticalAlert),
        ];
        for (kind, low, high) in interpolated {
            let registered = scales.severity.register_anchored(kind, &low, &high);
            debug_assert!(registered.is_ok(), "standard ladder anchor: {registered:?}");
        }

        scales
            .importance
            .register_sequence(&MessageKind::IMPORTANCE_LADDER);
        scales
    }

    /// The severity registry.
    pub fn severity(&self) -> &RankRegistry {
        &self.severity
    }

    /// The importance registry.
    pub fn importance(&self) -> &RankRegistry {
        &self.importance
    }

    /// Severity rank of a kind.
    pub fn severity_of(&self, kind: &MessageKind) -> Result<Rank, RankError> {
        self.severity.rank_of(kind)
    }

    /// Importance rank of a kind.
    pub fn importance_of(&self, kind: &MessageKind) -> Result<Rank, RankError> {
        self.importance.rank_of(kind)
    }

    /// Register a kind between two anchors on both scales.
    ///
    /// # Errors
    /// Returns `RankError::InvalidAnchor` if an anchor is missing from either
    /// scale. Nothing is registered in that case.
    pub fn register_anchored(
        &self,
        kind: MessageKind,
        low: &MessageKind,
        high: &MessageKind,
    ) -> Result<(), RankError> {
        for registry in [&self.severity, &self.importance] {
            for anchor in [low, high] {
                if !registry.contains(anchor) {
                    return Err(RankError::InvalidAnchor {
                        kind,
                        anchor: anchor.clone(),
                    });
                }
            }
        }
        self.severity.register_anchored(kind.clone(), low, high)?;
        self.importance.register_anchored(kind, low, high)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_builtin_ladder_is_monotonic() {
        let scales = Scales::standard();
        let ranks: Vec<Rank> = MessageKind::SEVERITY_LADDER
            .iter()
            .map(|kind| scales.severity_of(kind).unwrap())
            .collect();

        for pair in ranks.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        assert_eq!(ranks[0], Rank::MINIMUM);
        assert_eq!(ranks[7], Rank::MAXIMUM);
    }

    #[test]
    fn test_register_sequence_example() {
        let registry = RankRegistry::new();
        registry.register_sequence(&[
            MessageKind::Trace,
            MessageKind::Warning,
            MessageKind::Problem,
        ]);

        assert_eq!(registry.rank_of(&MessageKind::Trace).unwrap().value(), 0.0);
        assert_eq!(registry.rank_of(&MessageKind::Warning).unwrap().value(), 0.5);
        assert_eq!(registry.rank_of(&MessageKind::Problem).unwrap().value(), 1.0);
    }

    #[test]
    fn test_register_sequence_single_kind() {
        let registry = RankRegistry::new();
        registry.register_sequence(&[MessageKind::Trace]);
        assert_eq!(registry.rank_of(&MessageKind::Trace).unwrap(), Rank::MINIMUM);
    }

    #[test]
    fn test_unregistered_kind() {
        let registry = RankRegistry::new();
        assert_eq!(
            registry.rank_of(&MessageKind::Alert),
            Err(RankError::UnregisteredKind(MessageKind::Alert))
        );
    }

    #[test]
    fn test_anchored_midpoint() {
        let registry = RankRegistry::new();
        registry.register_sequence(&[MessageKind::Trace, MessageKind::Problem]);

        let audit = MessageKind::custom("Audit");
        let rank = registry
            .register_anchored(audit.clone(), &MessageKind::Trace, &MessageKind::Problem)
            .unwrap();

        assert_eq!(rank.value(), 0.5);
        assert_eq!(registry.rank_of(&audit).unwrap(), rank);
    }

    #[test]
    fn test_anchored_with_missing_anchor() {
        let registry = RankRegistry::new();
        registry.register_sequence(&[MessageKind::Trace]);

        let result = registry.register_anchored(
            MessageKind::custom("Audit"),
            &MessageKind::Trace,
            &MessageKind::Alert,
        );

        assert_eq!(
            result,
            Err(RankError::InvalidAnchor {
                kind: MessageKind::custom("Audit"),
                anchor: MessageKind::Alert,
            })
        );
        assert!(!registry.contains(&MessageKind::custom("Audit")));
    }

    #[test]
    fn test_ranks_are_write_once() {
        let registry = RankRegistry::new();
        registry.register_sequence(&[MessageKind::Trace, MessageKind::Warning]);
        registry.register_sequence(&[MessageKind::Warning, MessageKind::Trace]);

        assert_eq!(registry.rank_of(&MessageKind::Trace).unwrap().value(), 0.0);
        assert_eq!(registry.rank_of(&MessageKind::Warning).unwrap().value(), 1.0);

        let again = registry
            .register_anchored(MessageKind::Warning, &MessageKind::Trace, &MessageKind::Trace)
            .unwrap();
        assert_eq!(again.value(), 1.0);
    }

    #[test]
    fn test_standard_interpolated_kinds() {
        let scales = Scales::standard();
        let severity = |kind: MessageKind| scales.severity_of(&kind).unwrap();

        assert!(severity(MessageKind::Glitch) < severity(MessageKind::Quibble));
        assert!(severity(MessageKind::Quibble) < severity(MessageKind::Warning));
        assert!(severity(MessageKind::Problem) < severity(MessageKind::OperationFailed));
        assert!(severity(MessageKind::OperationHalted) < severity(MessageKind::CriticalAlert));
        assert_eq!(scales.severity().len(), 14);
        assert_eq!(scales.importance().len(), 14);
    }

    #[test]
    fn test_standard_ranks_every_builtin_kind() {
        let scales = Scales::standard();
        for kind in MessageKind::IMPORTANCE_LADDER {
            assert!(scales.severity_of(&kind).is_ok(), "{kind} has no severity");
            assert!(scales.importance_of(&kind).is_ok(), "{kind} has no importance");
        }
    }

    #[test]
    fn test_scales_register_custom_kind() {
        let scales = Scales::standard();
        let audit = MessageKind::custom("Audit");

        scales
            .register_anchored(audit.clone(), &MessageKind::Warning, &MessageKind::Problem)
            .unwrap();

        let severity = scales.severity_of(&audit).unwrap();
        assert!(severity > scales.severity_of(&MessageKind::Warning).unwrap());
        assert!(severity < scales.severity_of(&MessageKind::Problem).unwrap());
        assert!(scales.importance_of(&audit).is_ok());
    }

    #[test]
    fn test_scales_register_leaves_nothing_on_error() {
        let scales = Scales::empty();
        scales.severity().register_sequence(&[MessageKind::Trace, MessageKind::Alert]);

        let result = scales.register_anchored(
            MessageKind::custom("Audit"),
            &MessageKind::Trace,
            &MessageKind::Alert,
        );

        assert!(matches!(result, Err(RankError::InvalidAnchor { .. })));
        assert!(!scales.severity().contains(&MessageKind::custom("Audit")));
    }

    #[test]
    fn test_ladder_order() {
        let scales = Scales::standard();
        let ladder = scales.severity().ladder();

        assert_eq!(ladder.first().map(|(k, _)| k), Some(&MessageKind::Trace));
        assert_eq!(
            ladder.last().map(|(k, _)| k),
            Some(&MessageKind::CriticalAlert)
        );
    }

    proptest! {
        #[test]
        fn prop_sequence_is_strictly_increasing(n in 2usize..40) {
            let registry = RankRegistry::new();
            let kinds: Vec<MessageKind> = (0..n)
                .map(|i| MessageKind::custom(format!("Kind{}", i)))
                .collect();
            registry.register_sequence(&kinds);

            for pair in kinds.windows(2) {
                let a = registry.rank_of(&pair[0]).unwrap();
                let b = registry.rank_of(&pair[1]).unwrap();
                prop_assert!(a < b);
            }
            prop_assert_eq!(registry.rank_of(&kinds[n - 1]).unwrap(), Rank::MAXIMUM);
        }

        #[test]
        fn prop_anchored_rank_is_between_anchors(a in 0usize..8, b in 0usize..8) {
            let scales = Scales::standard();
            let low = MessageKind::SEVERITY_LADDER[a.min(b)].clone();
            let high = MessageKind::SEVERITY_LADDER[a.max(b)].clone();
            let kind = MessageKind::custom("Between");

            let rank = scales
                .severity()
                .register_anchored(kind, &low, &high)
                .unwrap();
            let low_rank = scales.severity_of(&low).unwrap();
            let high_rank = scales.severity_of(&high).unwrap();

            prop_assert!(low_rank <= rank && rank <= high_rank);
            let expected = (low_rank.value() + high_rank.value()) / 2.0;
            prop_assert!((rank.value() - expected).abs() < 1e-12);
        }
    }
}
