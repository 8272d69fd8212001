//! Reentrant validation.
//!
//! Validators report problems, glitches and warnings to a sink and decide
//! validity from what *they* reported. Issue counts live in thread-local
//! storage so that validators can compose other validators on the same
//! thread: the outermost call clears the counts, nested calls add to them,
//! and each call compares the counts before and after its own checks.
//!
//! Only problem-or-worse and glitch messages make a validator invalid.
//! Warnings and quibbles are reported but never affect the outcome.
//!
//! ```
//! use tracing_triage::{Checks, MessageList, Scales, TransmitError, Validation, Validator};
//! use std::sync::Arc;
//!
//! struct Port(u32);
//!
//! impl Validation for Port {
//!     fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError> {
//!         checks.problem_if_not_in_range(self.0, 1, 65535, "port")?;
//!         Ok(())
//!     }
//! }
//!
//! let sink = MessageList::new(Arc::new(Scales::standard()));
//! assert!(Port(8080).validate(&sink).unwrap());
//! assert!(!Port(0).validate(&sink).unwrap());
//! ```

use crate::application::listener::{Transceiver, TransmitError};
use crate::domain::kind::MessageKind;
use crate::domain::message::Message;
use crate::domain::ranking::Rank;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

thread_local! {
    static ISSUES: RefCell<ValidationIssues> = RefCell::new(ValidationIssues::default());
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Issue counts reported on the current thread during a validation tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationIssues {
    counts: HashMap<MessageKind, (Rank, usize)>,
}

impl ValidationIssues {
    /// A copy of the current thread's issue counts.
    pub fn snapshot() -> ValidationIssues {
        ISSUES.with(|issues| issues.borrow().clone())
    }

    /// Check if a validation is running on the current thread.
    pub fn is_validating() -> bool {
        DEPTH.with(Cell::get) > 0
    }

    /// Number of issues of one kind.
    pub fn count(&self, kind: &MessageKind) -> usize {
        self.counts.get(kind).map_or(0, |(_, count)| *count)
    }

    /// Number of issues whose severity is at least `threshold`.
    pub fn count_at_least(&self, threshold: Rank) -> usize {
        self.counts
            .values()
            .filter(|(rank, _)| *rank >= threshold)
            .map(|(_, count)| count)
            .sum()
    }

    /// Total number of issues.
    pub fn total(&self) -> usize {
        self.counts.values().map(|(_, count)| count).sum()
    }

    /// Check if no issues were recorded.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn record(message: &Message) {
        ISSUES.with(|issues| {
            let mut issues = issues.borrow_mut();
            let entry = issues
                .counts
                .entry(message.kind().clone())
                .or_insert((message.severity(), 0));
            entry.0 = message.severity();
            entry.1 += 1;
        });
    }

    fn clear() {
        ISSUES.with(|issues| issues.borrow_mut().counts.clear());
    }
}

/// Tracks how deeply validations are nested on the current thread.
///
/// Dropping the guard leaves the level, including on early return.
struct Reentrancy {
    outermost: bool,
}

impl Reentrancy {
    fn enter() -> Self {
        let depth = DEPTH.with(|depth| {
            let entered = depth.get() + 1;
            depth.set(entered);
            entered
        });
        Reentrancy {
            outermost: depth == 1,
        }
    }

    fn is_outermost(&self) -> bool {
        self.outermost
    }
}

impl Drop for Reentrancy {
    fn drop(&mut self) {
        DEPTH.with(|depth| {
            let current = depth.get();
            debug_assert!(current > 0, "validation reentrancy underflow");
            depth.set(current.saturating_sub(1));
        });
    }
}

/// Something that can be validated against a sink.
pub trait Validator {
    /// Validate, reporting issues to `sink`.
    ///
    /// Returns `Ok(true)` if this validation introduced no problem-or-worse
    /// and no glitch messages.
    ///
    /// # Errors
    /// Returns the first error from the sink.
    fn validate(&self, sink: &dyn Transceiver) -> Result<bool, TransmitError>;
}

/// The checks a validator performs.
///
/// Implementing this trait provides [`Validator`] with the reentrant
/// counting behavior.
pub trait Validation {
    /// Run this validator's own checks.
    fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError>;

    /// A validator that runs first, against the same sink.
    fn parent(&self) -> Option<&dyn Validator> {
        None
    }

    /// What is being validated, for the report.
    fn validation_target(&self) -> &str {
        "object"
    }

    /// Send a one-line summary when the outermost validation finishes.
    fn should_show_report(&self) -> bool {
        false
    }
}

impl<T: Validation + ?Sized> Validator for T {
    fn validate(&self, sink: &dyn Transceiver) -> Result<bool, TransmitError> {
        let reentrancy = Reentrancy::enter();
        if reentrancy.is_outermost() {
            ValidationIssues::clear();
        }

        let threshold = sink.scales().severity_of(&MessageKind::Problem)?;
        let before = ValidationIssues::snapshot();

        if let Some(parent) = self.parent() {
            parent.validate(sink)?;
        }
        self.on_validate(&Checks { sink })?;

        let after = ValidationIssues::snapshot();

        if reentrancy.is_outermost() && self.should_show_report() {
            sink.information(
                "Validated $ ($ problems, $ glitches, $ warnings)",
                &[
                    &self.validation_target(),
                    &after.count_at_least(threshold),
                    &after.count(&MessageKind::Glitch),
                    &after.count(&MessageKind::Warning),
                ],
            )?;
        }

        Ok(after.count_at_least(threshold) == before.count_at_least(threshold)
            && after.count(&MessageKind::Glitch) == before.count(&MessageKind::Glitch))
    }
}

/// Reporting interface handed to [`Validation::on_validate`].
///
/// Every issue is counted for the current thread and forwarded to the sink.
pub struct Checks<'a> {
    sink: &'a dyn Transceiver,
}

impl<'a> Checks<'a> {
    /// The sink issues are forwarded to.
    pub fn sink(&self) -> &'a dyn Transceiver {
        self.sink
    }

    /// Report an issue of any kind.
    pub fn report(
        &self,
        kind: MessageKind,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<(), TransmitError> {
        let message = Message::builder(kind, text)
            .arguments(arguments.iter())
            .build(self.sink.scales())?;
        ValidationIssues::record(&message);
        self.sink.transmit(message)?;
        Ok(())
    }

    /// Report a problem.
    pub fn problem(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<(), TransmitError> {
        self.report(MessageKind::Problem, text, arguments)
    }

    /// Report a glitch.
    pub fn glitch(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<(), TransmitError> {
        self.report(MessageKind::Glitch, text, arguments)
    }

    /// Report a warning.
    pub fn warning(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<(), TransmitError> {
        self.report(MessageKind::Warning, text, arguments)
    }

    /// Report a quibble.
    pub fn quibble(&self, text: &str, arguments: &[&dyn fmt::Display]) -> Result<(), TransmitError> {
        self.report(MessageKind::Quibble, text, arguments)
    }

    /// Report a problem if `invalid` holds. Returns `invalid`.
    pub fn problem_if(
        &self,
        invalid: bool,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<bool, TransmitError> {
        self.report_if(invalid, MessageKind::Problem, text, arguments)
    }

    /// Report a glitch if `invalid` holds. Returns `invalid`.
    pub fn glitch_if(
        &self,
        invalid: bool,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<bool, TransmitError> {
        self.report_if(invalid, MessageKind::Glitch, text, arguments)
    }

    /// Report a warning if `invalid` holds. Returns `invalid`.
    pub fn warning_if(
        &self,
        invalid: bool,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<bool, TransmitError> {
        self.report_if(invalid, MessageKind::Warning, text, arguments)
    }

    /// Report a quibble if `invalid` holds. Returns `invalid`.
    pub fn quibble_if(
        &self,
        invalid: bool,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<bool, TransmitError> {
        self.report_if(invalid, MessageKind::Quibble, text, arguments)
    }

    /// Report a problem if `value` is missing. Returns true if it was.
    pub fn problem_if_none<T>(
        &self,
        value: Option<&T>,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<bool, TransmitError> {
        self.problem_if(value.is_none(), text, arguments)
    }

    /// Report a problem if `value` is outside `minimum..=maximum`.
    ///
    /// Returns true if it was out of range.
    pub fn problem_if_not_in_range<T>(
        &self,
        value: T,
        minimum: T,
        maximum: T,
        name: &str,
    ) -> Result<bool, TransmitError>
    where
        T: PartialOrd + fmt::Display,
    {
        let out_of_range = value < minimum || value > maximum;
        self.problem_if(
            out_of_range,
            "$ must be between $ and $, but was $",
            &[&name, &minimum, &maximum, &value],
        )
    }

    /// Run a composed validator against the same sink.
    ///
    /// Its issues count toward this validation too.
    pub fn validate(&self, validator: &dyn Validator) -> Result<bool, TransmitError> {
        validator.validate(self.sink)
    }

    fn report_if(
        &self,
        invalid: bool,
        kind: MessageKind,
        text: &str,
        arguments: &[&dyn fmt::Display],
    ) -> Result<bool, TransmitError> {
        if invalid {
            self.report(kind, text, arguments)?;
        }
        Ok(invalid)
    }
}

impl fmt::Debug for Checks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checks").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::listeners::MessageList;
    use crate::domain::ranking::Scales;
    use std::sync::Arc;

    fn sink() -> MessageList {
        MessageList::new(Arc::new(Scales::standard()))
    }

    struct Empty;

    impl Validation for Empty {
        fn on_validate(&self, _checks: &Checks<'_>) -> Result<(), TransmitError> {
            Ok(())
        }
    }

    struct Reports(MessageKind);

    impl Validation for Reports {
        fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError> {
            checks.report(self.0.clone(), "reported $", &[&self.0])
        }
    }

    struct Composes<'a>(&'a dyn Validator);

    impl Validation for Composes<'_> {
        fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError> {
            checks.validate(self.0)?;
            Ok(())
        }
    }

    #[test]
    fn test_empty_validator_is_valid() {
        let sink = sink();
        assert!(Empty.validate(&sink).unwrap());
        assert!(sink.is_empty());
        assert!(!ValidationIssues::is_validating());
    }

    #[test]
    fn test_only_problems_and_glitches_invalidate() {
        let sink = sink();
        assert!(!Reports(MessageKind::Problem).validate(&sink).unwrap());
        assert!(!Reports(MessageKind::CriticalAlert).validate(&sink).unwrap());
        assert!(!Reports(MessageKind::Glitch).validate(&sink).unwrap());
        assert!(Reports(MessageKind::Warning).validate(&sink).unwrap());
        assert!(Reports(MessageKind::Quibble).validate(&sink).unwrap());
        assert_eq!(sink.len(), 5);
    }

    #[test]
    fn test_outermost_call_clears_counts() {
        let sink = sink();
        Reports(MessageKind::Problem).validate(&sink).unwrap();
        assert_eq!(ValidationIssues::snapshot().count(&MessageKind::Problem), 1);

        Empty.validate(&sink).unwrap();
        assert!(ValidationIssues::snapshot().is_empty());
    }

    #[test]
    fn test_nested_problems_invalidate_every_level() {
        let sink = sink();
        let inner = Reports(MessageKind::Problem);
        let middle = Composes(&inner);
        let outer = Composes(&middle);

        assert!(!outer.validate(&sink).unwrap());
        assert_eq!(ValidationIssues::snapshot().count(&MessageKind::Problem), 1);
    }

    #[test]
    fn test_earlier_issues_do_not_invalidate_later_validators() {
        struct Sequence;

        impl Validation for Sequence {
            fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError> {
                assert!(!checks.validate(&Reports(MessageKind::Problem))?);
                assert!(checks.validate(&Empty)?);
                Ok(())
            }
        }

        let sink = sink();
        assert!(!Sequence.validate(&sink).unwrap());
    }

    #[test]
    fn test_if_helpers() {
        struct Helpers;

        impl Validation for Helpers {
            fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError> {
                assert!(!checks.problem_if(false, "never", &[])?);
                assert!(checks.warning_if(true, "always", &[])?);
                assert!(!checks.glitch_if(false, "never", &[])?);
                assert!(checks.quibble_if(true, "always", &[])?);
                assert!(!checks.problem_if_none(Some(&1), "present", &[])?);
                assert!(!checks.problem_if_not_in_range(5, 1, 10, "count")?);
                Ok(())
            }
        }

        let sink = sink();
        assert!(Helpers.validate(&sink).unwrap());
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_range_message() {
        struct Range;

        impl Validation for Range {
            fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError> {
                checks.problem_if_not_in_range(11, 1, 10, "count")?;
                checks.problem_if_none(None::<&u32>, "$ is required", &[&"name"])?;
                Ok(())
            }
        }

        let sink = sink();
        assert!(!Range.validate(&sink).unwrap());
        assert_eq!(
            sink.formatted(),
            vec![
                "count must be between 1 and 10, but was 11".to_string(),
                "name is required".to_string()
            ]
        );
    }

    #[test]
    fn test_report() {
        struct Reported;

        impl Validation for Reported {
            fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError> {
                checks.warning("w", &[])?;
                checks.glitch("g", &[])
            }

            fn validation_target(&self) -> &str {
                "settings"
            }

            fn should_show_report(&self) -> bool {
                true
            }
        }

        let sink = sink();
        assert!(!Reported.validate(&sink).unwrap());

        let messages = sink.messages();
        let report = messages.last().unwrap();
        assert_eq!(*report.kind(), MessageKind::Information);
        assert_eq!(
            report.description(),
            "Validated settings (0 problems, 1 glitches, 1 warnings)"
        );
    }

    #[test]
    fn test_parent_runs_first() {
        struct Child<'a>(&'a dyn Validator);

        impl Validation for Child<'_> {
            fn on_validate(&self, checks: &Checks<'_>) -> Result<(), TransmitError> {
                checks.warning("child", &[])
            }

            fn parent(&self) -> Option<&dyn Validator> {
                Some(self.0)
            }
        }

        let sink = sink();
        let parent = Reports(MessageKind::Problem);
        assert!(!Child(&parent).validate(&sink).unwrap());
        assert_eq!(sink.messages()[0].description(), "reported Problem");
        assert_eq!(sink.messages()[1].description(), "child");
    }

    #[test]
    fn test_depth_restored_after_error() {
        struct Failing;

        impl Validation for Failing {
            fn on_validate(&self, _checks: &Checks<'_>) -> Result<(), TransmitError> {
                Err(TransmitError::Failure("stop".to_string()))
            }
        }

        let sink = sink();
        assert!(Composes(&Failing).validate(&sink).is_err());
        assert!(!ValidationIssues::is_validating());
    }
}
