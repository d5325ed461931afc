//! Assertion errors: intentional invariant-violation failures.

use super::value::ErrorValue;
use super::ErrorMessage;
use crate::consts::ASSERT_DESCRIPTION;
use crate::severity::Severity;
use std::fmt;

/// Failed invariant check: expression, source file and line.
///
/// Always severity [`Severity::Critical`] with code 0. Raised only through
/// [`check_fail`] (or the [`sphere_assert!`](crate::sphere_assert) macro).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssertionError {
    base: ErrorValue,
    expression: &'static str,
    file: &'static str,
    line: i64,
}

impl AssertionError {
    pub(crate) const fn new(expression: &'static str, file: &'static str, line: i64) -> Self {
        Self {
            base: ErrorValue::new(Severity::Critical, 0, ASSERT_DESCRIPTION),
            expression,
            file,
            line,
        }
    }

    /// Source text of the failed expression.
    pub const fn expression(&self) -> &'static str {
        self.expression
    }

    /// Source file of the check.
    pub const fn file(&self) -> &'static str {
        self.file
    }

    /// Source line of the check.
    pub const fn line(&self) -> i64 {
        self.line
    }

    /// The underlying error value (`Critical`, code 0, `"Assert"`).
    pub const fn base(&self) -> &ErrorValue {
        &self.base
    }
}

impl ErrorMessage for AssertionError {
    fn severity(&self) -> Severity {
        self.base.severity()
    }

    fn code(&self) -> u32 {
        self.base.code()
    }

    fn write_message(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(
            out,
            "Assert pri={}:'{}' file '{}', line {}",
            self.severity().priority(),
            self.expression,
            self.file,
            self.line
        )
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_message(f)
    }
}

/// Raise an assertion error for a failed check.
///
/// This is the only way an invariant violation becomes a propagated error.
/// The error unwinds to the nearest [`catch_fault`](crate::propagate::catch_fault).
#[cold]
pub fn check_fail(expression: &'static str, file: &'static str, line: i64) -> ! {
    crate::propagate::raise(AssertionError::new(expression, file, line).into())
}

/// Check an invariant, raising an [`AssertionError`] when it does not hold.
///
/// ```rust
/// use sphere_fault::propagate::catch_fault;
/// use sphere_fault::{sphere_assert, ServerError};
///
/// let outcome = catch_fault(|| {
///     let slots: u32 = 0;
///     sphere_assert!(slots > 0);
/// });
/// assert!(matches!(outcome, Err(ServerError::Assertion(_))));
/// ```
#[macro_export]
macro_rules! sphere_assert {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::error::assertion::check_fail(
                ::core::stringify!($cond),
                ::core::file!(),
                ::core::line!() as i64,
            );
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorText, ServerError};
    use crate::propagate::catch_fault;

    #[test]
    fn render_format() {
        let err = AssertionError::new("x != nullptr", "world.cpp", 42);
        let mut text = ErrorText::new();
        err.render(&mut text).unwrap();
        assert_eq!(text.as_str(), "Assert pri=2:'x != nullptr' file 'world.cpp', line 42");
    }

    #[test]
    fn fixed_severity_code_and_description() {
        let err = AssertionError::new("ok", "a.rs", 1);
        assert_eq!(err.severity(), Severity::Critical);
        assert_eq!(err.code(), 0);
        assert_eq!(err.base().description(), "Assert");
    }

    #[test]
    fn check_fail_raises_assertion() {
        let outcome: Result<(), _> = catch_fault(|| check_fail("count > 0", "items.rs", 9));
        match outcome {
            Err(ServerError::Assertion(a)) => {
                assert_eq!(a.expression(), "count > 0");
                assert_eq!(a.file(), "items.rs");
                assert_eq!(a.line(), 9);
            }
            other => panic!("expected assertion error, got {other:?}"),
        }
    }

    #[test]
    fn macro_captures_expression_and_location() {
        let outcome = catch_fault(|| {
            let hits = 3;
            crate::sphere_assert!(hits == 4);
        });
        let Err(ServerError::Assertion(a)) = outcome else {
            panic!("expected assertion error");
        };
        assert_eq!(a.expression(), "hits == 4");
        assert!(a.file().ends_with("assertion.rs"));
        assert!(a.line() > 0);
    }

    #[test]
    fn macro_passes_when_condition_holds() {
        let outcome = catch_fault(|| {
            crate::sphere_assert!(1 + 1 == 2);
            7
        });
        assert_eq!(outcome, Ok(7));
    }
}
