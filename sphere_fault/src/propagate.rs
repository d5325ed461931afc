//! Raising errors across the fault boundary and catching them again.
//!
//! Fault and signal handlers cannot return an error to the code they
//! interrupted, so they unwind with a [`ServerError`] payload instead.
//! [`catch_fault`] turns that payload back into an ordinary `Result` at the
//! nearest call site that wants to decide the process's fate.
//!
//! Unwinding relies on `panic = "unwind"`; with `panic = "abort"` every raise
//! aborts the process.

use crate::error::ServerError;
use std::panic::{self, AssertUnwindSafe};

/// Unwind to the nearest [`catch_fault`] carrying `error`.
///
/// Does not run the panic hook, so nothing is printed on the way.
#[cold]
pub fn raise(error: ServerError) -> ! {
    panic::resume_unwind(Box::new(error))
}

/// Run `f`, converting a raised [`ServerError`] into `Err`.
///
/// Any other panic payload keeps unwinding untouched.
///
/// `f` is treated as unwind safe: state it mutates may be half-updated when a
/// fault is caught, and callers decide whether it can still be trusted.
pub fn catch_fault<F, T>(f: F) -> Result<T, ServerError>
where
    F: FnOnce() -> T,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => match payload.downcast::<ServerError>() {
            Ok(error) => Err(*error),
            Err(other) => panic::resume_unwind(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorValue, FaultError};
    use crate::severity::Severity;

    #[test]
    fn value_passes_through() {
        assert_eq!(catch_fault(|| 41 + 1), Ok(42));
    }

    #[test]
    fn raised_error_is_returned() {
        let err = ServerError::from(ErrorValue::new(Severity::Error, 3, "bad tick"));
        let outcome: Result<(), _> = catch_fault(|| raise(err));
        assert_eq!(outcome, Err(err));
    }

    #[test]
    fn raise_from_nested_frames() {
        fn deep(n: u32) -> u32 {
            if n == 0 {
                ServerError::from(FaultError::new(0xC000_0005, 0x44)).raise();
            }
            deep(n - 1) + 1
        }

        let outcome = catch_fault(|| deep(16));
        assert!(matches!(outcome, Err(ServerError::PlatformFault(f)) if f.address() == 0x44));
    }

    #[test]
    fn foreign_panics_keep_unwinding() {
        let outer = std::panic::catch_unwind(|| {
            let _: Result<(), _> =
                catch_fault(|| std::panic::resume_unwind(Box::new("not a server error")));
        });
        let payload = outer.unwrap_err();
        assert_eq!(*payload.downcast::<&str>().unwrap(), "not a server error");
    }

    #[test]
    fn nested_catch_sees_innermost() {
        let inner_err = ServerError::from(ErrorValue::new(Severity::Warn, 1, "inner"));
        let outcome = catch_fault(|| {
            let inner: Result<(), _> = catch_fault(|| raise(inner_err));
            inner.err()
        });
        assert_eq!(outcome, Ok(Some(inner_err)));
    }
}
