//! Error values raised at the fault boundary.
//!
//! Every error kind is a small `Copy` value holding only static text, so it
//! can be built inside a fault or signal handler and carried across the
//! unwind back to normal code. Rendering writes into a caller-provided
//! fixed-capacity buffer and never allocates.
//!
//! ```rust
//! use sphere_fault::error::{ErrorMessage, ErrorText, ErrorValue};
//! use sphere_fault::Severity;
//!
//! let err = ErrorValue::new(Severity::Error, 5, "read failed");
//! let mut text = ErrorText::new();
//! err.render(&mut text).unwrap();
//! assert_eq!(text.as_str(), "Error Pri=3, Code=5, Desc='read failed'");
//! ```

pub mod assertion;
pub mod fault;
pub mod system;
pub mod value;

use crate::consts::ERROR_MESSAGE_CAPACITY;
use crate::severity::Severity;
use std::fmt;
use thiserror::Error;

pub use assertion::{check_fail, AssertionError};
pub use fault::{fault_label, FaultError};
pub use value::ErrorValue;

/// Buffer sized for any rendered error message.
pub type ErrorText = heapless::String<ERROR_MESSAGE_CAPACITY>;

/// Rendering failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The message does not fit; the buffer was left empty.
    #[error("error message does not fit in a {capacity}-byte buffer")]
    BufferTooSmall {
        /// Capacity of the buffer that was offered.
        capacity: usize,
    },
}

/// Common behaviour of all error values.
pub trait ErrorMessage {
    /// Severity of the error.
    fn severity(&self) -> Severity;

    /// Numeric code (0 = no code).
    fn code(&self) -> u32;

    /// Write the human-readable message.
    fn write_message(&self, out: &mut dyn fmt::Write) -> fmt::Result;

    /// Render the message into `buf`, replacing its contents.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::BufferTooSmall`] and leaves `buf` empty if the
    /// message does not fit. Output is never truncated.
    fn render<const N: usize>(&self, buf: &mut heapless::String<N>) -> Result<(), RenderError>
    where
        Self: Sized,
    {
        render_with(buf, |out| self.write_message(out))
    }
}

/// Clear `buf`, run `write`, and map an overflow to `BufferTooSmall`.
pub(crate) fn render_with<const N: usize>(
    buf: &mut heapless::String<N>,
    write: impl FnOnce(&mut heapless::String<N>) -> fmt::Result,
) -> Result<(), RenderError> {
    buf.clear();
    if write(buf).is_err() {
        buf.clear();
        return Err(RenderError::BufferTooSmall { capacity: N });
    }
    Ok(())
}

/// Error propagated from the fault boundary to normal code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServerError {
    /// Plain error value raised by server code.
    #[error("{0}")]
    Generic(ErrorValue),

    /// Invariant check failed.
    #[error("{0}")]
    Assertion(AssertionError),

    /// Hardware/OS fault delivered as a native structured exception.
    #[error("{0}")]
    PlatformFault(FaultError),

    /// Fault delivered as a POSIX signal (code = signal number).
    #[error("{0}")]
    SignalFault(ErrorValue),
}

impl ServerError {
    /// Returns true if the error must end the process.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        ErrorMessage::severity(self).is_fatal()
    }

    /// Raise this error on the normal propagation path.
    ///
    /// See [`crate::propagate::raise`].
    pub fn raise(self) -> ! {
        crate::propagate::raise(self)
    }
}

impl ErrorMessage for ServerError {
    fn severity(&self) -> Severity {
        match self {
            Self::Generic(v) | Self::SignalFault(v) => v.severity(),
            Self::Assertion(a) => a.severity(),
            Self::PlatformFault(f) => f.severity(),
        }
    }

    fn code(&self) -> u32 {
        match self {
            Self::Generic(v) | Self::SignalFault(v) => v.code(),
            Self::Assertion(a) => a.code(),
            Self::PlatformFault(f) => f.code(),
        }
    }

    fn write_message(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        match self {
            Self::Generic(v) | Self::SignalFault(v) => v.write_message(out),
            Self::Assertion(a) => a.write_message(out),
            Self::PlatformFault(f) => f.write_message(out),
        }
    }
}

impl From<ErrorValue> for ServerError {
    fn from(value: ErrorValue) -> Self {
        Self::Generic(value)
    }
}

impl From<AssertionError> for ServerError {
    fn from(value: AssertionError) -> Self {
        Self::Assertion(value)
    }
}

impl From<FaultError> for ServerError {
    fn from(value: FaultError) -> Self {
        Self::PlatformFault(value)
    }
}

static_assertions::assert_impl_all!(ServerError: Copy, Send, Sync, std::error::Error);
