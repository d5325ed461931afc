//! # Structured-Fault Translator
//!
//! Converts faults delivered by the platform into [`ServerError`]s raised on
//! the faulting thread.
//!
//! On Windows, enabling registers a first-chance vectored exception handler.
//! Elsewhere there are no native structured exceptions and enabling is a
//! no-op; fault signals are routed by [`crate::signals`].
//!
//! ## Double faults
//!
//! A handler runs inside a [`FaultGuard`]. A fault arriving while the same
//! thread already holds a guard means the handler itself faulted; the process
//! logs one fatal line, restores the default SIGABRT action and aborts.

mod source;
#[cfg(windows)]
mod seh;

pub use source::{current_thread_id, FaultSource, PlatformFaultSource, StructuredFault};
#[cfg(unix)]
pub use source::SignalFault;

use crate::context::HandlerContext;
use crate::error::ServerError;
use crate::severity::Severity;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Errors from enabling/disabling the translator.
#[derive(Debug, Error)]
pub enum TranslatorError {
    /// The platform refused the handler registration.
    #[error("failed to register the structured-fault handler")]
    RegistrationFailed,
}

static TRANSLATOR_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Enable or disable structured-fault translation.
///
/// Idempotent. Returns whether a platform handler is now registered.
///
/// # Errors
///
/// Returns [`TranslatorError::RegistrationFailed`] if the platform rejects the
/// registration.
pub fn set_exception_translator(enable: bool) -> Result<bool, TranslatorError> {
    if is_translator_active() == enable {
        return Ok(enable);
    }
    let active = switch_platform(enable)?;
    TRANSLATOR_ACTIVE.store(active, Ordering::Release);
    tracing::debug!(enable, active, "structured-fault translator updated");
    Ok(active)
}

#[cfg(windows)]
fn switch_platform(enable: bool) -> Result<bool, TranslatorError> {
    if enable {
        seh::register()?;
    } else {
        seh::unregister();
    }
    Ok(enable)
}

// No native structured faults here; fault signals go through the signal router.
#[cfg(not(windows))]
fn switch_platform(_enable: bool) -> Result<bool, TranslatorError> {
    Ok(false)
}

/// Returns true if a platform structured-fault handler is registered.
pub fn is_translator_active() -> bool {
    TRANSLATOR_ACTIVE.load(Ordering::Acquire)
}

/// Translate a fault into a [`ServerError`] without raising it.
pub fn translate(source: &impl FaultSource, ctx: &HandlerContext<'_>) -> ServerError {
    source.translate(ctx)
}

// ─── Double-Fault Guard ─────────────────────────────────────────────

thread_local! {
    static IN_FAULT: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as handling a fault until dropped.
#[derive(Debug)]
pub struct FaultGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl FaultGuard {
    /// Enter fault handling on this thread.
    ///
    /// Aborts the process if the thread is already handling a fault.
    pub fn enter(ctx: Option<&HandlerContext<'_>>, code: u32) -> Self {
        if IN_FAULT.with(|flag| flag.replace(true)) {
            double_fault(ctx, code);
        }
        Self {
            _not_send: std::marker::PhantomData,
        }
    }

    /// Returns true if the current thread is inside a fault handler.
    pub fn is_handling() -> bool {
        IN_FAULT.with(Cell::get)
    }
}

impl Drop for FaultGuard {
    fn drop(&mut self) {
        IN_FAULT.with(|flag| flag.set(false));
    }
}

#[cold]
fn double_fault(ctx: Option<&HandlerContext<'_>>, code: u32) -> ! {
    match ctx {
        Some(ctx) => ctx.event(
            Severity::Fatal,
            format_args!("Fault 0x{code:x} while handling a fault, aborting"),
        ),
        None => tracing::error!(code, "fault while handling a fault, aborting"),
    }
    restore_default_abort();
    std::process::abort()
}

// The signal router may own SIGABRT; the abort must reach the default action.
#[cfg(unix)]
fn restore_default_abort() {
    // SAFETY: async-signal-safe; resets one disposition.
    unsafe {
        libc::signal(libc::SIGABRT, libc::SIG_DFL);
    }
}

#[cfg(not(unix))]
fn restore_default_abort() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::fault::{FAULT_PURE_VIRTUAL_CALL, STATUS_ACCESS_VIOLATION};
    use crate::error::ErrorMessage;
    use crate::hooks::testing::RecordingHooks;
    use crate::hooks::FaultContext;

    #[test]
    fn guard_tracks_nesting_per_thread() {
        assert!(!FaultGuard::is_handling());
        {
            let _guard = FaultGuard::enter(None, 0);
            assert!(FaultGuard::is_handling());
            let other = std::thread::spawn(FaultGuard::is_handling).join().unwrap();
            assert!(!other);
        }
        assert!(!FaultGuard::is_handling());
    }

    #[test]
    fn guard_is_released_by_unwinding() {
        let hooks = RecordingHooks::default();
        let ctx = HandlerContext::new(&hooks);
        let fault = StructuredFault::new(STATUS_ACCESS_VIOLATION, 0, FaultContext::empty());

        let result: Result<(), _> = crate::propagate::catch_fault(|| {
            let _guard = FaultGuard::enter(Some(&ctx), STATUS_ACCESS_VIOLATION);
            crate::propagate::raise(fault.translate(&ctx))
        });
        assert!(result.is_err());
        assert!(!FaultGuard::is_handling());
    }

    #[test]
    fn translate_free_function_matches_trait() {
        let hooks = RecordingHooks::with_base(0x100);
        let ctx = HandlerContext::new(&hooks);
        let fault = StructuredFault::new(FAULT_PURE_VIRTUAL_CALL, 0x500, FaultContext::empty());
        let err = translate(&fault, &ctx);
        assert!(matches!(err, ServerError::Assertion(_)));
        assert_eq!(err.severity(), Severity::Critical);
    }

    #[cfg(not(windows))]
    #[test]
    fn translator_is_noop_without_native_faults() {
        assert!(!set_exception_translator(true).unwrap());
        assert!(!is_translator_active());
        assert!(!set_exception_translator(false).unwrap());
    }
}
