//! Fault sources: what the platform delivered and how it becomes a [`ServerError`].

use crate::context::HandlerContext;
use crate::error::fault::FAULT_PURE_VIRTUAL_CALL;
use crate::error::{AssertionError, FaultError, ServerError};
use crate::hooks::FaultContext;
use crate::severity::Severity;

/// A fault delivered by the platform.
pub trait FaultSource {
    /// Native fault code (status code or signal number).
    fn code(&self) -> u32;

    /// Absolute faulting address (0 if unknown).
    fn address(&self) -> usize;

    /// Build the error to raise on the faulting thread.
    fn translate(&self, ctx: &HandlerContext<'_>) -> ServerError;
}

/// Native structured fault: status code, faulting address and context record.
#[derive(Debug, Clone, Copy)]
pub struct StructuredFault {
    code: u32,
    address: usize,
    context: FaultContext,
}

impl StructuredFault {
    /// Wrap a delivered structured fault.
    pub const fn new(code: u32, address: usize, context: FaultContext) -> Self {
        Self {
            code,
            address,
            context,
        }
    }

    /// Context record attached to the fault.
    pub const fn context(&self) -> FaultContext {
        self.context
    }
}

impl FaultSource for StructuredFault {
    fn code(&self) -> u32 {
        self.code
    }

    fn address(&self) -> usize {
        self.address
    }

    fn translate(&self, ctx: &HandlerContext<'_>) -> ServerError {
        if self.code == FAULT_PURE_VIRTUAL_CALL {
            return AssertionError::new("purecall", "unknown", 1).into();
        }

        if ctx.crash_dump_enabled() {
            if let Err(e) = ctx.start_crash_dump(std::process::id(), current_thread_id(), self.context) {
                ctx.event(Severity::Warn, format_args!("Crash dump failed: {e}"));
            }
        }

        let relative = self.address.wrapping_sub(ctx.code_base());
        FaultError::new(self.code, relative).into()
    }
}

/// Fault delivered as a POSIX signal.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalFault {
    signal: nix::sys::signal::Signal,
}

#[cfg(unix)]
impl SignalFault {
    /// Wrap a delivered fault signal.
    pub const fn new(signal: nix::sys::signal::Signal) -> Self {
        Self { signal }
    }

    /// The delivered signal.
    pub const fn signal(&self) -> nix::sys::signal::Signal {
        self.signal
    }
}

#[cfg(unix)]
impl FaultSource for SignalFault {
    fn code(&self) -> u32 {
        self.signal as i32 as u32
    }

    fn address(&self) -> usize {
        0
    }

    fn translate(&self, _ctx: &HandlerContext<'_>) -> ServerError {
        ServerError::SignalFault(crate::signals::signal_error(self.signal))
    }
}

/// The fault source this platform delivers.
#[cfg(windows)]
pub type PlatformFaultSource = StructuredFault;

/// The fault source this platform delivers.
#[cfg(unix)]
pub type PlatformFaultSource = SignalFault;

/// The fault source this platform delivers.
#[cfg(not(any(unix, windows)))]
pub type PlatformFaultSource = StructuredFault;

/// OS identifier of the calling thread.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn current_thread_id() -> u64 {
    nix::unistd::gettid().as_raw() as u64
}

/// OS identifier of the calling thread.
#[cfg(windows)]
pub fn current_thread_id() -> u64 {
    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn GetCurrentThreadId() -> u32;
    }
    // SAFETY: no preconditions.
    u64::from(unsafe { GetCurrentThreadId() })
}

/// OS identifier of the calling thread.
#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
pub fn current_thread_id() -> u64 {
    // SAFETY: no preconditions.
    unsafe { libc::pthread_self() as usize as u64 }
}

/// OS identifier of the calling thread.
#[cfg(not(any(unix, windows)))]
pub fn current_thread_id() -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::fault::{STATUS_ACCESS_VIOLATION, STATUS_INTEGER_DIVIDE_BY_ZERO};
    use crate::error::{ErrorMessage, ErrorText};
    use crate::hooks::testing::RecordingHooks;
    use std::sync::atomic::Ordering;

    #[test]
    fn address_is_normalized_to_code_base() {
        let hooks = RecordingHooks::with_base(0x40_0000);
        let ctx = HandlerContext::new(&hooks);
        let fault = StructuredFault::new(STATUS_ACCESS_VIOLATION, 0x40_1000, FaultContext::empty());

        let err = fault.translate(&ctx);
        let mut text = ErrorText::new();
        err.render(&mut text).unwrap();
        assert_eq!(text.as_str(), "\"Access Violation\" (0x1000)");
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn crash_dump_only_when_enabled() {
        let hooks = RecordingHooks::default();
        let ctx = HandlerContext::new(&hooks);
        let fault = StructuredFault::new(STATUS_INTEGER_DIVIDE_BY_ZERO, 0x10, FaultContext::empty());

        fault.translate(&ctx);
        assert_eq!(hooks.dumps.load(Ordering::SeqCst), 0);

        hooks.dumps_enabled.store(true, Ordering::SeqCst);
        fault.translate(&ctx);
        assert_eq!(hooks.dumps.load(Ordering::SeqCst), 1);
        assert!(hooks.lines().is_empty());
    }

    #[test]
    fn crash_dump_failure_does_not_mask_fault() {
        let hooks = RecordingHooks::default();
        hooks.dumps_enabled.store(true, Ordering::SeqCst);
        hooks.dump_fails.store(true, Ordering::SeqCst);
        let ctx = HandlerContext::new(&hooks);
        let fault = StructuredFault::new(STATUS_ACCESS_VIOLATION, 0x20, FaultContext::empty());

        let err = fault.translate(&ctx);
        assert_eq!(err, ServerError::PlatformFault(FaultError::new(STATUS_ACCESS_VIOLATION, 0x20)));

        let lines = hooks.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, Severity::Warn);
        assert!(lines[0].1.starts_with("Crash dump failed: "));
    }

    #[test]
    fn purecall_becomes_assertion() {
        let hooks = RecordingHooks::default();
        hooks.dumps_enabled.store(true, Ordering::SeqCst);
        let ctx = HandlerContext::new(&hooks);
        let fault = StructuredFault::new(FAULT_PURE_VIRTUAL_CALL, 0x30, FaultContext::empty());

        match fault.translate(&ctx) {
            ServerError::Assertion(a) => {
                assert_eq!(a.expression(), "purecall");
                assert_eq!(a.file(), "unknown");
                assert_eq!(a.line(), 1);
            }
            other => panic!("expected assertion, got {other:?}"),
        }
        assert_eq!(hooks.dumps.load(Ordering::SeqCst), 0);
    }

    #[cfg(unix)]
    #[test]
    fn signal_fault_carries_number_and_name() {
        use nix::sys::signal::Signal;

        let hooks = RecordingHooks::default();
        let ctx = HandlerContext::new(&hooks);
        let source = SignalFault::new(Signal::SIGSEGV);
        assert_eq!(source.code(), 11);
        assert_eq!(source.address(), 0);

        let err = source.translate(&ctx);
        let mut text = ErrorText::new();
        err.render(&mut text).unwrap();
        assert_eq!(text.as_str(), "Error Pri=1, Code=11, Desc='Segmentation fault'");
    }

    #[cfg(any(target_os = "linux", windows))]
    #[test]
    fn thread_ids_differ_between_threads() {
        let here = current_thread_id();
        let there = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(here, there);
        assert_ne!(here, 0);
    }
}
