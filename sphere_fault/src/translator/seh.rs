//! Windows vectored exception handler.
//!
//! Vectored handlers run before every frame-based `__except` block, whatever
//! their position in the vectored list. A code accepted by `is_translated` is
//! therefore raised as a [`crate::ServerError`] even when foreign code on the
//! stack would have handled it; other codes keep their native handling.

use super::{FaultGuard, FaultSource, StructuredFault, TranslatorError};
use crate::context::HandlerContext;
use crate::error::fault::{fault_label, FAULT_PURE_VIRTUAL_CALL};
use crate::hooks::FaultContext;
use crate::propagate::raise;
use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

const EXCEPTION_CONTINUE_SEARCH: i32 = 0;

/// Error severity with the customer bit clear. Excludes the codes used by
/// language runtimes (including Rust's own unwinding) for software exceptions.
const SEVERITY_MASK: u32 = 0xE000_0000;
const SEVERITY_ERROR: u32 = 0xC000_0000;

#[repr(C)]
struct ExceptionRecord {
    code: u32,
    flags: u32,
    record: *mut ExceptionRecord,
    address: *mut c_void,
    parameter_count: u32,
    information: [usize; 15],
}

#[repr(C)]
struct ExceptionPointers {
    record: *mut ExceptionRecord,
    context: *mut c_void,
}

type VectoredHandler = unsafe extern "system-unwind" fn(*mut ExceptionPointers) -> i32;

#[link(name = "kernel32")]
unsafe extern "system" {
    fn AddVectoredExceptionHandler(first: u32, handler: VectoredHandler) -> *mut c_void;
    fn RemoveVectoredExceptionHandler(handle: *mut c_void) -> u32;
}

static HANDLE: AtomicPtr<c_void> = AtomicPtr::new(ptr::null_mut());

pub(super) fn register() -> Result<(), TranslatorError> {
    // SAFETY: `on_exception` matches the vectored handler ABI and lives forever.
    let handle = unsafe { AddVectoredExceptionHandler(1, on_exception) };
    if handle.is_null() {
        return Err(TranslatorError::RegistrationFailed);
    }
    HANDLE.store(handle, Ordering::Release);
    Ok(())
}

pub(super) fn unregister() {
    let handle = HANDLE.swap(ptr::null_mut(), Ordering::AcqRel);
    if !handle.is_null() {
        // SAFETY: `handle` came from AddVectoredExceptionHandler and is removed once.
        unsafe { RemoveVectoredExceptionHandler(handle) };
    }
}

fn is_translated(code: u32) -> bool {
    fault_label(code).is_some() || code == FAULT_PURE_VIRTUAL_CALL || code & SEVERITY_MASK == SEVERITY_ERROR
}

unsafe extern "system-unwind" fn on_exception(info: *mut ExceptionPointers) -> i32 {
    // SAFETY: the OS passes valid pointers for the duration of the call.
    let Some(info) = (unsafe { info.as_ref() }) else {
        return EXCEPTION_CONTINUE_SEARCH;
    };
    // SAFETY: as above.
    let Some(record) = (unsafe { info.record.as_ref() }) else {
        return EXCEPTION_CONTINUE_SEARCH;
    };
    if !is_translated(record.code) {
        return EXCEPTION_CONTINUE_SEARCH;
    }
    let Some(ctx) = HandlerContext::active() else {
        return EXCEPTION_CONTINUE_SEARCH;
    };

    let fault = StructuredFault::new(
        record.code,
        record.address as usize,
        FaultContext::new(info.context.cast_const()),
    );
    let error = {
        let _guard = FaultGuard::enter(Some(&ctx), fault.code());
        fault.translate(&ctx)
    };
    raise(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::fault::{STATUS_ACCESS_VIOLATION, STATUS_BREAKPOINT};

    #[test]
    fn filter_accepts_faults_and_skips_runtime_exceptions() {
        assert!(is_translated(STATUS_ACCESS_VIOLATION));
        assert!(is_translated(STATUS_BREAKPOINT));
        assert!(is_translated(FAULT_PURE_VIRTUAL_CALL));
        assert!(is_translated(0xC000_0135));
        assert!(!is_translated(0xE06D_7363));
        assert!(!is_translated(0x4000_0015));
    }
}
