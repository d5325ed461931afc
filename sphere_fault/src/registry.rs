//! Process-wide registration of the active [`ServerHooks`].
//!
//! Handlers only read the registration. It is written by [`install_hooks`]
//! at startup and [`clear_hooks`] at shutdown, strictly outside the period in
//! which faults are expected, so a handler never observes a registration
//! being freed.

use crate::hooks::ServerHooks;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Registration {
    hooks: &'static dyn ServerHooks,
}

static ACTIVE: AtomicPtr<Registration> = AtomicPtr::new(ptr::null_mut());

/// Register `hooks` as the collaborators used by every handler.
///
/// Replaces any previous registration. Call during startup only.
pub fn install_hooks(hooks: &'static dyn ServerHooks) {
    let fresh = Box::into_raw(Box::new(Registration { hooks }));
    let previous = ACTIVE.swap(fresh, Ordering::AcqRel);
    release(previous);
}

/// Remove the registration. Returns true if one was present.
///
/// Call during shutdown only, after the translator and signal router are
/// disabled.
pub fn clear_hooks() -> bool {
    let previous = ACTIVE.swap(ptr::null_mut(), Ordering::AcqRel);
    let had = !previous.is_null();
    release(previous);
    had
}

/// Currently registered hooks, if any.
pub fn active_hooks() -> Option<&'static dyn ServerHooks> {
    let current = ACTIVE.load(Ordering::Acquire);
    // SAFETY: a non-null pointer came from `Box::into_raw` and is only freed by
    // install/clear, which do not run while faults are being handled.
    unsafe { current.as_ref() }.map(|registration| registration.hooks)
}

/// Returns true if hooks are registered.
pub fn is_installed() -> bool {
    !ACTIVE.load(Ordering::Acquire).is_null()
}

fn release(registration: *mut Registration) {
    if !registration.is_null() {
        // SAFETY: produced by `Box::into_raw` in `install_hooks` and already
        // unlinked from `ACTIVE`.
        drop(unsafe { Box::from_raw(registration) });
    }
}
