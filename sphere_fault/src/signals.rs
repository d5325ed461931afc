//! # Shutdown Signal Router
//!
//! Routes POSIX signals to the server's shutdown and fault handling.
//!
//! | signal | class | action |
//! |--------|-------|--------|
//! | SIGHUP | `HANGUP` | save the world unless resync is paused, then request exit |
//! | SIGTERM, SIGQUIT, SIGABRT, SIGILL | `TERMINATE` | log, request exit, end the thread |
//! | SIGINT | `INTERRUPT` | request exit, or refuse in secure mode |
//! | SIGSEGV, SIGFPE | `FAULT` | raise [`ServerError::SignalFault`] on the faulting thread |
//! | SIGPIPE | `BROKEN_PIPE` | ignored |
//! | SIGCHLD | `CHILD` | reap terminated children |
//!
//! Handlers are installed with `libc::sigaction` because unwinding out of a
//! fault handler needs an `extern "C-unwind"` entry point, which nix's
//! handler type does not accept.
//!
//! The previous disposition of every signal is saved on install and restored
//! exactly on uninstall. Both directions are idempotent.
//!
//! Every entry point restores the interrupted code's `errno` when it returns
//! or unwinds. A SIGABRT raised while the same thread is already terminating
//! takes the default action instead of re-entering the terminate handler.

use crate::context::HandlerContext;
use crate::error::{ErrorValue, ServerError};
use crate::propagate::raise;
use crate::severity::Severity;
use crate::translator::{FaultGuard, FaultSource, SignalFault};
use bitflags::bitflags;
use nix::errno::Errno;
use nix::sys::signal::{SigSet, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::cell::Cell;
use std::ffi::c_int;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use thiserror::Error;

bitflags! {
    /// Groups of signals routed together.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SignalClass: u8 {
        /// SIGHUP.
        const HANGUP      = 0x01;
        /// SIGTERM, SIGQUIT, SIGABRT, SIGILL.
        const TERMINATE   = 0x02;
        /// SIGINT.
        const INTERRUPT   = 0x04;
        /// SIGSEGV, SIGFPE.
        const FAULT       = 0x08;
        /// SIGPIPE (ignored).
        const BROKEN_PIPE = 0x10;
        /// SIGCHLD.
        const CHILD       = 0x20;
    }
}

/// Signal router errors.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Changing a signal disposition failed.
    #[error("failed to change disposition of {signal}: {source}")]
    Disposition {
        /// Signal whose disposition could not be changed
        signal: Signal,
        /// Underlying OS error
        #[source]
        source: nix::Error,
    },

    /// The saved-disposition table is poisoned.
    #[error("signal router state is poisoned")]
    Poisoned,
}

// ─── Routing Table ──────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Target {
    Handler(extern "C-unwind" fn(c_int)),
    Ignore,
}

#[derive(Clone, Copy)]
struct Route {
    signal: Signal,
    class: SignalClass,
    target: Target,
}

const ROUTES: [Route; 10] = [
    Route { signal: Signal::SIGHUP, class: SignalClass::HANGUP, target: Target::Handler(on_hangup) },
    Route { signal: Signal::SIGTERM, class: SignalClass::TERMINATE, target: Target::Handler(on_terminate) },
    Route { signal: Signal::SIGQUIT, class: SignalClass::TERMINATE, target: Target::Handler(on_terminate) },
    Route { signal: Signal::SIGABRT, class: SignalClass::TERMINATE, target: Target::Handler(on_terminate) },
    Route { signal: Signal::SIGILL, class: SignalClass::TERMINATE, target: Target::Handler(on_terminate) },
    Route { signal: Signal::SIGINT, class: SignalClass::INTERRUPT, target: Target::Handler(on_interrupt) },
    Route { signal: Signal::SIGSEGV, class: SignalClass::FAULT, target: Target::Handler(on_fault) },
    Route { signal: Signal::SIGFPE, class: SignalClass::FAULT, target: Target::Handler(on_fault) },
    Route { signal: Signal::SIGPIPE, class: SignalClass::BROKEN_PIPE, target: Target::Ignore },
    Route { signal: Signal::SIGCHLD, class: SignalClass::CHILD, target: Target::Handler(on_child) },
];

fn route_for(signal: Signal) -> Option<&'static Route> {
    ROUTES.iter().find(|route| route.signal == signal)
}

/// Human-readable name of `signal`.
pub fn describe(signal: Signal) -> &'static str {
    match signal {
        Signal::SIGHUP => "Hangup",
        Signal::SIGINT => "Interrupt",
        Signal::SIGQUIT => "Quit",
        Signal::SIGILL => "Illegal instruction",
        Signal::SIGABRT => "Aborted",
        Signal::SIGFPE => "Floating point exception",
        Signal::SIGSEGV => "Segmentation fault",
        Signal::SIGPIPE => "Broken pipe",
        Signal::SIGTERM => "Terminated",
        Signal::SIGCHLD => "Child exited",
        other => other.as_str(),
    }
}

// ─── Install / Uninstall ────────────────────────────────────────────

struct RouterState {
    saved: [Option<libc::sigaction>; ROUTES.len()],
}

static STATE: Mutex<RouterState> = Mutex::new(RouterState {
    saved: [None; ROUTES.len()],
});

/// Classes with handlers in place. Read by handlers, which cannot lock `STATE`.
static INSTALLED: AtomicU8 = AtomicU8::new(0);

/// Install (`true`) or uninstall (`false`) the router.
///
/// Returns the classes installed afterwards. Call only at startup and
/// shutdown, after hooks are registered and before they are cleared.
///
/// # Errors
///
/// Returns [`SignalError::Disposition`] if a disposition cannot be changed.
/// A failed install is rolled back.
pub fn set_unix_signals(enable: bool) -> Result<SignalClass, SignalError> {
    let mut state = STATE.lock().map_err(|_| SignalError::Poisoned)?;
    if enable {
        crate::symbols::init();
        if let Err(e) = state.install() {
            let _ = state.restore();
            return Err(e);
        }
    } else {
        state.restore()?;
    }
    let classes = installed_classes();
    tracing::debug!(?classes, "signal router updated");
    Ok(classes)
}

/// Classes currently routed by this module.
pub fn installed_classes() -> SignalClass {
    SignalClass::from_bits_truncate(INSTALLED.load(Ordering::Acquire))
}

impl RouterState {
    fn install(&mut self) -> Result<(), SignalError> {
        for (index, route) in ROUTES.iter().enumerate() {
            if self.saved[index].is_some() {
                continue;
            }
            INSTALLED.fetch_or(route.class.bits(), Ordering::AcqRel);
            match swap_action(route.signal, &action_for(route.target)) {
                Ok(previous) => self.saved[index] = Some(previous),
                Err(e) => {
                    self.sync_installed();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn restore(&mut self) -> Result<(), SignalError> {
        let mut first_error = None;
        for (slot, route) in self.saved.iter_mut().zip(ROUTES.iter()) {
            let Some(previous) = *slot else { continue };
            INSTALLED.fetch_and(!route.class.bits(), Ordering::AcqRel);
            match swap_action(route.signal, &previous) {
                Ok(_) => *slot = None,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        self.sync_installed();
        first_error.map_or(Ok(()), Err)
    }

    fn sync_installed(&self) {
        let classes = self
            .saved
            .iter()
            .zip(ROUTES.iter())
            .filter(|(slot, _)| slot.is_some())
            .fold(SignalClass::empty(), |acc, (_, route)| acc | route.class);
        INSTALLED.store(classes.bits(), Ordering::Release);
    }
}

fn action_for(target: Target) -> libc::sigaction {
    // SAFETY: an all-zero sigaction is a valid value.
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = match target {
        Target::Handler(handler) => handler as libc::sighandler_t,
        Target::Ignore => libc::SIG_IGN,
    };
    action.sa_flags = libc::SA_RESTART;
    // SAFETY: `sa_mask` is a valid sigset_t.
    unsafe { libc::sigemptyset(&mut action.sa_mask) };
    action
}

fn swap_action(signal: Signal, action: &libc::sigaction) -> Result<libc::sigaction, SignalError> {
    let mut previous = MaybeUninit::<libc::sigaction>::zeroed();
    // SAFETY: both pointers are valid for the duration of the call.
    let rc = unsafe { libc::sigaction(signal as c_int, action, previous.as_mut_ptr()) };
    Errno::result(rc).map_err(|source| SignalError::Disposition { signal, source })?;
    // SAFETY: sigaction filled `previous` on success.
    Ok(unsafe { previous.assume_init() })
}

/// Put the handler back for `signal` if its class is still installed.
fn rearm(signal: Signal) {
    let Some(route) = route_for(signal) else {
        return;
    };
    if INSTALLED.load(Ordering::Acquire) & route.class.bits() == 0 {
        return;
    }
    let _ = swap_action(signal, &action_for(route.target));
}

/// Unblock `signal` on this thread. Needed when a handler does not return.
fn unblock(signal: Signal) {
    let mut set = SigSet::empty();
    set.add(signal);
    let _ = set.thread_unblock();
}

/// No hooks registered: restore the default action and deliver again.
fn fall_through(signo: c_int) {
    // SAFETY: async-signal-safe calls with a valid signal number.
    unsafe {
        libc::signal(signo, libc::SIG_DFL);
        libc::raise(signo);
    }
}

/// Restores `errno` on drop.
struct SavedErrno(i32);

impl SavedErrno {
    fn save() -> Self {
        Self(Errno::last_raw())
    }
}

impl Drop for SavedErrno {
    fn drop(&mut self) {
        Errno::set_raw(self.0);
    }
}

thread_local! {
    static TERMINATING: Cell<u32> = const { Cell::new(0) };
}

/// Marks the current thread as inside the terminate handler until dropped.
struct Terminating;

impl Terminating {
    fn enter() -> Self {
        TERMINATING.with(|depth| depth.set(depth.get() + 1));
        Terminating
    }

    fn active() -> bool {
        TERMINATING.with(Cell::get) > 0
    }
}

impl Drop for Terminating {
    fn drop(&mut self) {
        TERMINATING.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

// ─── Handler Logic ──────────────────────────────────────────────────

fn hangup(ctx: &HandlerContext<'_>) {
    if !ctx.resync_paused() {
        ctx.persist_world();
    }
    ctx.set_exit_flag(libc::SIGHUP);
}

fn terminate(ctx: &HandlerContext<'_>, signal: Signal) -> ! {
    let _terminating = Terminating::enter();
    ctx.event(Severity::Fatal, format_args!("Server Unstable: {}", describe(signal)));
    rearm(signal);
    unblock(signal);
    ctx.set_exit_flag(libc::SIGABRT);
    ctx.end_thread(signal as c_int)
}

fn interrupt(ctx: &HandlerContext<'_>, signal: Signal) {
    if ctx.secure_mode() {
        ctx.event(Severity::Fatal, format_args!("Secure Mode prevents CTRL+C"));
        rearm(signal);
        unblock(signal);
        return;
    }
    ctx.set_exit_flag(libc::SIGINT);
}

fn fault(ctx: &HandlerContext<'_>, signal: Signal) -> ServerError {
    ctx.event(Severity::Fatal, format_args!("{}", describe(signal)));
    #[cfg(feature = "callstack")]
    ctx.event_text(
        Severity::Error,
        &format!("Call stack:\n{}", std::backtrace::Backtrace::force_capture()),
    );
    rearm(signal);
    unblock(signal);
    SignalFault::new(signal).translate(ctx)
}

/// Reap every terminated child without blocking.
pub fn reap_children() -> usize {
    let mut reaped = 0;
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => return reaped,
            Ok(_) => reaped += 1,
        }
    }
}

// ─── Entry Points ───────────────────────────────────────────────────

fn resolve(signo: c_int) -> Option<(HandlerContext<'static>, Signal)> {
    Some((HandlerContext::active()?, Signal::try_from(signo).ok()?))
}

extern "C-unwind" fn on_hangup(signo: c_int) {
    let _errno = SavedErrno::save();
    match resolve(signo) {
        Some((ctx, _)) => hangup(&ctx),
        None => fall_through(signo),
    }
}

extern "C-unwind" fn on_terminate(signo: c_int) {
    let _errno = SavedErrno::save();
    match resolve(signo) {
        Some((_, Signal::SIGABRT)) if Terminating::active() => fall_through(signo),
        Some((ctx, signal)) => terminate(&ctx, signal),
        None => fall_through(signo),
    }
}

extern "C-unwind" fn on_interrupt(signo: c_int) {
    let _errno = SavedErrno::save();
    match resolve(signo) {
        Some((ctx, signal)) => interrupt(&ctx, signal),
        None => fall_through(signo),
    }
}

extern "C-unwind" fn on_fault(signo: c_int) {
    let _errno = SavedErrno::save();
    let Some((ctx, signal)) = resolve(signo) else {
        return fall_through(signo);
    };
    let error = {
        let _guard = FaultGuard::enter(Some(&ctx), signo as u32);
        fault(&ctx, signal)
    };
    raise(error)
}

extern "C-unwind" fn on_child(_signo: c_int) {
    let _errno = SavedErrno::save();
    reap_children();
}

/// Error value carried by a fault signal.
pub fn signal_error(signal: Signal) -> ErrorValue {
    ErrorValue::new(Severity::Fatal, signal as i32 as u32, describe(signal))
}
