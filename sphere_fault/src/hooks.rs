//! # Collaborator Traits
//!
//! The fault subsystem does not own logging, world persistence, the exit
//! flag or crash-dump capture. It calls into them through these traits,
//! which the server implements once and registers with
//! [`registry::install_hooks`](crate::registry::install_hooks).
//!
//! Every method may be called from a fault or signal handler, on whichever
//! thread received the fault, while other threads keep running.

use crate::severity::Severity;
use std::ffi::c_void;
use thiserror::Error;

/// Tracing target used for lines logged from handlers.
pub const FAULT_LOG_TARGET: &str = "sphere::fault";

/// Severity-tagged log sink.
pub trait EventLog {
    /// Append one line. The return value of the sink is never consulted.
    fn log(&self, severity: Severity, line: &str) {
        log_to_tracing(severity, line);
    }
}

/// World-state persistence.
pub trait WorldPersistence {
    /// Save the world, blocking until done. `forced` skips any "nothing
    /// changed" shortcut.
    fn save(&self, forced: bool);
}

/// Process-wide exit flag read by the main loop.
pub trait ExitFlag {
    /// Request shutdown with `reason` (a signal number).
    fn set_exit_flag(&self, reason: i32);
}

/// Operating mode queried by the signal handlers.
pub trait ServerMode {
    /// World resynchronisation is paused; saving now would persist a stale world.
    fn is_resync_paused(&self) -> bool;

    /// Locked-down mode: Ctrl-C does not stop the server.
    fn is_secure_mode(&self) -> bool;
}

/// Crash-dump capture failure. Never propagated past the translator.
#[derive(Debug, Error)]
pub enum CrashDumpError {
    /// No crash-dump writer is available on this build.
    #[error("crash dump capture is not available")]
    Unavailable,

    /// Writing the dump failed.
    #[error("crash dump I/O error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Opaque pointer to the platform's fault context record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultContext {
    record: *const c_void,
}

impl FaultContext {
    /// Wrap a raw context record.
    pub const fn new(record: *const c_void) -> Self {
        Self { record }
    }

    /// A context with no record attached.
    pub const fn empty() -> Self {
        Self {
            record: std::ptr::null(),
        }
    }

    /// Raw record pointer (may be null).
    pub const fn as_ptr(&self) -> *const c_void {
        self.record
    }

    /// Returns true if no record is attached.
    pub fn is_empty(&self) -> bool {
        self.record.is_null()
    }
}

/// Crash-dump capture.
pub trait CrashDump {
    /// Crash dumps are switched on.
    fn is_enabled(&self) -> bool {
        false
    }

    /// Capture a dump of `process_id`/`thread_id` at the fault described by `context`.
    fn start_crash_dump(
        &self,
        process_id: u32,
        thread_id: u64,
        context: FaultContext,
    ) -> Result<(), CrashDumpError> {
        let _ = (process_id, thread_id, context);
        Err(CrashDumpError::Unavailable)
    }
}

/// Loaded code-segment base of the program.
pub trait SymbolBase {
    /// Base address subtracted from faulting addresses so they match the link map.
    fn code_base(&self) -> usize {
        crate::symbols::image_base()
    }
}

/// Everything a fault or signal handler may call into.
pub trait ServerHooks:
    EventLog + WorldPersistence + ExitFlag + ServerMode + CrashDump + SymbolBase + Sync
{
    /// End the calling thread after `signal` was handled. Used by the
    /// terminate handler once the exit flag is set.
    ///
    /// The default is [`end_current_thread`], which ends the process. Override
    /// it to unwind to a loop that checks the exit flag.
    fn end_thread(&self, signal: i32) -> ! {
        end_current_thread(signal)
    }
}

/// Forward a line to `tracing` at the level mapped from `severity`.
pub fn log_to_tracing(severity: Severity, line: &str) {
    match severity {
        Severity::Fatal | Severity::Critical | Severity::Error => {
            tracing::error!(target: FAULT_LOG_TARGET, severity = severity.name(), "{line}")
        }
        Severity::Warn => tracing::warn!(target: FAULT_LOG_TARGET, "{line}"),
        Severity::Event => tracing::info!(target: FAULT_LOG_TARGET, "{line}"),
        Severity::Trace => tracing::trace!(target: FAULT_LOG_TARGET, "{line}"),
    }
}

/// Deliver `signal` with its default action, ending the process.
///
/// A thread cannot be ended from under Rust frames without unwinding them,
/// so the whole process goes instead. If the default action of `signal` does
/// not terminate, the process exits with status `128 + signal`.
#[cfg(unix)]
pub fn end_current_thread(signal: i32) -> ! {
    // SAFETY: async-signal-safe calls; `set` is initialised by sigemptyset.
    unsafe {
        libc::signal(signal, libc::SIG_DFL);
        let mut set = std::mem::MaybeUninit::<libc::sigset_t>::uninit();
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), signal);
        libc::pthread_sigmask(libc::SIG_UNBLOCK, set.as_ptr(), std::ptr::null_mut());
        libc::raise(signal);
        libc::_exit(128 + signal)
    }
}

/// Terminate the calling thread without returning.
#[cfg(windows)]
pub fn end_current_thread(_signal: i32) -> ! {
    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn ExitThread(exit_code: u32) -> !;
    }
    // SAFETY: called from handler frames that hold no values with destructors.
    unsafe { ExitThread(0) }
}
