//! Collaborators registered with the fault subsystem.
//!
//! [`ServerState`] is leaked at startup so it can be registered as
//! `&'static dyn ServerHooks`. Handlers call into it from whichever thread
//! received the fault or signal.

use crate::world::World;
use sphere_fault::config::FaultConfig;
use sphere_fault::error::ErrorValue;
use sphere_fault::hooks::{
    CrashDump, CrashDumpError, EventLog, ExitFlag, FaultContext, ServerHooks, ServerMode,
    SymbolBase, WorldPersistence,
};
use sphere_fault::Severity;
use std::backtrace::Backtrace;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use tracing::{error, info};

/// Exit reason stored when the tick loop stops on a fatal error.
pub const EXIT_REASON_FATAL: i32 = -1;

/// Raised by [`ServerState::end_thread`] to unwind the signal thread.
pub const THREAD_ENDED: ErrorValue = ErrorValue::new(Severity::Event, 0, "thread ended by signal");

/// Shared server state and the hooks implementation.
#[derive(Debug)]
pub struct ServerState {
    world: World,
    faults: FaultConfig,
    /// 0 = keep running; otherwise the reason (signal number or `EXIT_REASON_FATAL`).
    exit_reason: AtomicI32,
    resync_paused: AtomicBool,
    secure_mode: AtomicBool,
    crash_reports: AtomicU32,
}

impl ServerState {
    /// Build the state. `secure_mode` comes from config or the command line.
    pub fn new(world: World, faults: FaultConfig) -> Self {
        let secure_mode = faults.secure_mode;
        Self {
            world,
            faults,
            exit_reason: AtomicI32::new(0),
            resync_paused: AtomicBool::new(false),
            secure_mode: AtomicBool::new(secure_mode),
            crash_reports: AtomicU32::new(0),
        }
    }

    /// The world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Exit reason, if shutdown was requested.
    pub fn exit_reason(&self) -> Option<i32> {
        match self.exit_reason.load(Ordering::Acquire) {
            0 => None,
            reason => Some(reason),
        }
    }

    /// Pause or resume world resynchronisation.
    pub fn set_resync_paused(&self, paused: bool) {
        self.resync_paused.store(paused, Ordering::Release);
    }

    /// Switch secure mode.
    pub fn set_secure_mode(&self, secure: bool) {
        self.secure_mode.store(secure, Ordering::Release);
    }

    /// Crash reports written so far.
    pub fn crash_reports(&self) -> u32 {
        self.crash_reports.load(Ordering::Acquire)
    }

    /// Write a crash report headed by `summary`. Returns the report path.
    pub fn write_crash_report(&self, summary: &str) -> Result<PathBuf, CrashDumpError> {
        let Some(dir) = self.faults.crash_dump_dir.as_ref() else {
            return Err(CrashDumpError::Unavailable);
        };
        fs::create_dir_all(dir)?;

        let sequence = self.crash_reports.fetch_add(1, Ordering::AcqRel) + 1;
        let path = dir.join(format!("crash-{}-{sequence}.txt", std::process::id()));

        let mut report = String::new();
        let _ = writeln!(report, "{summary}");
        let _ = writeln!(report, "tick: {}", self.world.tick());
        let _ = writeln!(report, "code base: 0x{:x}", self.code_base());
        if self.faults.stack_traces {
            let _ = writeln!(report, "\n{}", Backtrace::force_capture());
        }
        fs::write(&path, report)?;
        Ok(path)
    }
}

impl EventLog for ServerState {}

impl WorldPersistence for ServerState {
    fn save(&self, forced: bool) {
        if let Err(e) = self.world.save(forced) {
            error!("World save failed: {}", e);
        }
    }
}

impl ExitFlag for ServerState {
    fn set_exit_flag(&self, reason: i32) {
        self.exit_reason.store(reason, Ordering::Release);
    }
}

impl ServerMode for ServerState {
    fn is_resync_paused(&self) -> bool {
        self.resync_paused.load(Ordering::Acquire)
    }

    fn is_secure_mode(&self) -> bool {
        self.secure_mode.load(Ordering::Acquire)
    }
}

impl CrashDump for ServerState {
    fn is_enabled(&self) -> bool {
        self.faults.crash_dumps
    }

    fn start_crash_dump(
        &self,
        process_id: u32,
        thread_id: u64,
        context: FaultContext,
    ) -> Result<(), CrashDumpError> {
        let summary = format!(
            "fault in process {process_id}, thread {thread_id}, context {:p}",
            context.as_ptr()
        );
        let path = self.write_crash_report(&summary)?;
        info!("Crash report written to {:?}", path);
        Ok(())
    }
}

impl SymbolBase for ServerState {}

impl ServerHooks for ServerState {
    /// On the signal thread, unwind to its fault boundary so only that thread
    /// ends. Anywhere else, take the default action of `signal`.
    fn end_thread(&self, signal: i32) -> ! {
        if on_signal_thread() {
            sphere_fault::propagate::raise(THREAD_ENDED.into());
        }
        sphere_fault::hooks::end_current_thread(signal)
    }
}

#[cfg(unix)]
fn on_signal_thread() -> bool {
    crate::signal_thread::on_signal_thread()
}

#[cfg(not(unix))]
fn on_signal_thread() -> bool {
    false
}
