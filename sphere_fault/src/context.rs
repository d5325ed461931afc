//! Capability-restricted context handed to fault and signal handlers.
//!
//! A handler runs on a thread that was interrupted at an arbitrary point,
//! possibly with corrupted state. [`HandlerContext`] is the only door from a
//! handler to the rest of the server and exposes just the vetted
//! operations: log a pre-sized line, persist the world, flip the exit flag,
//! query the operating mode, start a crash dump, end the thread.
//!
//! Contexts are built only inside this crate.

use crate::consts::LOG_LINE_CAPACITY;
use crate::hooks::{CrashDumpError, FaultContext, ServerHooks};
use crate::registry;
use crate::severity::Severity;
use std::fmt::{self, Write};

/// Pre-sized log line.
pub type LogLine = heapless::String<LOG_LINE_CAPACITY>;

/// View of the collaborators available inside a handler.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    hooks: &'a dyn ServerHooks,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(hooks: &'a dyn ServerHooks) -> Self {
        Self { hooks }
    }

    /// Context for the registered hooks, if any.
    pub(crate) fn active() -> Option<HandlerContext<'static>> {
        registry::active_hooks().map(HandlerContext::new)
    }

    /// Log a formatted line. Text beyond `LOG_LINE_CAPACITY` is dropped.
    pub fn event(&self, severity: Severity, args: fmt::Arguments<'_>) {
        let mut line = LogLine::new();
        let _ = line.write_fmt(args);
        self.hooks.log(severity, &line);
    }

    /// Log a line that was formatted elsewhere (unbounded).
    #[cfg(feature = "callstack")]
    pub(crate) fn event_text(&self, severity: Severity, text: &str) {
        self.hooks.log(severity, text);
    }

    /// Blocking, forced world save.
    pub fn persist_world(&self) {
        self.hooks.save(true);
    }

    /// Request shutdown with `reason`.
    pub fn set_exit_flag(&self, reason: i32) {
        self.hooks.set_exit_flag(reason);
    }

    /// World resync is paused.
    pub fn resync_paused(&self) -> bool {
        self.hooks.is_resync_paused()
    }

    /// Secure (locked-down) mode is active.
    pub fn secure_mode(&self) -> bool {
        self.hooks.is_secure_mode()
    }

    /// Crash dumps are switched on.
    pub fn crash_dump_enabled(&self) -> bool {
        self.hooks.is_enabled()
    }

    /// Start a crash dump.
    pub fn start_crash_dump(
        &self,
        process_id: u32,
        thread_id: u64,
        context: FaultContext,
    ) -> Result<(), CrashDumpError> {
        self.hooks.start_crash_dump(process_id, thread_id, context)
    }

    /// Code-segment base for address normalization.
    pub fn code_base(&self) -> usize {
        self.hooks.code_base()
    }

    /// End the calling thread after `signal`.
    pub fn end_thread(&self, signal: i32) -> ! {
        self.hooks.end_thread(signal)
    }
}

impl fmt::Debug for HandlerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testing::RecordingHooks;
    use std::sync::atomic::Ordering;

    #[test]
    fn event_formats_into_bounded_line() {
        let hooks = RecordingHooks::default();
        let ctx = HandlerContext::new(&hooks);
        ctx.event(Severity::Fatal, format_args!("Server Unstable: {}", "Terminated"));

        let lines = hooks.lines();
        assert_eq!(lines, vec![(Severity::Fatal, "Server Unstable: Terminated".to_string())]);
    }

    #[test]
    fn oversized_event_is_cut() {
        let hooks = RecordingHooks::default();
        let ctx = HandlerContext::new(&hooks);
        let long = "y".repeat(LOG_LINE_CAPACITY * 2);
        ctx.event(Severity::Warn, format_args!("{}", long));
        ctx.event(Severity::Warn, format_args!("head {}", long));

        let lines = hooks.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|(_, l)| l.len() <= LOG_LINE_CAPACITY));
        assert_eq!(lines[1].1, "head ");
    }

    #[test]
    fn forwards_to_collaborators() {
        let hooks = RecordingHooks::with_base(0x40_0000);
        hooks.secure.store(true, Ordering::SeqCst);
        let ctx = HandlerContext::new(&hooks);

        ctx.persist_world();
        ctx.set_exit_flag(1);

        assert_eq!(hooks.saves.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.exit_reason.load(Ordering::SeqCst), 1);
        assert!(ctx.secure_mode());
        assert!(!ctx.resync_paused());
        assert!(!ctx.crash_dump_enabled());
        assert_eq!(ctx.code_base(), 0x40_0000);
    }
}
