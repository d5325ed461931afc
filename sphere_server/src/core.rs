//! Server core: startup, tick loop and shutdown.
//!
//! Startup order matters: lifecycle signals are moved to the signal thread
//! and hooks are registered before any handler is installed. Shutdown removes
//! the handlers before stopping that thread and clearing the hooks.

use crate::config::ServerConfig;
use crate::error::HostError;
#[cfg(unix)]
use crate::signal_thread::SignalThread;
use crate::state::{ServerState, EXIT_REASON_FATAL};
use crate::world::World;
use sphere_fault::error::{ErrorMessage, ErrorText};
use sphere_fault::hooks::{log_to_tracing, CrashDump, ExitFlag, WorldPersistence};
use sphere_fault::propagate::catch_fault;
use sphere_fault::{registry, sphere_assert, symbols, translator, ServerError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How the tick loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit reason (signal number or `EXIT_REASON_FATAL`).
    pub reason: i32,
    /// Ticks executed by this run.
    pub ticks: u64,
}

impl RunOutcome {
    /// Process exit code: 0 for an orderly hangup or Ctrl-C, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.reason == libc::SIGHUP || self.reason == libc::SIGINT {
            0
        } else {
            1
        }
    }
}

/// Owns the loop around the shared [`ServerState`].
pub struct ServerCore {
    state: &'static ServerState,
    tick_period: Duration,
    save_every_ticks: u64,
    #[cfg(unix)]
    signal_thread: Option<SignalThread>,
}

impl ServerCore {
    /// Load the world and leak the shared state.
    pub fn new(config: &ServerConfig, secure_override: bool) -> Result<Self, HostError> {
        let world = World::load_or_new(&config.world.save_path)?;
        let mut faults = config.faults.clone();
        faults.secure_mode |= secure_override;

        let state: &'static ServerState = Box::leak(Box::new(ServerState::new(world, faults)));
        Ok(Self::with_state(
            state,
            config.world.tick_period(),
            config.world.save_every_ticks,
        ))
    }

    /// Build a core around existing state.
    pub fn with_state(state: &'static ServerState, tick_period: Duration, save_every_ticks: u64) -> Self {
        Self {
            state,
            tick_period,
            save_every_ticks,
            #[cfg(unix)]
            signal_thread: None,
        }
    }

    /// Shared state.
    pub fn state(&self) -> &'static ServerState {
        self.state
    }

    /// Start the signal thread, register hooks and install the translator
    /// and signal router.
    ///
    /// Lifecycle signals stay blocked on the calling thread and on threads it
    /// spawns afterwards.
    pub fn start(&mut self) -> Result<(), HostError> {
        #[cfg(unix)]
        {
            if self.signal_thread.is_none() {
                self.signal_thread = Some(SignalThread::spawn()?);
            }
        }

        let base = symbols::init();
        debug!("Image base 0x{:x}", base);

        registry::install_hooks(self.state);
        let translating = translator::set_exception_translator(true)?;
        info!("Structured-fault translator active: {}", translating);

        #[cfg(unix)]
        {
            let classes = sphere_fault::signals::set_unix_signals(true)?;
            info!("Signal router installed: {:?}", classes);
        }
        Ok(())
    }

    /// Run ticks until an exit is requested.
    pub fn run(&self) -> RunOutcome {
        info!("Starting world loop (tick={}ms)", self.tick_period.as_millis());
        let mut ticks = 0;

        let reason = loop {
            if let Some(reason) = self.state.exit_reason() {
                break reason;
            }

            let tick_start = Instant::now();
            match self.step() {
                Ok(_) => ticks += 1,
                Err(e) => self.handle_error(&e),
            }

            let elapsed = tick_start.elapsed();
            if elapsed < self.tick_period {
                std::thread::sleep(self.tick_period - elapsed);
            }
        };

        info!("World loop stopped after {} ticks (reason {})", ticks, reason);
        RunOutcome { reason, ticks }
    }

    /// Execute one tick, catching any raised error.
    pub fn step(&self) -> Result<u64, ServerError> {
        catch_fault(|| self.tick())
    }

    fn tick(&self) -> u64 {
        let world = self.state.world();
        let before = world.tick();
        let now = world.advance();
        sphere_assert!(now > before);

        if self.save_every_ticks > 0 && now % self.save_every_ticks == 0 {
            self.state.save(false);
        }
        now
    }

    /// Log a caught error; fatal errors stop the loop.
    pub fn handle_error(&self, error: &ServerError) {
        let mut text = ErrorText::new();
        if error.render(&mut text).is_err() {
            warn!("Error message did not fit, code {}", error.code());
        }
        log_to_tracing(error.severity(), &text);

        if !error.is_fatal() {
            return;
        }
        if self.state.is_enabled() {
            match self.state.write_crash_report(&text) {
                Ok(path) => info!("Crash report written to {:?}", path),
                Err(e) => warn!("Crash report failed: {}", e),
            }
        }
        self.state.set_exit_flag(EXIT_REASON_FATAL);
    }

    /// Remove handlers, stop the signal thread, clear hooks and save the world.
    pub fn shutdown(&mut self) -> Result<(), HostError> {
        #[cfg(unix)]
        {
            sphere_fault::signals::set_unix_signals(false)?;
            if let Some(mut signals) = self.signal_thread.take() {
                signals.stop();
            }
        }
        translator::set_exception_translator(false)?;
        registry::clear_hooks();

        self.state.world().save(true)?;
        info!("World saved at tick {}", self.state.world().tick());
        Ok(())
    }
}
