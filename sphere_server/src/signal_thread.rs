//! Dedicated thread for process-directed lifecycle signals.
//!
//! [`SignalThread::spawn`] blocks [`LIFECYCLE_SIGNALS`] on the calling thread
//! (and every thread it spawns later) and starts one thread that leaves them
//! unblocked, so the kernel delivers them there. The terminate handler ends
//! the thread it runs on; with this thread in place that is never the world
//! loop, which instead sees the exit flag and shuts down.

use crate::error::HostError;
use nix::sys::signal::{SigSet, Signal};
use sphere_fault::propagate::catch_fault;
use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name of the signal thread.
pub const SIGNAL_THREAD_NAME: &str = "signals";

/// Signals routed to the signal thread.
pub const LIFECYCLE_SIGNALS: [Signal; 5] = [
    Signal::SIGHUP,
    Signal::SIGTERM,
    Signal::SIGQUIT,
    Signal::SIGINT,
    Signal::SIGCHLD,
];

const POLL_INTERVAL: Duration = Duration::from_millis(50);

unsafe extern "C-unwind" {
    /// `nanosleep(2)`, declared so that a handler may unwind through it.
    #[link_name = "nanosleep"]
    fn sleep_interruptible(request: *const libc::timespec, remaining: *mut libc::timespec) -> c_int;
}

fn lifecycle_set() -> SigSet {
    let mut set = SigSet::empty();
    for signal in LIFECYCLE_SIGNALS {
        set.add(signal);
    }
    set
}

/// Returns true if the calling thread is the signal thread.
pub fn on_signal_thread() -> bool {
    thread::current().name() == Some(SIGNAL_THREAD_NAME)
}

/// Handle to the running signal thread. Stops it on drop.
#[derive(Debug)]
pub struct SignalThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SignalThread {
    /// Block the lifecycle signals on the calling thread and start the thread
    /// that receives them.
    pub fn spawn() -> Result<Self, HostError> {
        lifecycle_set().thread_block()?;

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(SIGNAL_THREAD_NAME.to_string())
            .spawn(move || wait_for_signals(&flag))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// The thread is still waiting for signals.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the thread and wait for it.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Signal thread panicked");
            }
        }
    }
}

impl Drop for SignalThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn wait_for_signals(stop: &AtomicBool) {
    let request = libc::timespec {
        tv_sec: 0,
        tv_nsec: POLL_INTERVAL.subsec_nanos() as libc::c_long,
    };
    debug!("Signal thread waiting");

    let ended = catch_fault(|| {
        lifecycle_set().thread_unblock()?;
        while !stop.load(Ordering::Acquire) {
            // SAFETY: `request` is valid; a handler may unwind out of the call.
            unsafe { sleep_interruptible(&request, std::ptr::null_mut()) };
        }
        Ok::<(), nix::Error>(())
    });

    match ended {
        Ok(Ok(())) => debug!("Signal thread stopped"),
        Ok(Err(e)) => warn!("Signal thread could not unblock lifecycle signals: {}", e),
        Err(e) => info!("Signal thread ended: {}", e),
    }
}
