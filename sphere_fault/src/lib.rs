//! Sphere Fault Library
//!
//! Turns low-level runtime faults into structured, severity-classified error
//! values the rest of the server can log, render and act on.
//!
//! # Module Structure
//!
//! - [`severity`] - Ordered error/log severity
//! - [`error`] - Error values, assertion and platform-fault errors, [`ServerError`]
//! - [`propagate`] - Raising errors across the fault boundary and catching them again
//! - [`hooks`] - Collaborator traits (logging, persistence, exit flag, crash dumps)
//! - [`context`] - Capability-restricted context handed to fault/signal handlers
//! - [`registry`] - Process-wide registration of the active hooks
//! - [`translator`] - Structured-fault translation (native exceptions)
//! - [`signals`] - Shutdown signal router (POSIX signals)
//! - [`config`] - Configuration loading traits and types
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust,no_run
//! use sphere_fault::prelude::*;
//!
//! fn start(hooks: &'static dyn ServerHooks) -> Result<(), Box<dyn std::error::Error>> {
//!     sphere_fault::registry::install_hooks(hooks);
//!     sphere_fault::translator::set_exception_translator(true)?;
//!     #[cfg(unix)]
//!     sphere_fault::signals::set_unix_signals(true)?;
//!
//!     let outcome = catch_fault(|| {
//!         // server tick
//!     });
//!     if let Err(e) = outcome {
//!         let mut text = ErrorText::new();
//!         if e.render(&mut text).is_ok() {
//!             tracing::error!("{}", text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod consts;
pub mod context;
pub mod error;
pub mod hooks;
pub mod prelude;
pub mod propagate;
pub mod registry;
pub mod severity;
#[cfg(unix)]
pub mod signals;
pub mod symbols;
pub mod translator;

pub use error::ServerError;
pub use severity::Severity;
