//! Prelude module for common re-exports.
//!
//! ```rust
//! use sphere_fault::prelude::*;
//! ```

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{
    AssertionError, ErrorMessage, ErrorText, ErrorValue, FaultError, RenderError, ServerError,
};
pub use crate::severity::Severity;

// ─── Propagation ────────────────────────────────────────────────────
pub use crate::propagate::{catch_fault, raise};

// ─── Collaborators ──────────────────────────────────────────────────
pub use crate::hooks::{
    CrashDump, CrashDumpError, EventLog, ExitFlag, FaultContext, ServerHooks, ServerMode,
    SymbolBase, WorldPersistence,
};

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, FaultConfig, LogLevel, SharedConfig};

// ─── Handlers ───────────────────────────────────────────────────────
#[cfg(unix)]
pub use crate::signals::{SignalClass, SignalError};
pub use crate::translator::TranslatorError;
