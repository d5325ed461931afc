//! Host error type.

use sphere_fault::config::ConfigError;
use sphere_fault::translator::TranslatorError;
use thiserror::Error;

/// Errors raised while starting, running or stopping the host.
#[derive(Debug, Error)]
pub enum HostError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// World file or crash report I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// World snapshot could not be encoded or decoded.
    #[error("world snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Structured-fault translator could not be switched.
    #[error("translator error: {0}")]
    Translator(#[from] TranslatorError),

    /// Signal router could not be switched.
    #[cfg(unix)]
    #[error("signal router error: {0}")]
    Signals(#[from] sphere_fault::signals::SignalError),

    /// Signal mask could not be changed.
    #[cfg(unix)]
    #[error("signal mask error: {0}")]
    SignalMask(#[from] nix::Error),
}
