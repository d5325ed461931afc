//! Sphere Server Host
//!
//! Runs the world tick loop with fault translation and signal routing in
//! place. Every tick executes under [`sphere_fault::propagate::catch_fault`];
//! a fatal error or a signal-driven exit request stops the loop, after which
//! handlers are uninstalled and the world is saved one last time.
//!
//! # Module Structure
//!
//! - [`config`] - Server configuration (`server.toml`)
//! - [`world`] - World state and JSON snapshots
//! - [`state`] - Collaborators registered with the fault subsystem
//! - `signal_thread` - Thread that receives lifecycle signals (Unix)
//! - [`core`] - Startup, tick loop and shutdown
//! - [`error`] - Host error type

pub mod config;
pub mod core;
pub mod error;
#[cfg(unix)]
pub mod signal_thread;
pub mod state;
pub mod world;

pub use crate::core::{RunOutcome, ServerCore};
pub use crate::error::HostError;
