//! # Sphere Server Binary
//!
//! Runs the world loop with fault translation and the shutdown signal router
//! installed.
//!
//! # Usage
//!
//! ```bash
//! # Run with the sample configuration
//! sphere_server --config config/server.toml
//!
//! # Secure mode (Ctrl-C is refused, SIGHUP saves and stops)
//! sphere_server --config config/server.toml --secure
//!
//! # Verbose JSON logging
//! sphere_server -c config/server.toml -v --json
//! ```

#![deny(warnings)]

use clap::Parser;
use sphere_fault::config::LogLevel;
use sphere_server::config::ServerConfig;
use sphere_server::ServerCore;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Sphere Server - world loop with structured fault handling
#[derive(Parser, Debug)]
#[command(name = "sphere_server")]
#[command(version)]
#[command(about = "Sphere world server with fault translation and signal routing")]
#[command(long_about = None)]
struct Args {
    /// Path to the server configuration file
    #[arg(short, long, default_value = "config/server.toml")]
    config: PathBuf,

    /// Refuse Ctrl-C regardless of the configuration
    #[arg(long)]
    secure: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("FATAL: {e}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match ServerConfig::load_validated(&args.config) {
        Ok(config) => config,
        Err(e) => {
            setup_tracing(&args, LogLevel::default());
            return Err(format!("loading {:?}: {e}", args.config).into());
        }
    };
    setup_tracing(&args, config.shared.log_level);

    info!(
        "Sphere server v{} starting as {:?}",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let mut core = ServerCore::new(&config, args.secure)?;
    core.start()?;

    let outcome = core.run();
    core.shutdown()?;

    info!("Sphere server shutdown complete (exit code {})", outcome.exit_code());
    Ok(outcome.exit_code())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::from(configured)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).compact().init();
    }
}
