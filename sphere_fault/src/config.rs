//! Configuration loading traits and types.
//!
//! A standard way to load TOML configuration files for the server and its
//! fault handling.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sphere_fault::config::{ConfigError, ConfigLoader, FaultConfig, SharedConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct MyServerConfig {
//!     shared: SharedConfig,
//!     #[serde(default)]
//!     faults: FaultConfig,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = MyServerConfig::load(Path::new("server.toml"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "sphere-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Server instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fault-handling switches.
///
/// # TOML Example
///
/// ```toml
/// [faults]
/// secure_mode = true
/// crash_dumps = true
/// crash_dump_dir = "crash"
/// stack_traces = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FaultConfig {
    /// Ctrl-C does not stop the server.
    pub secure_mode: bool,

    /// Write a crash report when a platform fault is translated.
    pub crash_dumps: bool,

    /// Where crash reports go. Required when `crash_dumps` is set.
    pub crash_dump_dir: Option<PathBuf>,

    /// Include a backtrace in crash reports.
    pub stack_traces: bool,
}

impl FaultConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if crash dumps are enabled
    /// without a directory.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crash_dumps && self.crash_dump_dir.is_none() {
            return Err(ConfigError::ValidationError(
                "crash_dumps requires crash_dump_dir".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Implemented for every `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        shared: SharedConfig,
        #[serde(default)]
        faults: FaultConfig,
    }

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(tracing::Level::from(LogLevel::Warn), tracing::Level::WARN);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            level: LogLevel,
        }

        let cases = [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ];
        for (text, expected) in cases {
            let parsed: Wrapper = toml::from_str(&format!("level = \"{text}\"")).unwrap();
            assert_eq!(parsed.level, expected);
        }
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: String::new(),
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_fault_config_requires_dump_dir() {
        let mut faults = FaultConfig {
            crash_dumps: true,
            ..FaultConfig::default()
        };
        assert!(matches!(faults.validate(), Err(ConfigError::ValidationError(_))));

        faults.crash_dump_dir = Some(PathBuf::from("crash"));
        assert!(faults.validate().is_ok());
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = TestConfig::load(Path::new("/nonexistent/path/server.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_loader_success() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[shared]
log_level = "debug"
service_name = "sphere-test"

[faults]
secure_mode = true
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.shared.service_name, "sphere-test");
        assert!(config.faults.secure_mode);
        assert!(!config.faults.crash_dumps);
        assert_eq!(config.faults.crash_dump_dir, None);
    }

    #[test]
    fn test_faults_section_is_optional() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[shared]\nservice_name = \"sphere-test\"\n").unwrap();
        file.flush().unwrap();

        let config = TestConfig::load(file.path()).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Info);
        assert_eq!(config.faults, FaultConfig::default());
    }
}
