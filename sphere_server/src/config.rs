//! Server configuration.
//!
//! ```toml
//! [shared]
//! service_name = "sphere-01"
//!
//! [faults]
//! secure_mode = true
//!
//! [world]
//! save_path = "world.json"
//! tick_ms = 250
//! save_every_ticks = 240
//! ```

use serde::Deserialize;
use sphere_fault::config::{ConfigError, ConfigLoader, FaultConfig, SharedConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// World loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World snapshot file.
    pub save_path: PathBuf,
    /// Tick period in milliseconds.
    pub tick_ms: u64,
    /// Periodic save interval in ticks (0 disables periodic saves).
    pub save_every_ticks: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("world.json"),
            tick_ms: 250,
            save_every_ticks: 240,
        }
    }
}

impl WorldConfig {
    /// Tick period.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Service name and log level.
    pub shared: SharedConfig,
    /// Fault-handling switches.
    #[serde(default)]
    pub faults: FaultConfig,
    /// World loop settings.
    #[serde(default)]
    pub world: WorldConfig,
}

impl ServerConfig {
    /// Load and validate `path`.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.faults.validate()?;
        if self.world.tick_ms == 0 {
            return Err(ConfigError::ValidationError(
                "world.tick_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn sample_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/server.toml");
        let config = ServerConfig::load_validated(&path).unwrap();
        assert_eq!(config.shared.service_name, "sphere-01");
        assert!(config.faults.crash_dumps);
        assert_eq!(config.world.tick_period(), Duration::from_millis(250));
    }

    #[test]
    fn world_section_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[shared]\nservice_name = \"sphere-test\"\n").unwrap();
        file.flush().unwrap();

        let config = ServerConfig::load_validated(file.path()).unwrap();
        assert_eq!(config.world.save_path, PathBuf::from("world.json"));
        assert_eq!(config.world.save_every_ticks, 240);
        assert!(!config.faults.secure_mode);
    }

    #[test]
    fn zero_tick_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "[shared]\nservice_name = \"sphere-test\"\n\n[world]\ntick_ms = 0\n"
        )
        .unwrap();
        file.flush().unwrap();

        let result = ServerConfig::load_validated(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
