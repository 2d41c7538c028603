//! Configuration Loader
//!
//! Environment-aware loading: compiled defaults, then `tower.toml`, then
//! `tower.<env>.toml`, then `TOWER__SECTION__KEY` environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::TowerConfig;
use crate::constants::{CONFIG_BASENAME, ENV_PREFIX};
use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: TowerConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_overrides(config_dir, environment, None)
    }

    /// Same as [`Self::load_from_directory_with_env`] with the environment
    /// variable source replaced by `overrides` when given
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::build(&config_directory, environment, overrides)?;
        config.validate()?;

        info!(
            environment = %environment,
            comms_timeout_ms = config.timing.comms_timeout_ms,
            landing_wait_ms = config.timing.landing_wait_ms,
            half_margin_ms = config.timing.half_margin_ms,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already built configuration
    pub fn from_config(config: TowerConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &TowerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    fn build(
        directory: &Path,
        environment: &str,
        overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<TowerConfig> {
        let load_error = |e: config::ConfigError| ConfigurationError::load_error(environment, e);

        let defaults = Config::try_from(&TowerConfig::default()).map_err(load_error)?;
        let base = directory.join(format!("{CONFIG_BASENAME}.toml"));
        let overlay = directory.join(format!("{CONFIG_BASENAME}.{environment}.toml"));

        Config::builder()
            .add_source(defaults)
            .add_source(File::new(&base.to_string_lossy(), FileFormat::Toml).required(false))
            .add_source(File::new(&overlay.to_string_lossy(), FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(overrides),
            )
            .build()
            .map_err(load_error)?
            .try_deserialize::<TowerConfig>()
            .map_err(load_error)
    }

    /// Detect the current environment
    pub fn detect_environment() -> String {
        env::var("TOWER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_files() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::load_with_overrides(
            Some(dir.path().to_path_buf()),
            "test",
            Some(HashMap::new()),
        )
        .unwrap();
        assert_eq!(manager.config(), &TowerConfig::default());
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_environment_file_overrides_base() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("tower.toml"),
            "[timing]\nlanding_wait_ms = 20000\nhalf_margin_ms = 5000\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("tower.test.toml"),
            "[timing]\nlanding_wait_ms = 1000\n",
        )
        .unwrap();

        let manager = ConfigManager::load_with_overrides(
            Some(dir.path().to_path_buf()),
            "test",
            Some(HashMap::new()),
        )
        .unwrap();
        let timing = manager.config().timing;
        assert_eq!(timing.landing_wait_ms, 1000);
        assert_eq!(timing.half_margin_ms, 5000);
        assert_eq!(timing.comms_timeout_ms, 10_000);
    }

    #[test]
    fn test_environment_variables_win() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tower.toml"), "[events]\ncapacity = 50\n").unwrap();
        let overrides = HashMap::from([
            ("TOWER__EVENTS__CAPACITY".to_string(), "75".to_string()),
            ("TOWER__LOGGING__PS_LOG_DIR".to_string(), "/tmp/ps".to_string()),
        ]);

        let manager = ConfigManager::load_with_overrides(
            Some(dir.path().to_path_buf()),
            "test",
            Some(overrides),
        )
        .unwrap();
        assert_eq!(manager.config().events.capacity, 75);
        assert_eq!(
            manager.config().logging.ps_log_dir,
            Some(PathBuf::from("/tmp/ps"))
        );
    }

    #[test]
    fn test_invalid_file_value_fails_validation() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tower.toml"), "[timing]\ncomms_timeout_ms = 0\n").unwrap();

        let result = ConfigManager::load_with_overrides(
            Some(dir.path().to_path_buf()),
            "test",
            Some(HashMap::new()),
        );
        assert!(matches!(result, Err(ConfigurationError::InvalidValue { .. })));
    }
}
