//! Configuration Loader
//!
//! Environment-aware loading with the `config` crate. Sources are layered,
//! later ones winning:
//!
//! 1. built-in defaults
//! 2. `fleet.toml` in the config directory (or the file in `FLEET_CONFIG_PATH`)
//! 3. `fleet.{environment}.toml` in the config directory
//! 4. `FLEET__SECTION__KEY` environment variables
//!
//! File sources are optional.

use super::FleetConfig;
use crate::error::OrchestrationResult;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const BASE_FILE: &str = "fleet";

/// Loaded configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: FleetConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> OrchestrationResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> OrchestrationResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> OrchestrationResult<Arc<ConfigManager>> {
        let explicit_dir = config_dir.is_some();
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        // FLEET_CONFIG_PATH only replaces the base file of the default directory
        let base_file = env::var("FLEET_CONFIG_PATH")
            .ok()
            .filter(|_| !explicit_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| config_directory.join(format!("{BASE_FILE}.toml")));
        let env_file = config_directory.join(format!("{BASE_FILE}.{environment}.toml"));

        debug!(
            environment = %environment,
            base_file = %base_file.display(),
            env_file = %env_file.display(),
            "Loading fleet configuration"
        );

        let config: FleetConfig = Config::builder()
            .add_source(Self::optional_file(&base_file))
            .add_source(Self::optional_file(&env_file))
            .add_source(
                Environment::with_prefix("FLEET")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;

        debug!(config = %Self::sanitize_for_logging(&config), "Configuration loaded successfully");

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with credentials masked
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_for_logging(&self.config)
    }

    fn optional_file(path: &Path) -> File<config::FileSourceFile, FileFormat> {
        File::from(path.to_path_buf())
            .format(FileFormat::Toml)
            .required(false)
    }

    fn sanitize_for_logging(config: &FleetConfig) -> serde_json::Value {
        let mut sanitized = config.clone();
        if !sanitized.staging.password.is_empty() {
            sanitized.staging.password = "***REDACTED***".to_string();
        }
        serde_json::to_value(sanitized).unwrap_or_default()
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("FLEET_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
