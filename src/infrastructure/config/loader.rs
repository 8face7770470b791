//! Configuration loader with hierarchical merging.

use std::path::PathBuf;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid foreground_poll_ms: {0}. Must be at least 50")]
    InvalidPollInterval(u64),

    #[error("Invalid registry timeout: {0}s. Must be between 1 and 10")]
    InvalidRegistryTimeout(u64),

    #[error("Invalid clustering epsilon: {0}. Must be in (0, 2]")]
    InvalidEpsilon(f32),

    #[error("Invalid min_interactions: {0}. Must be at least 1")]
    InvalidMinInteractions(usize),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `.octant/config.yaml` (project config)
    /// 3. `.octant/local.yaml` (local overrides, optional)
    /// 4. Environment variables (`OCTANT_*` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".octant/config.yaml"))
            .merge(Yaml::file(".octant/local.yaml"))
            .merge(Env::prefixed("OCTANT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        if config.scheduler.foreground_poll_ms < 50 {
            return Err(ConfigError::InvalidPollInterval(
                config.scheduler.foreground_poll_ms,
            ));
        }

        if config.registry.request_timeout_secs == 0 || config.registry.request_timeout_secs > 10 {
            return Err(ConfigError::InvalidRegistryTimeout(
                config.registry.request_timeout_secs,
            ));
        }

        if config.clustering.epsilon <= 0.0 || config.clustering.epsilon > 2.0 {
            return Err(ConfigError::InvalidEpsilon(config.clustering.epsilon));
        }

        if config.clustering.min_interactions == 0 {
            return Err(ConfigError::InvalidMinInteractions(
                config.clustering.min_interactions,
            ));
        }

        Ok(())
    }

    /// Resolve the database file: the configured path, or the per-user
    /// default `<data_local_dir>/octant/core.db`.
    pub fn database_path(config: &Config) -> PathBuf {
        if !config.database.path.is_empty() {
            return PathBuf::from(&config.database.path);
        }
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("octant")
            .join("core.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "shout".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogLevel(_)
        ));
    }

    #[test]
    fn invalid_log_format_is_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn registry_timeout_over_budget_is_rejected() {
        let mut config = Config::default();
        config.registry.request_timeout_secs = 30;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidRegistryTimeout(30)
        ));
    }

    #[test]
    fn epsilon_bounds_are_enforced() {
        let mut config = Config::default();
        config.clustering.epsilon = 0.0;
        assert!(ConfigLoader::validate(&config).is_err());
        config.clustering.epsilon = 2.5;
        assert!(ConfigLoader::validate(&config).is_err());
        config.clustering.epsilon = 0.3;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn database_path_falls_back_to_user_dir() {
        let mut config = Config::default();
        config.database.path = "/tmp/custom.db".to_string();
        assert_eq!(
            ConfigLoader::database_path(&config),
            PathBuf::from("/tmp/custom.db")
        );

        config.database.path = String::new();
        let default = ConfigLoader::database_path(&config);
        assert!(default.ends_with("octant/core.db"));
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  level: debug\nscheduler:\n  foreground_poll_ms: 750").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.scheduler.foreground_poll_ms, 750);
        assert_eq!(config.scheduler.sweep_interval_secs, 300);
    }

    #[test]
    fn env_vars_override_when_loading() {
        temp_env::with_vars(
            [("OCTANT_LOGGING__LEVEL", Some("warn"))],
            || {
                let config = ConfigLoader::load().unwrap();
                assert_eq!(config.logging.level, "warn");
            },
        );
    }
}
