//! Runtime configuration model.
//!
//! Hierarchically merged by the config loader: programmatic defaults,
//! project YAML, local overrides, then `OCTANT_*` environment variables.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub registry: RegistryConfig,
    pub helper: HelperConfig,
    pub embedding: EmbeddingConfig,
    pub scheduler: SchedulerConfig,
    pub dispatcher: DispatcherConfig,
    pub clustering: ClusteringConfig,
}

/// Embedded database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file. Empty means the per-user default
    /// (`<data_local_dir>/octant/core.db`).
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            max_connections: 10,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    /// Directory for rolling daily log files; console-only when unset.
    pub directory: Option<String>,
    pub retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            directory: None,
            retention_days: 30,
        }
    }
}

/// Remote registry endpoints and the local index source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub primary_url: String,
    pub secondary_url: String,
    /// Optional static JSON file the local index is bulk-refreshed from.
    pub local_index_path: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            primary_url: String::new(),
            secondary_url: String::new(),
            local_index_path: None,
            request_timeout_secs: 10,
        }
    }
}

/// The out-of-process LLM helper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HelperConfig {
    /// Helper executable, resolved through `PATH` if not absolute.
    pub program: String,
    pub timeout_secs: u64,
    /// Environment variable holding the provider credential. Absence
    /// disables LLM-backed features.
    pub api_key_env: String,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            program: "octant-helper".to_string(),
            timeout_secs: 30,
            api_key_env: "PRIMARY_LLM_KEY".to_string(),
        }
    }
}

/// The embedding HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint_url: String,
    pub timeout_secs: u64,
    /// Environment variable holding the credential. Absence disables the
    /// embedding/clustering stage of the pipeline.
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            timeout_secs: 10,
            api_key_env: "EMBEDDING_KEY".to_string(),
        }
    }
}

/// Timer cadences for the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub foreground_poll_ms: u64,
    pub sweep_interval_secs: u64,
    pub pipeline_initial_delay_secs: u64,
    pub pipeline_interval_secs: u64,
    /// How long shutdown waits for inflight work before aborting it.
    pub shutdown_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            foreground_poll_ms: 500,
            sweep_interval_secs: 300,
            pipeline_initial_delay_secs: 60,
            pipeline_interval_secs: 900,
            shutdown_grace_secs: 2,
        }
    }
}

/// Dispatch-side knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Interpreter for inline scripts.
    pub interpreter: String,
    /// Keybind hold duration between press and release.
    pub key_hold_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            key_hold_ms: 40,
        }
    }
}

/// Workflow clustering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Maximum cosine distance to join an existing cluster.
    pub epsilon: f32,
    /// Minimum recent interactions before an app is summarised.
    pub min_interactions: usize,
    /// The "recent" window the pipeline looks back over.
    pub recent_window_secs: i64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.3,
            min_interactions: 3,
            recent_window_secs: 900,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_cadences() {
        let config = Config::default();
        assert_eq!(config.scheduler.foreground_poll_ms, 500);
        assert_eq!(config.scheduler.sweep_interval_secs, 300);
        assert_eq!(config.scheduler.pipeline_interval_secs, 900);
        assert_eq!(config.registry.request_timeout_secs, 10);
        assert_eq!(config.helper.timeout_secs, 30);
        assert!((config.clustering.epsilon - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn yaml_overrides_merge_over_defaults() {
        let yaml = r"
logging:
  level: debug
scheduler:
  foreground_poll_ms: 250
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.scheduler.foreground_poll_ms, 250);
        assert_eq!(config.scheduler.sweep_interval_secs, 300);
    }
}
