//! Deployment configuration for the orchestrator.
//!
//! Centralizes everything the external interfaces (§6) call out as
//! environment-driven: the model chain per tier, circuit-breaker
//! thresholds, cost cap, fallback depth, reasoning-step budget,
//! memory promotion threshold, and duplicate-filter thresholds.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("IO error reading config file: {message}")]
    IoError { message: String },

    #[error("configuration parsing error: {message}")]
    ParseError { message: String },
}

/// Top-level deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api: ApiConfig,
    pub gateway: GatewayTomlConfig,
    pub retrieval: RetrievalTomlConfig,
    pub reasoning: ReasoningTomlConfig,
    pub memory: MemoryTomlConfig,
    pub dedup: DedupTomlConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsTomlConfig,
}

/// HTTP surface configuration (T2/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
    pub max_body_size: usize,
    /// Origins allowed by the CORS layer. Empty means same-origin only.
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            timeout_seconds: 90,
            max_body_size: 2 * 1024 * 1024,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// One logical model's place in the L1 fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelChainEntry {
    pub tier: String,
    pub model_id: String,
    pub cost_per_1k_tokens_usd: f64,
}

/// L1 Model Gateway deployment knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayTomlConfig {
    /// Ordered fallback chain, grouped by tier (e.g. "default", "cheap").
    pub model_chain: Vec<ModelChainEntry>,
    /// Consecutive failures before a model's circuit opens.
    pub circuit_failure_threshold: u32,
    /// Cooldown before an open circuit tries a half-open probe.
    #[serde(with = "humantime_serde")]
    pub circuit_cooldown: Duration,
    /// Consecutive half-open successes required to fully close.
    pub circuit_success_threshold: u32,
    /// Per-query cumulative cost cap in USD.
    pub cost_cap_usd: f64,
    /// Maximum providers tried per call before giving up.
    pub max_fallback_depth: u32,
    /// Hard per-call wall-clock budget.
    #[serde(with = "humantime_serde")]
    pub call_deadline: Duration,
}

impl Default for GatewayTomlConfig {
    fn default() -> Self {
        Self {
            model_chain: vec![
                ModelChainEntry { tier: "default".into(), model_id: "flash".into(), cost_per_1k_tokens_usd: 0.001 },
                ModelChainEntry { tier: "default".into(), model_id: "lite".into(), cost_per_1k_tokens_usd: 0.0005 },
            ],
            circuit_failure_threshold: 3,
            circuit_cooldown: Duration::from_secs(30),
            circuit_success_threshold: 2,
            cost_cap_usd: 0.10,
            max_fallback_depth: 3,
            call_deadline: Duration::from_secs(30),
        }
    }
}

/// L2 Hybrid Retriever deployment knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalTomlConfig {
    pub collections: Vec<String>,
    pub per_collection_limit: usize,
    pub total_retrieval_limit: usize,
    pub vector_store_url: Option<String>,
    pub vector_dimension: usize,
}

impl Default for RetrievalTomlConfig {
    fn default() -> Self {
        Self {
            collections: vec!["immigration".into(), "tax".into(), "corporate".into()],
            per_collection_limit: 8,
            total_retrieval_limit: 12,
            vector_store_url: None,
            vector_dimension: 1536,
        }
    }
}

/// M2 Reasoning Engine deployment knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTomlConfig {
    pub max_steps: u32,
    pub max_total_tokens: u64,
    #[serde(with = "humantime_serde")]
    pub step_deadline: Duration,
    #[serde(with = "humantime_serde")]
    pub session_deadline: Duration,
    /// Intents allowed to short-circuit the loop after a single step.
    pub early_exit_intents: Vec<String>,
}

impl Default for ReasoningTomlConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            max_total_tokens: 50_000,
            step_deadline: Duration::from_secs(30),
            session_deadline: Duration::from_secs(90),
            early_exit_intents: vec!["greeting".into(), "chitchat".into()],
        }
    }
}

/// L4 Memory Store deployment knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTomlConfig {
    /// Deadline for acquiring a per-user write lock before giving up with
    /// `MemoryError::LockTimeout`.
    #[serde(with = "humantime_serde")]
    pub lock_timeout: Duration,
    /// Number of distinct-user contributions before a collective fact promotes.
    pub promotion_threshold: usize,
    /// Maximum concurrent readers admitted per user partition.
    pub read_concurrency: usize,
}

impl Default for MemoryTomlConfig {
    fn default() -> Self {
        Self { lock_timeout: Duration::from_secs(5), promotion_threshold: 3, read_concurrency: 10 }
    }
}

/// L5 Duplicate Filter deployment knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupTomlConfig {
    pub keyword_jaccard_threshold: f32,
    pub semantic_cosine_threshold: f32,
    pub rolling_window_size: usize,
}

impl Default for DedupTomlConfig {
    fn default() -> Self {
        Self { keyword_jaccard_threshold: 0.6, semantic_cosine_threshold: 0.88, rolling_window_size: 500 }
    }
}

/// On-disk state the orchestrator owns directly (outside the abstracted
/// vector/SQL stores, which are external collaborators per the system's
/// scope — see spec's Out-of-scope list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Rolling window JSON file backing the L5 published-items registry.
    pub published_items_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { published_items_path: PathBuf::from("./data/published_items.json") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

/// T4 Metrics & Health deployment knobs (the `MetricsConfig` used to build
/// an exporter lives in `crate::metrics`; this is the TOML/env-facing
/// subset that feeds it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsTomlConfig {
    pub enabled: bool,
    pub export_interval_seconds: u64,
    pub file_path: Option<PathBuf>,
    pub otlp_endpoint: Option<String>,
}

impl Default for MetricsTomlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            export_interval_seconds: 60,
            file_path: Some(PathBuf::from("./data/ragna_orchestrator_metrics.json")),
            otlp_endpoint: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables layered over defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(host) = env::var("RAGNA_API_HOST") {
            config.api.host = host;
        }
        if let Ok(port) = env::var("RAGNA_API_PORT") {
            config.api.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RAGNA_API_PORT".to_string(),
                reason: "not a valid port number".to_string(),
            })?;
        }
        if let Ok(origins) = env::var("RAGNA_CORS_ORIGINS") {
            config.api.cors_origins = origins.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(cap) = env::var("RAGNA_COST_CAP_USD") {
            config.gateway.cost_cap_usd = cap.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RAGNA_COST_CAP_USD".to_string(),
                reason: "not a valid float".to_string(),
            })?;
        }
        if let Ok(depth) = env::var("RAGNA_MAX_FALLBACK_DEPTH") {
            config.gateway.max_fallback_depth = depth.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RAGNA_MAX_FALLBACK_DEPTH".to_string(),
                reason: "not a valid integer".to_string(),
            })?;
        }

        if let Ok(steps) = env::var("RAGNA_MAX_REASONING_STEPS") {
            config.reasoning.max_steps = steps.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RAGNA_MAX_REASONING_STEPS".to_string(),
                reason: "not a valid integer".to_string(),
            })?;
        }

        if let Ok(threshold) = env::var("RAGNA_PROMOTION_THRESHOLD") {
            config.memory.promotion_threshold = threshold.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RAGNA_PROMOTION_THRESHOLD".to_string(),
                reason: "not a valid integer".to_string(),
            })?;
        }

        if let Ok(vector_url) = env::var("RAGNA_VECTOR_STORE_URL") {
            config.retrieval.vector_store_url = Some(vector_url);
        }

        if let Ok(level) = env::var("RAGNA_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Ok(otlp) = env::var("RAGNA_OTLP_ENDPOINT") {
            config.metrics.otlp_endpoint = Some(otlp);
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file, with no environment overlay.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError { message: e.to_string() })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError { message: e.to_string() })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.port == 0 {
            return Err(ConfigError::InvalidValue { key: "api.port".to_string(), reason: "port cannot be 0".to_string() });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        if self.gateway.model_chain.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "gateway.model_chain".to_string(),
                reason: "at least one model must be configured".to_string(),
            });
        }

        if self.gateway.cost_cap_usd <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "gateway.cost_cap_usd".to_string(),
                reason: "must be > 0".to_string(),
            });
        }

        if self.retrieval.collections.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "retrieval.collections".to_string(),
                reason: "at least one collection must be configured".to_string(),
            });
        }

        if self.memory.promotion_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                key: "memory.promotion_threshold".to_string(),
                reason: "must be > 0".to_string(),
            });
        }

        if self.memory.read_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "memory.read_concurrency".to_string(),
                reason: "must be > 0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.dedup.keyword_jaccard_threshold)
            || !(0.0..=1.0).contains(&self.dedup.semantic_cosine_threshold)
        {
            return Err(ConfigError::InvalidValue {
                key: "dedup".to_string(),
                reason: "thresholds must be within [0.0, 1.0]".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn from_env_overlays_defaults() {
        env::set_var("RAGNA_API_PORT", "9090");
        env::set_var("RAGNA_COST_CAP_USD", "0.25");
        env::set_var("RAGNA_LOG_LEVEL", "debug");

        let config = Config::from_env().unwrap();
        assert_eq!(config.api.port, 9090);
        assert_eq!(config.gateway.cost_cap_usd, 0.25);
        assert_eq!(config.logging.level, "debug");

        env::remove_var("RAGNA_API_PORT");
        env::remove_var("RAGNA_COST_CAP_USD");
        env::remove_var("RAGNA_LOG_LEVEL");
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.api.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_model_chain() {
        let mut config = Config::default();
        config.gateway.model_chain.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_promotion_threshold() {
        let mut config = Config::default();
        config.memory.promotion_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn from_env_rejects_invalid_port() {
        env::set_var("RAGNA_API_PORT", "not-a-number");
        let result = Config::from_env();
        assert!(result.is_err());
        env::remove_var("RAGNA_API_PORT");
    }
}
