//! Configuration management for the screening/assessment engine.
//!
//! Supports three-layer configuration loading:
//! 1. Built-in defaults
//! 2. TOML config file (`~/.screenforge/config.toml`)
//! 3. Environment variable overrides (`SCREENFORGE_` prefix)
//!
//! CLI flag overrides are applied by the binary crate after loading.

mod defaults;
mod env_overrides;
mod validation;

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::llm::ModelKind;
use crate::storage::expand_tilde;

/// Top-level configuration for the screening/assessment engine.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// LLM provider definitions, keyed by provider name (e.g. "anthropic").
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Circuit breaker (C3) defaults, overridable per (provider, model) via `fallback_map`.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Rate limiter (C2) defaults.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Response cache (C4) settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Ensemble aggregator (C7) thresholds and screening deadline.
    #[serde(default)]
    pub ensemble: EnsembleConfig,

    /// Dispatcher (C5) retry/backoff settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Job store (C11) TTLs and PDF retention (C10).
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Whether downstream evaluation/export code should treat `HumanReview`
    /// as a provisional include when computing recall. Purely advisory — the
    /// core pipeline keeps all three `Decision` variants distinct regardless.
    #[serde(default)]
    pub recall_mode: bool,
}

// ---------------------------------------------------------------------------
// Providers (§6.1)
// ---------------------------------------------------------------------------

/// One LLM provider's wire configuration and model catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Name of the environment variable holding the API key.
    pub api_key_env_var: String,

    /// Base URL used unless a model or call site overrides it.
    pub default_base_url: String,

    /// HTTP header carrying the API key (e.g. "x-api-key", "Authorization").
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Template the key is substituted into, e.g. `"Bearer {key}"`.
    #[serde(default = "default_api_key_format")]
    pub api_key_format: String,

    /// Request content type.
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Additional static headers (e.g. Anthropic's `anthropic-version`).
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,

    /// Models this provider exposes.
    #[serde(default)]
    pub models: Vec<ModelConfig>,

    /// Provider-level fallback used when a model has none of its own.
    #[serde(default)]
    pub default_fallback: Option<FallbackTarget>,
}

/// One model entry within a provider's catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ModelKind,
    pub context_window: u32,
    #[serde(default)]
    pub supports_temperature: bool,
    /// Starting requests-per-minute for this (provider, model) target.
    /// Falls back to `rate_limit.per_model_rpm_initial` when absent.
    #[serde(default)]
    pub initial_rpm: Option<f64>,
    /// Same-tier fallback target, restricted to models of the same `kind`.
    #[serde(default)]
    pub fallback: Option<FallbackTarget>,
}

/// A (provider, model) pair to retry against when the primary is unavailable.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackTarget {
    pub provider: String,
    pub model_id: String,
}

fn default_api_key_header() -> String {
    "Authorization".to_string()
}
fn default_api_key_format() -> String {
    "Bearer {key}".to_string()
}
fn default_content_type() -> String {
    "application/json".to_string()
}

// ---------------------------------------------------------------------------
// Circuit breaker (C3)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout_sec")]
    pub recovery_timeout_sec: u64,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
    /// Keyed by `"{provider}/{model_id}"`, overriding per-model fallback targets.
    #[serde(default)]
    pub fallback_map: HashMap<String, FallbackTarget>,
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_recovery_timeout_sec() -> u64 {
    60
}
fn default_success_threshold() -> u32 {
    3
}
fn default_request_timeout_sec() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Rate limiter (C2)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_per_model_rpm_initial")]
    pub per_model_rpm_initial: f64,
    #[serde(default = "default_rpm_min")]
    pub rpm_min: f64,
    #[serde(default = "default_rpm_max")]
    pub rpm_max: f64,
    #[serde(default = "default_adjust_alpha")]
    pub adjust_alpha: f64,
}

fn default_per_model_rpm_initial() -> f64 {
    60.0
}
fn default_rpm_min() -> f64 {
    1.0
}
fn default_rpm_max() -> f64 {
    6000.0
}
fn default_adjust_alpha() -> f64 {
    0.1
}

// ---------------------------------------------------------------------------
// Response cache (C4)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
    #[serde(default = "default_cache_ttl_sec")]
    pub ttl_sec: u64,
}

fn default_cache_max_size() -> usize {
    1000
}
fn default_cache_ttl_sec() -> u64 {
    3600
}

// ---------------------------------------------------------------------------
// Ensemble aggregator (C7) / screening pipeline (C8)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnsembleConfig {
    #[serde(default = "default_tau_high")]
    pub tau_high: f64,
    #[serde(default = "default_tau_mid")]
    pub tau_mid: f64,
    #[serde(default = "default_tau_low")]
    pub tau_low: f64,
    #[serde(default = "default_per_record_deadline_sec")]
    pub per_record_deadline_sec: u64,
}

fn default_tau_high() -> f64 {
    0.85
}
fn default_tau_mid() -> f64 {
    0.6
}
fn default_tau_low() -> f64 {
    0.4
}
fn default_per_record_deadline_sec() -> u64 {
    3500
}

// ---------------------------------------------------------------------------
// Dispatcher retry/backoff (C5)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_sec")]
    pub base_delay_sec: f64,
    #[serde(default = "default_max_delay_sec")]
    pub max_delay_sec: f64,
    #[serde(default = "default_jitter_pct")]
    pub jitter_pct: f64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_sec() -> f64 {
    0.5
}
fn default_max_delay_sec() -> f64 {
    20.0
}
fn default_jitter_pct() -> f64 {
    0.1
}

// ---------------------------------------------------------------------------
// Storage (C10/C11)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_pdf_dir")]
    pub pdf_dir: String,
    #[serde(default = "default_assessment_ttl_sec")]
    pub assessment_ttl_sec: u64,
    #[serde(default = "default_batch_ttl_sec")]
    pub batch_ttl_sec: u64,
    #[serde(default = "default_pdf_retention_sec")]
    pub pdf_retention_sec: u64,
}

fn default_db_path() -> String {
    "~/.screenforge/screenforge.db".to_string()
}
fn default_pdf_dir() -> String {
    "~/.screenforge/pdfs".to_string()
}
fn default_assessment_ttl_sec() -> u64 {
    24 * 3600
}
fn default_batch_ttl_sec() -> u64 {
    7 * 24 * 3600
}
fn default_pdf_retention_sec() -> u64 {
    3600
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive string, e.g. "info" or "screenforge_core=debug".
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON-formatted log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// The loading sequence:
    /// 1. Determine config file path (argument > `SCREENFORGE_CONFIG` env var > default)
    /// 2. Parse TOML file (or use defaults if the default path doesn't exist)
    /// 3. Apply environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Config, ConfigError> {
        let (path, explicit) = Self::resolve_config_path(config_path);

        let mut config = match std::fs::read_to_string(&path) {
            Ok(contents) => {
                toml::from_str::<Config>(&contents).map_err(|e| ConfigError::ParseError { source: e })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Config::default()
            }
            Err(_) => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        };

        config.apply_env_overrides()?;

        Ok(config)
    }

    /// Load configuration and validate it, returning all validation errors at once.
    pub fn load_and_validate(config_path: Option<&str>) -> Result<Config, Vec<ConfigError>> {
        let config = Config::load(config_path).map_err(|e| vec![e])?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_config_path(config_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(path) = config_path {
            return (PathBuf::from(expand_tilde(path)), true);
        }

        if let Ok(env_path) = env::var("SCREENFORGE_CONFIG") {
            return (PathBuf::from(expand_tilde(&env_path)), true);
        }

        (PathBuf::from(expand_tilde("~/.screenforge/config.toml")), false)
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_thresholds() {
        let config = Config::default();
        assert_eq!(config.ensemble.tau_high, 0.85);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.rate_limit.rpm_min, 1.0);
        assert_eq!(config.storage.assessment_ttl_sec, 24 * 3600);
        assert!(!config.recall_mode);
    }

    #[test]
    fn load_missing_default_path_falls_back_to_defaults() {
        let original = env::var("SCREENFORGE_CONFIG").ok();
        env::remove_var("SCREENFORGE_CONFIG");

        let config = Config::load(Some("/nonexistent/path/should/not/exist.toml"));
        assert!(matches!(config, Err(ConfigError::FileNotFound { .. })));

        if let Some(val) = original {
            env::set_var("SCREENFORGE_CONFIG", val);
        }
    }

    #[test]
    fn load_valid_toml_parses_provider_catalog() {
        let toml_str = r#"
            [providers.anthropic]
            api_key_env_var = "ANTHROPIC_API_KEY"
            default_base_url = "https://api.anthropic.com"
            api_key_header = "x-api-key"
            api_key_format = "{key}"

            [[providers.anthropic.models]]
            id = "claude-3-5-sonnet-20241022"
            type = "chat"
            context_window = 200000
            supports_temperature = true
        "#;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml_str).unwrap();

        let config = Config::load(Some(path.to_str().unwrap())).expect("load succeeds");
        let anthropic = config.providers.get("anthropic").expect("anthropic provider present");
        assert_eq!(anthropic.models.len(), 1);
        assert_eq!(anthropic.models[0].id, "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn split_csv_trims_and_filters() {
        assert_eq!(split_csv("a, b ,, c"), vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(split_csv(""), Vec::<String>::new());
    }
}
