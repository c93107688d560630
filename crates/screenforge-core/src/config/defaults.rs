//! Default values for configuration sections that aren't present in a TOML file at all.
//!
//! Field-level `#[serde(default = "...")]` functions in `mod.rs` handle partial
//! sections; these `Default` impls handle a section missing entirely.

use super::{CacheConfig, CircuitBreakerConfig, EnsembleConfig, RateLimitConfig, RetryConfig, StorageConfig};

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_sec: 60,
            success_threshold: 3,
            request_timeout_sec: 60,
            fallback_map: Default::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_model_rpm_initial: 60.0,
            rpm_min: 1.0,
            rpm_max: 6000.0,
            adjust_alpha: 0.1,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            ttl_sec: 3600,
        }
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            tau_high: 0.85,
            tau_mid: 0.6,
            tau_low: 0.4,
            per_record_deadline_sec: 3500,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_sec: 0.5,
            max_delay_sec: 20.0,
            jitter_pct: 0.1,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "~/.screenforge/screenforge.db".to_string(),
            pdf_dir: "~/.screenforge/pdfs".to_string(),
            assessment_ttl_sec: 24 * 3600,
            batch_ttl_sec: 7 * 24 * 3600,
            pdf_retention_sec: 3600,
        }
    }
}
