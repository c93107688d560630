//! Environment variable overrides for configuration.
//!
//! Uses the `SCREENFORGE_` prefix with double underscores separating nested
//! keys (e.g. `SCREENFORGE_ENSEMBLE__TAU_HIGH`). Provider API keys are read
//! directly from the env var named by each provider's `api_key_env_var` —
//! they are not themselves overridable through this prefix.

use std::env;

use super::Config;
use crate::error::ConfigError;

impl Config {
    pub(super) fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = env::var("SCREENFORGE_RECALL_MODE") {
            self.recall_mode = parse_env_bool("SCREENFORGE_RECALL_MODE", &val)?;
        }

        // Circuit breaker
        if let Ok(val) = env::var("SCREENFORGE_CIRCUIT_BREAKER__FAILURE_THRESHOLD") {
            self.circuit_breaker.failure_threshold =
                parse_env_u32("SCREENFORGE_CIRCUIT_BREAKER__FAILURE_THRESHOLD", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_CIRCUIT_BREAKER__RECOVERY_TIMEOUT_SEC") {
            self.circuit_breaker.recovery_timeout_sec =
                parse_env_u64("SCREENFORGE_CIRCUIT_BREAKER__RECOVERY_TIMEOUT_SEC", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_CIRCUIT_BREAKER__SUCCESS_THRESHOLD") {
            self.circuit_breaker.success_threshold =
                parse_env_u32("SCREENFORGE_CIRCUIT_BREAKER__SUCCESS_THRESHOLD", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_CIRCUIT_BREAKER__REQUEST_TIMEOUT_SEC") {
            self.circuit_breaker.request_timeout_sec =
                parse_env_u64("SCREENFORGE_CIRCUIT_BREAKER__REQUEST_TIMEOUT_SEC", &val)?;
        }

        // Rate limiter
        if let Ok(val) = env::var("SCREENFORGE_RATE_LIMIT__PER_MODEL_RPM_INITIAL") {
            self.rate_limit.per_model_rpm_initial =
                parse_env_f64("SCREENFORGE_RATE_LIMIT__PER_MODEL_RPM_INITIAL", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_RATE_LIMIT__RPM_MIN") {
            self.rate_limit.rpm_min = parse_env_f64("SCREENFORGE_RATE_LIMIT__RPM_MIN", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_RATE_LIMIT__RPM_MAX") {
            self.rate_limit.rpm_max = parse_env_f64("SCREENFORGE_RATE_LIMIT__RPM_MAX", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_RATE_LIMIT__ADJUST_ALPHA") {
            self.rate_limit.adjust_alpha = parse_env_f64("SCREENFORGE_RATE_LIMIT__ADJUST_ALPHA", &val)?;
        }

        // Cache
        if let Ok(val) = env::var("SCREENFORGE_CACHE__MAX_SIZE") {
            self.cache.max_size = parse_env_usize("SCREENFORGE_CACHE__MAX_SIZE", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_CACHE__TTL_SEC") {
            self.cache.ttl_sec = parse_env_u64("SCREENFORGE_CACHE__TTL_SEC", &val)?;
        }

        // Ensemble
        if let Ok(val) = env::var("SCREENFORGE_ENSEMBLE__TAU_HIGH") {
            self.ensemble.tau_high = parse_env_f64("SCREENFORGE_ENSEMBLE__TAU_HIGH", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_ENSEMBLE__TAU_MID") {
            self.ensemble.tau_mid = parse_env_f64("SCREENFORGE_ENSEMBLE__TAU_MID", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_ENSEMBLE__TAU_LOW") {
            self.ensemble.tau_low = parse_env_f64("SCREENFORGE_ENSEMBLE__TAU_LOW", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_ENSEMBLE__PER_RECORD_DEADLINE_SEC") {
            self.ensemble.per_record_deadline_sec =
                parse_env_u64("SCREENFORGE_ENSEMBLE__PER_RECORD_DEADLINE_SEC", &val)?;
        }

        // Retry
        if let Ok(val) = env::var("SCREENFORGE_RETRY__MAX_RETRIES") {
            self.retry.max_retries = parse_env_u32("SCREENFORGE_RETRY__MAX_RETRIES", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_RETRY__BASE_DELAY_SEC") {
            self.retry.base_delay_sec = parse_env_f64("SCREENFORGE_RETRY__BASE_DELAY_SEC", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_RETRY__MAX_DELAY_SEC") {
            self.retry.max_delay_sec = parse_env_f64("SCREENFORGE_RETRY__MAX_DELAY_SEC", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_RETRY__JITTER_PCT") {
            self.retry.jitter_pct = parse_env_f64("SCREENFORGE_RETRY__JITTER_PCT", &val)?;
        }

        // Storage
        if let Ok(val) = env::var("SCREENFORGE_STORAGE__DB_PATH") {
            self.storage.db_path = val;
        }
        if let Ok(val) = env::var("SCREENFORGE_STORAGE__PDF_DIR") {
            self.storage.pdf_dir = val;
        }
        if let Ok(val) = env::var("SCREENFORGE_STORAGE__ASSESSMENT_TTL_SEC") {
            self.storage.assessment_ttl_sec = parse_env_u64("SCREENFORGE_STORAGE__ASSESSMENT_TTL_SEC", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_STORAGE__BATCH_TTL_SEC") {
            self.storage.batch_ttl_sec = parse_env_u64("SCREENFORGE_STORAGE__BATCH_TTL_SEC", &val)?;
        }
        if let Ok(val) = env::var("SCREENFORGE_STORAGE__PDF_RETENTION_SEC") {
            self.storage.pdf_retention_sec = parse_env_u64("SCREENFORGE_STORAGE__PDF_RETENTION_SEC", &val)?;
        }

        // Logging
        if let Ok(val) = env::var("SCREENFORGE_LOGGING__LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("SCREENFORGE_LOGGING__JSON") {
            self.logging.json = parse_env_bool("SCREENFORGE_LOGGING__JSON", &val)?;
        }

        Ok(())
    }
}

pub(super) fn parse_env_u32(var_name: &str, val: &str) -> Result<u32, ConfigError> {
    val.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
        field: var_name.to_string(),
        message: format!("'{val}' is not a valid u32"),
    })
}

pub(super) fn parse_env_u64(var_name: &str, val: &str) -> Result<u64, ConfigError> {
    val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        field: var_name.to_string(),
        message: format!("'{val}' is not a valid u64"),
    })
}

pub(super) fn parse_env_usize(var_name: &str, val: &str) -> Result<usize, ConfigError> {
    val.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
        field: var_name.to_string(),
        message: format!("'{val}' is not a valid usize"),
    })
}

pub(super) fn parse_env_f64(var_name: &str, val: &str) -> Result<f64, ConfigError> {
    val.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
        field: var_name.to_string(),
        message: format!("'{val}' is not a valid f64"),
    })
}

/// Accepts `true`, `false`, `1`, `0`, `yes`, `no` (case-insensitive).
pub(super) fn parse_env_bool(var_name: &str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: var_name.to_string(),
            message: format!("'{val}' is not a valid boolean (use true/false/1/0/yes/no)"),
        }),
    }
}
