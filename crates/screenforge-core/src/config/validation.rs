//! Cross-field configuration validation, run after loading and env overrides.

use super::Config;
use crate::error::ConfigError;

impl Config {
    /// Validate the configuration, returning all errors found (not just the first).
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if self.providers.is_empty() {
            errors.push(ConfigError::MissingField {
                field: "providers".to_string(),
            });
        }

        for (name, provider) in &self.providers {
            if provider.api_key_env_var.is_empty() {
                errors.push(ConfigError::MissingField {
                    field: format!("providers.{name}.api_key_env_var"),
                });
            }
            if provider.models.is_empty() {
                errors.push(ConfigError::MissingField {
                    field: format!("providers.{name}.models"),
                });
            }
        }

        if !(self.ensemble.tau_high > self.ensemble.tau_mid && self.ensemble.tau_mid > self.ensemble.tau_low) {
            errors.push(ConfigError::InvalidValue {
                field: "ensemble".to_string(),
                message: "tau_high must be greater than tau_mid, which must be greater than tau_low".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.ensemble.tau_high) || !(0.0..=1.0).contains(&self.ensemble.tau_low) {
            errors.push(ConfigError::InvalidValue {
                field: "ensemble".to_string(),
                message: "thresholds must fall within [0, 1]".to_string(),
            });
        }

        if self.rate_limit.rpm_min > self.rate_limit.rpm_max {
            errors.push(ConfigError::InvalidValue {
                field: "rate_limit".to_string(),
                message: "rpm_min must not exceed rpm_max".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.rate_limit.adjust_alpha) {
            errors.push(ConfigError::InvalidValue {
                field: "rate_limit.adjust_alpha".to_string(),
                message: "must fall within [0, 1]".to_string(),
            });
        }

        if self.circuit_breaker.failure_threshold == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "circuit_breaker.failure_threshold".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.circuit_breaker.success_threshold == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "circuit_breaker.success_threshold".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if self.retry.base_delay_sec > self.retry.max_delay_sec {
            errors.push(ConfigError::InvalidValue {
                field: "retry".to_string(),
                message: "base_delay_sec must not exceed max_delay_sec".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_pct) {
            errors.push(ConfigError::InvalidValue {
                field: "retry.jitter_pct".to_string(),
                message: "must fall within [0, 1]".to_string(),
            });
        }

        if self.cache.max_size == 0 {
            errors.push(ConfigError::InvalidValue {
                field: "cache.max_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
