//! Builds a live [`Registry`] from [`Config`], resolving API keys from the
//! environment and selecting the right wire client per provider name.
//!
//! `anthropic` and `google` get their dedicated clients; every other
//! provider name is treated as OpenAI-compatible (chat-completions shaped
//! request/response), which covers the common case of self-hosted or
//! third-party gateways that mimic the OpenAI wire format.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::ConfigError;
use crate::llm::anthropic::AnthropicClient;
use crate::llm::dispatcher::{Dispatcher, RetryConfig};
use crate::llm::google::GoogleClient;
use crate::llm::openai_compat::OpenAiCompatClient;
use crate::llm::registry::{ModelDescriptor, ProviderEntry, Registry};
use crate::llm::{GenerationParams, ProviderClient};
use crate::qa::CriterionFanout;
use crate::screening::ModelTarget;

/// Build a [`Registry`] wired up with every provider and model in `config`.
///
/// Reads each provider's API key from the environment variable named by
/// `api_key_env_var`; a provider whose variable is unset fails the whole
/// build, since a registry with a silently-unusable provider would only
/// surface as a confusing runtime error later.
pub fn build_registry(config: &Config) -> Result<Registry, ConfigError> {
    let mut registry = Registry::new(
        Duration::from_secs(config.cache.ttl_sec),
        config.cache.max_size,
    );

    for (name, provider) in &config.providers {
        let api_key = env::var(&provider.api_key_env_var).map_err(|_| ConfigError::MissingField {
            field: format!("providers.{name}.api_key_env_var ({})", provider.api_key_env_var),
        })?;

        let client: Arc<dyn ProviderClient> = match name.as_str() {
            "anthropic" => Arc::new(AnthropicClient::new(api_key)),
            "google" => Arc::new(GoogleClient::new(api_key)),
            _ => Arc::new(OpenAiCompatClient::new(
                provider.default_base_url.clone(),
                api_key,
                name.clone(),
            )),
        };
        tracing::info!(provider = %name, models = provider.models.len(), "registering LLM provider");

        let models = provider
            .models
            .iter()
            .map(|model| ModelDescriptor {
                model_id: model.id.clone(),
                kind: model.kind,
                initial_rpm: model
                    .initial_rpm
                    .unwrap_or(config.rate_limit.per_model_rpm_initial),
                fallback: model
                    .fallback
                    .as_ref()
                    .map(|f| (f.provider.clone(), f.model_id.clone())),
            })
            .collect();

        registry.register_provider(
            name,
            ProviderEntry {
                client,
                models,
                default_fallback: provider
                    .default_fallback
                    .as_ref()
                    .map(|f| (f.provider.clone(), f.model_id.clone())),
            },
        );
    }

    Ok(registry)
}

/// Build a [`Dispatcher`] over a registry built from `config`.
pub fn build_dispatcher(config: &Config) -> Result<Arc<Dispatcher>, ConfigError> {
    let registry = build_registry(config)?;
    Ok(Arc::new(Dispatcher::new(
        Arc::new(registry),
        RetryConfig {
            max_attempts: config.retry.max_retries,
        },
    )))
}

/// One fan-out target per configured model across every provider, for the
/// screening pipeline (C8). Generation params follow the model's own
/// `context_window`/`supports_temperature` only loosely here — callers that
/// need per-model tuning construct `ModelTarget` directly.
pub fn screening_targets(config: &Config) -> Vec<ModelTarget> {
    let mut targets = Vec::new();
    for (provider_name, provider) in &config.providers {
        for model in &provider.models {
            targets.push(ModelTarget {
                provider: provider_name.clone(),
                model_id: model.id.clone(),
                params: GenerationParams {
                    temperature: model.supports_temperature.then_some(0.0),
                    ..GenerationParams::default()
                },
            });
        }
    }
    targets
}

/// Build a [`CriterionFanout`] (C9) against the first configured model
/// found across all providers — quality assessment uses a single model per
/// criterion call, not the ensemble fan-out that screening (C8) uses.
pub fn build_qa_fanout(
    config: &Config,
    dispatcher: Arc<Dispatcher>,
) -> Result<CriterionFanout, ConfigError> {
    let (provider_name, model) = config
        .providers
        .iter()
        .find_map(|(name, provider)| provider.models.first().map(|model| (name.clone(), model)))
        .ok_or_else(|| ConfigError::MissingField {
            field: "providers".to_string(),
        })?;

    Ok(CriterionFanout::new(
        dispatcher,
        provider_name,
        model.id.clone(),
        GenerationParams {
            temperature: model.supports_temperature.then_some(0.0),
            ..GenerationParams::default()
        },
        Duration::from_secs(config.ensemble.per_record_deadline_sec),
    ))
}
