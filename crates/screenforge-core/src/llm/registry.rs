//! Registry of configured (provider, model) targets and their shared
//! mutable state — the rate limiter and circuit breaker each target
//! owns, per Design Note "Shared mutable per-(provider, model) state".
//!
//! Built once at startup from `Config` and handed to the dispatcher (C5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::llm::cache::ResponseCache;
use crate::llm::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::llm::rate_limiter::RateLimiter;
use crate::llm::{ModelKind, ProviderClient};

/// One configured model within a provider, with its capability tier and
/// starting rate-limit budget.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub model_id: String,
    pub kind: ModelKind,
    pub initial_rpm: f64,
    /// Same-tier fallback target, as `(provider, model_id)`. Consulted by
    /// the dispatcher before falling back to a provider-level default —
    /// see §9 Open Question resolution.
    pub fallback: Option<(String, String)>,
}

/// A registered provider: its client plus all models it exposes.
pub struct ProviderEntry {
    pub client: Arc<dyn ProviderClient>,
    pub models: Vec<ModelDescriptor>,
    /// Provider-level fallback target, used only when a model has no
    /// same-tier fallback of its own.
    pub default_fallback: Option<(String, String)>,
}

struct TargetState {
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
    kind: ModelKind,
    fallback: Option<(String, String)>,
}

/// The live registry: provider clients, per-target rate limiters and
/// circuit breakers, and the shared response cache.
pub struct Registry {
    providers: HashMap<String, Arc<dyn ProviderClient>>,
    provider_fallbacks: HashMap<String, (String, String)>,
    targets: HashMap<(String, String), TargetState>,
    pub cache: ResponseCache,
}

impl Registry {
    pub fn new(cache_ttl: Duration, cache_max_size: usize) -> Self {
        Self {
            providers: HashMap::new(),
            provider_fallbacks: HashMap::new(),
            targets: HashMap::new(),
            cache: ResponseCache::new(cache_ttl, cache_max_size),
        }
    }

    pub fn register_provider(&mut self, name: &str, entry: ProviderEntry) {
        self.providers.insert(name.to_string(), entry.client);
        if let Some(fallback) = entry.default_fallback {
            self.provider_fallbacks.insert(name.to_string(), fallback);
        }
        for model in entry.models {
            self.targets.insert(
                (name.to_string(), model.model_id.clone()),
                TargetState {
                    rate_limiter: RateLimiter::new(model.initial_rpm),
                    circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
                    kind: model.kind,
                    fallback: model.fallback,
                },
            );
        }
    }

    pub fn client(&self, provider: &str) -> Option<Arc<dyn ProviderClient>> {
        self.providers.get(provider).cloned()
    }

    pub fn rate_limiter(&self, provider: &str, model_id: &str) -> Option<&RateLimiter> {
        self.targets
            .get(&(provider.to_string(), model_id.to_string()))
            .map(|t| &t.rate_limiter)
    }

    pub fn circuit_breaker(&self, provider: &str, model_id: &str) -> Option<&CircuitBreaker> {
        self.targets
            .get(&(provider.to_string(), model_id.to_string()))
            .map(|t| &t.circuit_breaker)
    }

    pub fn contains_target(&self, provider: &str, model_id: &str) -> bool {
        self.targets.contains_key(&(provider.to_string(), model_id.to_string()))
    }

    /// Resolve the fallback target for (provider, model): the model's own
    /// same-tier fallback if configured, else the provider's default.
    pub fn fallback_for(&self, provider: &str, model_id: &str) -> Option<(String, String)> {
        let target = self.targets.get(&(provider.to_string(), model_id.to_string()))?;
        target
            .fallback
            .clone()
            .or_else(|| self.provider_fallbacks.get(provider).cloned())
    }

    pub fn model_kind(&self, provider: &str, model_id: &str) -> Option<ModelKind> {
        self.targets
            .get(&(provider.to_string(), model_id.to_string()))
            .map(|t| t.kind)
    }
}
