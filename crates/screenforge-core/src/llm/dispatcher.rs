//! The dispatcher (C5): the single entry point screening (C8) and QA (C9)
//! call through. Composes the cache (C4), rate limiter (C2), circuit
//! breaker (C3), and a fallback + retry-with-jitter-backoff policy behind
//! one `call()` method, per the seven-step algorithm in §4.5.
//!
//! Retry shape (multiplicative backoff with jitter, retryable-error
//! filtering) follows the same pattern as other fan-out LLM clients in
//! this codebase's lineage: try, and on a retryable failure, sleep an
//! exponentially growing, jittered interval before trying again.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::error::{DispatchError, ProviderError};
use crate::llm::parsing::parse_judgment;
use crate::llm::registry::Registry;
use crate::llm::{GenerationParams, RawCompletion};

const BACKOFF_MULTIPLIER: f64 = 2.0;
const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 20_000;

/// Retry policy shared across all dispatcher calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

fn backoff_with_jitter(attempt: u32) -> Duration {
    let exp_ms = (BASE_BACKOFF_MS as f64 * BACKOFF_MULTIPLIER.powi(attempt as i32)).min(MAX_BACKOFF_MS as f64);
    let jitter = rand::thread_rng().gen_range(0.0..=exp_ms * 0.25);
    Duration::from_millis((exp_ms + jitter) as u64)
}

/// One request to the dispatcher: a specific (provider, model) target plus
/// the prompt and generation params. The dispatcher may reroute this to a
/// fallback target if the primary's circuit is open.
pub struct DispatchRequest<'a> {
    pub provider: &'a str,
    pub model_id: &'a str,
    pub system_prompt: &'a str,
    pub user_message: &'a str,
    pub params: GenerationParams,
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    retry: RetryConfig,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, retry: RetryConfig) -> Self {
        Self { registry, retry }
    }

    /// Execute one dispatch, following §4.5: cache check, circuit check
    /// (with fallback reroute), rate-limit wait, retry-with-backoff call,
    /// and cache population on success.
    pub async fn call(&self, request: DispatchRequest<'_>) -> Result<RawCompletion, DispatchError> {
        let cache_key = crate::llm::cache::ResponseCache::key(
            request.provider,
            request.model_id,
            request.system_prompt,
            request.user_message,
            &request.params,
        );

        if let Some(cached) = self.registry.cache.get(&cache_key) {
            return Ok(cached);
        }

        let (provider, model_id) = self.resolve_target(request.provider, request.model_id)?;

        let result = self
            .call_with_retry(&provider, &model_id, request.system_prompt, request.user_message, &request.params)
            .await;

        // Only a completion that parses into a valid decision is cached —
        // a malformed or non-JSON body must never poison future calls for
        // this key, even though the provider returned it as a success.
        if let Ok(ref completion) = result {
            if parse_judgment(&completion.raw_text).is_ok() {
                self.registry.cache.put(cache_key, completion.clone());
            }
        }

        result
    }

    /// Pick the (provider, model) to actually call: the requested target if
    /// its circuit is closed/half-open, else its configured fallback.
    fn resolve_target(&self, provider: &str, model_id: &str) -> Result<(String, String), DispatchError> {
        if !self.registry.contains_target(provider, model_id) {
            return Err(DispatchError::UnknownTarget {
                provider: provider.to_string(),
                model: model_id.to_string(),
            });
        }

        let breaker = self
            .registry
            .circuit_breaker(provider, model_id)
            .expect("target exists, breaker must exist");

        if breaker.allow_call() {
            return Ok((provider.to_string(), model_id.to_string()));
        }

        match self.registry.fallback_for(provider, model_id) {
            Some((fb_provider, fb_model)) => {
                let fb_breaker = self
                    .registry
                    .circuit_breaker(&fb_provider, &fb_model)
                    .ok_or_else(|| DispatchError::UnknownTarget {
                        provider: fb_provider.clone(),
                        model: fb_model.clone(),
                    })?;
                if fb_breaker.allow_call() {
                    Ok((fb_provider, fb_model))
                } else {
                    Err(DispatchError::AllFallbacksExhausted {
                        provider: provider.to_string(),
                        model: model_id.to_string(),
                    })
                }
            }
            None => Err(DispatchError::CircuitOpen {
                provider: provider.to_string(),
                model: model_id.to_string(),
            }),
        }
    }

    async fn call_with_retry(
        &self,
        provider: &str,
        model_id: &str,
        system_prompt: &str,
        user_message: &str,
        params: &GenerationParams,
    ) -> Result<RawCompletion, DispatchError> {
        let client = self
            .registry
            .client(provider)
            .ok_or_else(|| DispatchError::UnknownTarget {
                provider: provider.to_string(),
                model: model_id.to_string(),
            })?;
        let rate_limiter = self
            .registry
            .rate_limiter(provider, model_id)
            .expect("target validated by resolve_target");
        let breaker = self
            .registry
            .circuit_breaker(provider, model_id)
            .expect("target validated by resolve_target");

        let mut last_err: Option<ProviderError> = None;

        for attempt in 0..self.retry.max_attempts {
            let wait = rate_limiter.acquire();
            if wait > Duration::ZERO {
                tokio::time::sleep(wait).await;
            }

            let started = Instant::now();
            match client.complete(model_id, system_prompt, user_message, params).await {
                Ok(completion) => {
                    rate_limiter.record_success();
                    breaker.record_success(completion.latency_ms);
                    return Ok(completion);
                }
                Err(err) => {
                    let _ = started.elapsed();
                    if matches!(err, ProviderError::RateLimited { .. }) {
                        rate_limiter.record_throttled();
                    }
                    breaker.record_failure();
                    let retryable = err.is_retryable();
                    last_err = Some(err);
                    if !retryable || attempt + 1 >= self.retry.max_attempts {
                        break;
                    }
                    tokio::time::sleep(backoff_with_jitter(attempt)).await;
                }
            }
        }

        Err(DispatchError::Provider(
            last_err.expect("at least one attempt is always made"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::circuit_breaker::CircuitBreakerConfig;
    use crate::llm::registry::{ModelDescriptor, ProviderEntry};
    use crate::llm::{ModelKind, ProviderClient};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyClient {
        fail_times: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ProviderClient for FlakyClient {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _model_id: &str,
            _system_prompt: &str,
            _user_message: &str,
            _params: &GenerationParams,
        ) -> Result<RawCompletion, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(ProviderError::Timeout { elapsed_ms: 10 })
            } else {
                Ok(RawCompletion {
                    raw_text: "recovered".into(),
                    latency_ms: 5,
                })
            }
        }
    }

    fn registry_with(client: Arc<dyn ProviderClient>) -> Arc<Registry> {
        let mut registry = Registry::new(Duration::from_secs(60), 10);
        registry.register_provider(
            "flaky",
            ProviderEntry {
                client,
                models: vec![ModelDescriptor {
                    model_id: "m1".into(),
                    kind: ModelKind::Chat,
                    initial_rpm: 6000.0,
                    fallback: None,
                }],
                default_fallback: None,
            },
        );
        Arc::new(registry)
    }

    #[tokio::test]
    async fn succeeds_after_retrying_transient_failures() {
        let client = Arc::new(FlakyClient {
            fail_times: 2,
            calls: AtomicU32::new(0),
        });
        let registry = registry_with(client);
        let dispatcher = Dispatcher::new(registry, RetryConfig { max_attempts: 3 });

        let result = dispatcher
            .call(DispatchRequest {
                provider: "flaky",
                model_id: "m1",
                system_prompt: "sys",
                user_message: "hello",
                params: GenerationParams::default(),
            })
            .await
            .expect("eventually succeeds");

        assert_eq!(result.raw_text, "recovered");
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_provider_error() {
        let client = Arc::new(FlakyClient {
            fail_times: 10,
            calls: AtomicU32::new(0),
        });
        let registry = registry_with(client);
        let dispatcher = Dispatcher::new(registry, RetryConfig { max_attempts: 2 });

        let err = dispatcher
            .call(DispatchRequest {
                provider: "flaky",
                model_id: "m1",
                system_prompt: "sys",
                user_message: "hello",
                params: GenerationParams::default(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Provider(ProviderError::Timeout { .. })));
    }

    #[tokio::test]
    async fn unknown_target_is_rejected() {
        let client = Arc::new(FlakyClient {
            fail_times: 0,
            calls: AtomicU32::new(0),
        });
        let registry = registry_with(client);
        let dispatcher = Dispatcher::new(registry, RetryConfig::default());

        let err = dispatcher
            .call(DispatchRequest {
                provider: "flaky",
                model_id: "does-not-exist",
                system_prompt: "sys",
                user_message: "hello",
                params: GenerationParams::default(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::UnknownTarget { .. }));
    }

    #[tokio::test]
    async fn open_circuit_with_no_fallback_is_rejected() {
        let client = Arc::new(FlakyClient {
            fail_times: 100,
            calls: AtomicU32::new(0),
        });
        let mut registry = Registry::new(Duration::from_secs(60), 10);
        registry.register_provider(
            "flaky",
            ProviderEntry {
                client,
                models: vec![ModelDescriptor {
                    model_id: "m1".into(),
                    kind: ModelKind::Chat,
                    initial_rpm: 6000.0,
                    fallback: None,
                }],
                default_fallback: None,
            },
        );
        let registry = Arc::new(registry);
        let breaker = registry.circuit_breaker("flaky", "m1").unwrap();
        for _ in 0..CircuitBreakerConfig::default().failure_threshold {
            breaker.record_failure();
        }

        let dispatcher = Dispatcher::new(registry, RetryConfig::default());
        let err = dispatcher
            .call(DispatchRequest {
                provider: "flaky",
                model_id: "m1",
                system_prompt: "sys",
                user_message: "hello",
                params: GenerationParams::default(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::CircuitOpen { .. }));
    }

    struct FixedClient {
        raw_text: &'static str,
    }

    #[async_trait]
    impl ProviderClient for FixedClient {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            _model_id: &str,
            _system_prompt: &str,
            _user_message: &str,
            _params: &GenerationParams,
        ) -> Result<RawCompletion, ProviderError> {
            Ok(RawCompletion {
                raw_text: self.raw_text.to_string(),
                latency_ms: 5,
            })
        }
    }

    fn registry_with_fixed(raw_text: &'static str) -> Arc<Registry> {
        let mut registry = Registry::new(Duration::from_secs(60), 10);
        registry.register_provider(
            "fixed",
            ProviderEntry {
                client: Arc::new(FixedClient { raw_text }),
                models: vec![ModelDescriptor {
                    model_id: "m1".into(),
                    kind: ModelKind::Chat,
                    initial_rpm: 6000.0,
                    fallback: None,
                }],
                default_fallback: None,
            },
        );
        Arc::new(registry)
    }

    #[tokio::test]
    async fn malformed_response_bypasses_cache() {
        let registry = registry_with_fixed("I cannot answer this question.");
        let dispatcher = Dispatcher::new(registry.clone(), RetryConfig::default());

        dispatcher
            .call(DispatchRequest {
                provider: "fixed",
                model_id: "m1",
                system_prompt: "sys",
                user_message: "hello",
                params: GenerationParams::default(),
            })
            .await
            .expect("provider call succeeds even though the body is garbage");

        assert!(registry.cache.is_empty(), "malformed body must not be cached");
    }

    #[tokio::test]
    async fn valid_decision_response_is_cached() {
        let registry = registry_with_fixed(r#"{"decision": "include", "rationale": "fits"}"#);
        let dispatcher = Dispatcher::new(registry.clone(), RetryConfig::default());

        dispatcher
            .call(DispatchRequest {
                provider: "fixed",
                model_id: "m1",
                system_prompt: "sys",
                user_message: "hello",
                params: GenerationParams::default(),
            })
            .await
            .expect("call succeeds");

        assert_eq!(registry.cache.len(), 1);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let d0 = backoff_with_jitter(0);
        let d3 = backoff_with_jitter(3);
        assert!(d0.as_millis() >= BASE_BACKOFF_MS as u128);
        assert!(d3.as_millis() > d0.as_millis());
        let d_big = backoff_with_jitter(20);
        assert!(d_big.as_millis() <= (MAX_BACKOFF_MS as f64 * 1.25) as u128);
    }
}
