//! LLM provider abstraction (C1) and the machinery layered on top of it:
//! rate limiting (C2), circuit breaking (C3), response caching (C4), and
//! the dispatcher (C5) that composes all of it behind one `call()` entry
//! point.

pub mod anthropic;
pub mod cache;
pub mod circuit_breaker;
pub mod dispatcher;
pub mod factory;
pub mod google;
pub mod openai_compat;
pub mod parsing;
pub mod rate_limiter;
pub mod registry;

use async_trait::async_trait;

use crate::error::ProviderError;

/// What kind of model this is, for capability gating (e.g. reasoning-only
/// models silently drop `temperature`) and same-tier fallback routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Chat,
    Reasoning,
    Multimodal,
}

/// Generation parameters for a single call. Fields unsupported by a given
/// model (e.g. `temperature` on a reasoning-only model) are dropped by the
/// concrete provider client, not rejected — see §4.1.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: Some(0.0),
            timeout_secs: 60,
        }
    }
}

/// The raw outcome of one provider call before any JSON-decision parsing:
/// just the text body and how long the call took. The caller (C8/C9) is
/// responsible for parsing `raw_text` into a decision.
#[derive(Debug, Clone)]
pub struct RawCompletion {
    pub raw_text: String,
    pub latency_ms: u64,
}

/// One concrete client per provider variant. Implementations must not retry
/// internally — retry policy belongs to the dispatcher (C5).
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// The provider name as it appears in configuration and fallback tables.
    fn name(&self) -> &str;

    /// Issue one call. `model_id` selects among the provider's configured
    /// models; `system_prompt` may be empty.
    async fn complete(
        &self,
        model_id: &str,
        system_prompt: &str,
        user_message: &str,
        params: &GenerationParams,
    ) -> Result<RawCompletion, ProviderError>;
}
