//! Anthropic native provider client (C1).
//!
//! Uses the Anthropic Messages API, which has a distinct request format,
//! authentication mechanism, and response structure from OpenAI-compatible
//! endpoints.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::{GenerationParams, ProviderClient, RawCompletion};
use crate::error::ProviderError;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Provider client for the Anthropic Messages API. One instance is shared
/// across all models configured under `providers.anthropic` — `model_id`
/// is supplied per call, not fixed at construction.
pub struct AnthropicClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key,
        }
    }

    /// Construct with a custom base URL, for pointing at a mock server in tests.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl ProviderClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        model_id: &str,
        system_prompt: &str,
        user_message: &str,
        params: &GenerationParams,
    ) -> Result<RawCompletion, ProviderError> {
        let request = AnthropicRequest {
            model: model_id,
            max_tokens: params.max_tokens,
            system: if system_prompt.is_empty() {
                None
            } else {
                Some(system_prompt)
            },
            messages: vec![AnthropicMessage {
                role: "user",
                content: user_message,
            }],
            temperature: params.temperature,
        };

        let started = Instant::now();

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(std::time::Duration::from_secs(params.timeout_secs))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();

            if status == 429 || status == 529 {
                let retry_after = if status == 529 {
                    Some(30)
                } else {
                    response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .or(Some(60))
                };
                return Err(ProviderError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }

            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<AnthropicErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            if status == 401 || status == 403 {
                return Err(ProviderError::Auth { message });
            }
            return Err(ProviderError::Server { status, message });
        }

        let raw_body = response.text().await?;
        let body: AnthropicResponse = serde_json::from_str(&raw_body).map_err(|_| {
            ProviderError::InvalidResponse {
                raw: raw_body.clone(),
            }
        })?;

        let text = body
            .content
            .into_iter()
            .filter(|b| b.block_type == "text")
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(RawCompletion {
            raw_text: text,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicErrorDetail,
}

#[derive(Deserialize)]
struct AnthropicErrorDetail {
    #[serde(default)]
    message: String,
}
