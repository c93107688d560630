//! Google Generative Language API provider client (C1).
//!
//! Gemini's REST API differs from both Anthropic and the OpenAI chat
//! format: the model id is part of the URL path, the API key rides in
//! the `x-goog-api-key` header (not the body or query string, per
//! §6.1), and generation config is a nested object rather than
//! top-level fields.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::{GenerationParams, ProviderClient, RawCompletion};
use crate::error::ProviderError;

const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: GOOGLE_BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl ProviderClient for GoogleClient {
    fn name(&self) -> &str {
        "google"
    }

    async fn complete(
        &self,
        model_id: &str,
        system_prompt: &str,
        user_message: &str,
        params: &GenerationParams,
    ) -> Result<RawCompletion, ProviderError> {
        let request = GenerateContentRequest {
            system_instruction: if system_prompt.is_empty() {
                None
            } else {
                Some(Content {
                    parts: vec![Part {
                        text: system_prompt.to_string(),
                    }],
                })
            },
            contents: vec![Content {
                parts: vec![Part {
                    text: user_message.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: params.max_tokens,
                temperature: params.temperature,
            },
        };

        let started = Instant::now();

        let response = self
            .client
            .post(format!(
                "{}/models/{model_id}:generateContent",
                self.base_url
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .timeout(std::time::Duration::from_secs(params.timeout_secs))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();

            if status == 429 {
                return Err(ProviderError::RateLimited {
                    retry_after_secs: None,
                });
            }

            let body = response.text().await.unwrap_or_default();
            if status == 401 || status == 403 {
                return Err(ProviderError::Auth { message: body });
            }
            return Err(ProviderError::Server {
                status,
                message: body,
            });
        }

        let raw_body = response.text().await?;
        let body: GenerateContentResponse = serde_json::from_str(&raw_body).map_err(|_| {
            ProviderError::InvalidResponse {
                raw: raw_body.clone(),
            }
        })?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        Ok(RawCompletion {
            raw_text: text,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}
