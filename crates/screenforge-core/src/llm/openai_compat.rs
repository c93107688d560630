//! OpenAI-compatible provider client (C1).
//!
//! Covers OpenAI, Azure OpenAI, and any other endpoint that speaks the
//! chat completions wire format — they differ only in base URL and
//! bearer token.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::{GenerationParams, ProviderClient, RawCompletion};
use crate::error::ProviderError;

/// Provider client for any OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    provider_name: String,
}

impl OpenAiCompatClient {
    pub fn new(base_url: String, api_key: String, provider_name: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            provider_name,
        }
    }
}

#[async_trait::async_trait]
impl ProviderClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(
        &self,
        model_id: &str,
        system_prompt: &str,
        user_message: &str,
        params: &GenerationParams,
    ) -> Result<RawCompletion, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system_prompt,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user_message,
        });

        let request = ChatCompletionRequest {
            model: model_id,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let started = Instant::now();

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(std::time::Duration::from_secs(params.timeout_secs))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());
                return Err(ProviderError::RateLimited {
                    retry_after_secs: retry_after.or(Some(60)),
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
        let body: ChatCompletionResponse = serde_json::from_str(&raw_body).map_err(|_| {
            ProviderError::InvalidResponse {
                raw: raw_body.clone(),
            }
        })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        Ok(RawCompletion {
            raw_text: text,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn complete_success() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "choices": [{"message": {"content": "Hello world"}}],
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::new(server.uri(), "test-key".into(), "openai".into());

        let resp = client
            .complete("gpt-4o-mini", "system", "hello", &GenerationParams::default())
            .await
            .expect("complete");

        assert_eq!(resp.raw_text, "Hello world");
    }

    #[tokio::test]
    async fn empty_system_prompt_is_omitted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "OK"}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::new(server.uri(), "key".into(), "openai".into());

        let resp = client
            .complete("model", "", "hello", &GenerationParams::default())
            .await
            .expect("complete");

        assert_eq!(resp.raw_text, "OK");
    }

    #[tokio::test]
    async fn error_429_maps_to_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .append_header("retry-after", "30")
                    .set_body_string("rate limited"),
            )
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::new(server.uri(), "key".into(), "openai".into());

        let err = client
            .complete("model", "system", "hello", &GenerationParams::default())
            .await
            .unwrap_err();

        match err {
            ProviderError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, Some(30)),
            other => panic!("expected RateLimited, got: {other}"),
        }
    }

    #[tokio::test]
    async fn error_401_maps_to_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::new(server.uri(), "bad-key".into(), "openai".into());

        let err = client
            .complete("model", "system", "hello", &GenerationParams::default())
            .await
            .unwrap_err();

        match err {
            ProviderError::Auth { message } => assert!(message.contains("invalid api key")),
            other => panic!("expected Auth, got: {other}"),
        }
    }

    #[tokio::test]
    async fn error_500_maps_to_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::new(server.uri(), "key".into(), "openai".into());

        let err = client
            .complete("model", "system", "hello", &GenerationParams::default())
            .await
            .unwrap_err();

        match err {
            ProviderError::Server { status, .. } => assert_eq!(status, 500),
            other => panic!("expected Server, got: {other}"),
        }
    }

    #[test]
    fn provider_name() {
        let client = OpenAiCompatClient::new("http://localhost".into(), "key".into(), "ollama".into());
        assert_eq!(client.name(), "ollama");
    }
}
