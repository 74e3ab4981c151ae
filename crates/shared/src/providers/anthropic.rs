use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{
    ensure_success, http_client, request_failed, GenerationProvider, PROBE_MAX_TOKENS,
    PROBE_PROMPT, TEMPERATURE, TOP_P,
};
use crate::error::{Result, StoryError};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Serialize)]
pub(super) struct Message<'a> {
    pub(super) role: &'a str,
    pub(super) content: &'a str,
}

#[derive(Deserialize)]
pub(super) struct ClaudeResponse {
    pub(super) content: Vec<Content>,
}

#[derive(Deserialize)]
pub(super) struct Content {
    #[serde(default)]
    pub(super) text: String,
}

impl ClaudeResponse {
    pub(super) fn first_text(self) -> Option<String> {
        self.content
            .into_iter()
            .next()
            .map(|c| c.text.trim().to_string())
    }
}

/// Messages API backend; receives the whole prompt as one user message.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        info!("Anthropic client initialized with model: {}", model);
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
            base_url: ANTHROPIC_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn send(&self, request: &ClaudeRequest<'_>) -> Result<ClaudeResponse> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| request_failed("Claude", e))?;

        ensure_success(response, "Claude")
            .await?
            .json::<ClaudeResponse>()
            .await
            .map_err(|e| {
                StoryError::GenerationFailure(format!("Failed to parse Claude API response: {}", e))
            })
    }
}

#[async_trait]
impl GenerationProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn accepts_system_role(&self) -> bool {
        false
    }

    async fn generate(
        &self,
        _system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let request = ClaudeRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: Some(TEMPERATURE),
            top_p: Some(TOP_P),
        };

        let response = self.send(&request).await.map_err(|e| {
            error!("Anthropic API error: {}", e);
            e
        })?;

        response.first_text().ok_or_else(|| {
            StoryError::GenerationFailure("Claude response contained no content".to_string())
        })
    }

    async fn probe_connection(&self) -> bool {
        let request = ClaudeRequest {
            model: &self.model,
            max_tokens: PROBE_MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content: PROBE_PROMPT,
            }],
            temperature: None,
            top_p: None,
        };

        match self.send(&request).await {
            Ok(_) => {
                info!("Anthropic API connection successful");
                true
            }
            Err(e) => {
                error!("Anthropic API connection failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn provider(server: &mockito::ServerGuard) -> AnthropicProvider {
        AnthropicProvider::new("key".to_string(), "claude-test".to_string())
            .unwrap()
            .with_base_url(server.url())
    }

    #[tokio::test]
    async fn test_generate_sends_single_user_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "key")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(Matcher::PartialJson(json!({
                "model": "claude-test",
                "max_tokens": 1500,
                "temperature": 0.8,
                "top_p": 0.9,
                "messages": [{"role": "user", "content": "system\n\nuser"}]
            })))
            .with_status(200)
            .with_body(r#"{"content": [{"type": "text", "text": "\nThe tale begins.\n"}]}"#)
            .create_async()
            .await;

        let text = provider(&server)
            .generate(Some("ignored"), "system\n\nuser", 1500)
            .await
            .unwrap();

        assert_eq!(text, "The tale begins.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_propagates_api_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(429)
            .with_body(r#"{"type": "error", "error": {"type": "rate_limit_error"}}"#)
            .expect(1)
            .create_async()
            .await;

        let err = provider(&server).generate(None, "hi", 50).await.unwrap_err();
        assert!(err.to_string().contains("rate_limit_error"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_content_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content": []}"#)
            .create_async()
            .await;

        let err = provider(&server).generate(None, "hi", 50).await.unwrap_err();
        assert!(matches!(err, StoryError::GenerationFailure(_)));
    }

    #[tokio::test]
    async fn test_probe_connection() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::PartialJson(json!({"max_tokens": 10})))
            .with_status(200)
            .with_body(r#"{"content": [{"type": "text", "text": "Hello!"}]}"#)
            .create_async()
            .await;

        assert!(provider(&server).probe_connection().await);
        mock.assert_async().await;
    }
}
