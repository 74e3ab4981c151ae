use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::{
    ensure_success, http_client, request_failed, GenerationProvider, DEFAULT_SYSTEM_MESSAGE,
    PROBE_MAX_TOKENS, PROBE_PROMPT, TEMPERATURE, TOP_P,
};
use crate::error::{Result, StoryError};

const OPENAI_API_BASE: &str = "https://api.openai.com";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions backend; keeps system and user text as separate roles.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Result<Self> {
        info!("OpenAI client initialized with model: {}", model);
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| request_failed("OpenAI", e))?;

        ensure_success(response, "OpenAI")
            .await?
            .json::<ChatResponse>()
            .await
            .map_err(|e| {
                StoryError::GenerationFailure(format!("Failed to parse OpenAI response: {}", e))
            })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn accepts_system_role(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system.unwrap_or(DEFAULT_SYSTEM_MESSAGE),
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens,
            temperature: Some(TEMPERATURE),
            top_p: Some(TOP_P),
        };

        let response = self.send(&request).await.map_err(|e| {
            error!("OpenAI API error: {}", e);
            e
        })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| {
                StoryError::GenerationFailure("OpenAI response contained no choices".to_string())
            })
    }

    async fn probe_connection(&self) -> bool {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: PROBE_PROMPT,
            }],
            max_tokens: PROBE_MAX_TOKENS,
            temperature: None,
            top_p: None,
        };

        match self.send(&request).await {
            Ok(_) => {
                info!("OpenAI API connection successful");
                true
            }
            Err(e) => {
                error!("OpenAI API connection failed: {}", e);
                false
            }
        }
    }
}
