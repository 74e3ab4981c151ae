//! Text-generation backends behind one interface.
//!
//! The backend is picked once from [`Config::provider`] by
//! [`build_provider`]; callers only ever hold a `Box<dyn GenerationProvider>`.

mod anthropic;
mod bedrock;
mod openai;

pub use anthropic::AnthropicProvider;
pub use bedrock::BedrockProvider;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use reqwest::Response;
use tracing::info;

use crate::config::{Config, ProviderKind};
use crate::error::{Result, StoryError};

pub const TEMPERATURE: f32 = 0.8;
pub const TOP_P: f32 = 0.9;
pub const PROBE_MAX_TOKENS: u32 = 10;
pub const PROBE_PROMPT: &str = "Hello";

/// System role used by chat-style providers when the caller supplies none.
pub const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are a creative storyteller who writes engaging narratives.";

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Configuration tag of this backend.
    fn name(&self) -> &str;

    /// Whether system and user text travel as separate roles.
    fn accepts_system_role(&self) -> bool;

    /// Generate a completion. `system` is only honoured when
    /// [`accepts_system_role`](Self::accepts_system_role) is true.
    async fn generate(&self, system: Option<&str>, prompt: &str, max_tokens: u32)
        -> Result<String>;

    /// Cheap connectivity check; never returns an error.
    async fn probe_connection(&self) -> bool;
}

/// Construct the configured backend. A missing credential fails here, not
/// on first use.
pub fn build_provider(config: &Config) -> Result<Box<dyn GenerationProvider>> {
    let provider: Box<dyn GenerationProvider> = match config.provider {
        ProviderKind::OpenAi => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                StoryError::Configuration("OpenAI API key not found in environment".to_string())
            })?;
            Box::new(OpenAiProvider::new(api_key, config.openai_model.clone())?)
        }
        ProviderKind::Anthropic => {
            let api_key = config.anthropic_api_key.clone().ok_or_else(|| {
                StoryError::Configuration("Anthropic API key not found in environment".to_string())
            })?;
            Box::new(AnthropicProvider::new(
                api_key,
                config.anthropic_model.clone(),
            )?)
        }
        ProviderKind::Bedrock => Box::new(BedrockProvider::new(&config.aws)?),
    };

    info!("Using {} provider", provider.name());
    Ok(provider)
}

pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| StoryError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Turn a non-2xx response into a `GenerationFailure` carrying the body.
pub(crate) async fn ensure_success(response: Response, api: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("unknown error"));
    Err(StoryError::GenerationFailure(format!(
        "{} API error ({}): {}",
        api, status, error_text
    )))
}

pub(crate) fn request_failed(api: &str, err: impl std::fmt::Display) -> StoryError {
    StoryError::GenerationFailure(format!("Failed to send request to {} API: {}", api, err))
}
