//! Claude on AWS Bedrock through the AWS SDK.
//!
//! Credentials follow the SDK's own resolution: explicit access keys when
//! configured, otherwise the named profile from `~/.aws/config` and
//! `~/.aws/credentials` (static keys, SSO, `credential_process`, assume-role).

use async_trait::async_trait;
use aws_config::profile::profile_file::ProfileFiles;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use super::anthropic::{ClaudeResponse, Message};
use super::{GenerationProvider, TEMPERATURE, TOP_P};
use crate::config::AwsSettings;
use crate::error::{Result, StoryError};

const BEDROCK_ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
/// Substring a listed model id must contain for the connection check to pass.
const REQUIRED_MODEL_FAMILY: &str = "claude";
const STATIC_CREDENTIALS_SOURCE: &str = "comment-stories";

#[derive(Serialize)]
struct InvokeBody<'a> {
    anthropic_version: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    temperature: f32,
    top_p: f32,
}

struct BedrockClients {
    runtime: aws_sdk_bedrockruntime::Client,
    control: aws_sdk_bedrock::Client,
}

/// Managed-runtime backend; receives the whole prompt as one user message.
pub struct BedrockProvider {
    settings: AwsSettings,
    endpoint_url: Option<String>,
    profile_files: Option<ProfileFiles>,
    clients: OnceCell<BedrockClients>,
}

impl BedrockProvider {
    /// Fails when neither access keys nor a profile are configured. The SDK
    /// clients themselves are built on first use.
    pub fn new(settings: &AwsSettings) -> Result<Self> {
        if !settings.has_credentials() {
            return Err(StoryError::Configuration(
                "AWS profile not configured (set AWS_PROFILE or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY)"
                    .to_string(),
            ));
        }

        info!("Bedrock client initialized with model: {}", settings.model_id);
        Ok(Self {
            settings: settings.clone(),
            endpoint_url: None,
            profile_files: None,
            clients: OnceCell::new(),
        })
    }

    /// Send both runtime and control-plane calls to one endpoint.
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Read profiles from these files instead of the default locations.
    pub fn with_profile_files(mut self, profile_files: ProfileFiles) -> Self {
        self.profile_files = Some(profile_files);
        self
    }

    async fn sdk_config(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.settings.region.clone()))
            .retry_config(RetryConfig::disabled());

        match (
            &self.settings.access_key_id,
            &self.settings.secret_access_key,
            &self.settings.profile,
        ) {
            (Some(id), Some(secret), _) => {
                loader = loader.credentials_provider(Credentials::new(
                    id.clone(),
                    secret.clone(),
                    self.settings.session_token.clone(),
                    None,
                    STATIC_CREDENTIALS_SOURCE,
                ));
            }
            (_, _, Some(profile)) => {
                let mut provider = ProfileFileCredentialsProvider::builder().profile_name(profile);
                if let Some(files) = &self.profile_files {
                    provider = provider.profile_files(files.clone());
                }
                loader = loader.credentials_provider(provider.build());
            }
            _ => {}
        }

        if let Some(url) = &self.endpoint_url {
            loader = loader.endpoint_url(url.clone());
        }

        loader.load().await
    }

    async fn clients(&self) -> &BedrockClients {
        self.clients
            .get_or_init(|| async {
                let sdk_config = self.sdk_config().await;
                BedrockClients {
                    runtime: aws_sdk_bedrockruntime::Client::new(&sdk_config),
                    control: aws_sdk_bedrock::Client::new(&sdk_config),
                }
            })
            .await
    }

    async fn invoke(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::to_vec(&InvokeBody {
            anthropic_version: BEDROCK_ANTHROPIC_VERSION,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            top_p: TOP_P,
        })?;

        let output = self
            .clients()
            .await
            .runtime
            .invoke_model()
            .model_id(self.settings.model_id.clone())
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                StoryError::GenerationFailure(format!(
                    "Bedrock API error: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let parsed: ClaudeResponse =
            serde_json::from_slice(output.body().as_ref()).map_err(|e| {
                StoryError::GenerationFailure(format!("Failed to parse Bedrock response: {}", e))
            })?;

        parsed.first_text().ok_or_else(|| {
            StoryError::GenerationFailure("Bedrock response contained no content".to_string())
        })
    }
}

#[async_trait]
impl GenerationProvider for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
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
        self.invoke(prompt, max_tokens).await.map_err(|e| {
            error!("Bedrock API error: {}", e);
            e
        })
    }

    /// Lists foundation models instead of spending tokens on a generation.
    async fn probe_connection(&self) -> bool {
        let listing = self
            .clients()
            .await
            .control
            .list_foundation_models()
            .send()
            .await;

        match listing {
            Ok(output) => {
                let available = output
                    .model_summaries()
                    .iter()
                    .any(|m| m.model_id().to_lowercase().contains(REQUIRED_MODEL_FAMILY));
                if available {
                    info!("Bedrock API connection successful - Claude models available");
                } else {
                    warn!("Bedrock API connected but Claude models not found");
                }
                available
            }
            Err(e) => {
                error!("Bedrock API connection failed: {}", DisplayErrorContext(&e));
                false
            }
        }
    }
}
