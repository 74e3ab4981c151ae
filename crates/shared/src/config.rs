use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, StoryError};

/// Which text-generation backend the pipeline talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Bedrock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Bedrock => "bedrock",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "bedrock" => Ok(ProviderKind::Bedrock),
            other => Err(StoryError::Configuration(format!(
                "Unknown AI provider: {}. Use 'openai', 'anthropic', or 'bedrock'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedditSettings {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    /// Requests per minute Reddit allows us; advisory only.
    pub rate_limit: u32,
}

#[derive(Debug, Clone)]
pub struct AwsSettings {
    pub profile: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub model_id: String,
}

impl AwsSettings {
    pub(crate) fn has_credentials(&self) -> bool {
        self.profile.is_some() || self.access_key_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct StorySettings {
    pub default_subreddit: String,
    pub default_post_limit: usize,
    pub default_comment_limit: usize,
    pub min_comment_score: i64,
    pub min_words: usize,
    pub max_words: usize,
}

/// Read-only settings snapshot, loaded once at startup and passed by
/// reference into every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub reddit: RedditSettings,
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub aws: AwsSettings,
    pub ai_rate_limit: u32,
    pub app_env: String,
    pub log_level: String,
    pub story: StorySettings,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    ///
    /// Without `AI_PROVIDER` the provider is detected as Anthropic key, then
    /// OpenAI key, then AWS profile or access key, then OpenAI. An API key
    /// therefore beats an ambient `AWS_PROFILE`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let openai_api_key = get("OPENAI_API_KEY");
        let anthropic_api_key = get("ANTHROPIC_API_KEY");

        let aws = AwsSettings {
            profile: get("AWS_PROFILE"),
            region: get_or("AWS_DEFAULT_REGION", "us-east-1"),
            access_key_id: get("AWS_ACCESS_KEY_ID"),
            secret_access_key: get("AWS_SECRET_ACCESS_KEY"),
            session_token: get("AWS_SESSION_TOKEN"),
            model_id: get_or("BEDROCK_MODEL_ID", "anthropic.claude-3-sonnet-20240229-v1:0"),
        };

        let provider = match get("AI_PROVIDER") {
            Some(tag) => tag.parse()?,
            None if anthropic_api_key.is_some() => ProviderKind::Anthropic,
            None if openai_api_key.is_some() => ProviderKind::OpenAi,
            None if aws.has_credentials() => ProviderKind::Bedrock,
            None => ProviderKind::OpenAi,
        };

        let story = StorySettings {
            default_subreddit: get_or("DEFAULT_SUBREDDIT", "AskReddit"),
            default_post_limit: parse_number(&get, "DEFAULT_POST_LIMIT", 10)?,
            default_comment_limit: parse_number(&get, "DEFAULT_COMMENT_LIMIT", 5)?,
            min_comment_score: parse_number(&get, "MIN_COMMENT_SCORE", 10)?,
            min_words: parse_number(&get, "STORY_MIN_WORDS", 300)?,
            max_words: parse_number(&get, "STORY_MAX_WORDS", 500)?,
        };

        Ok(Self {
            reddit: RedditSettings {
                client_id: get_or("REDDIT_CLIENT_ID", ""),
                client_secret: get_or("REDDIT_CLIENT_SECRET", ""),
                user_agent: get_or("REDDIT_USER_AGENT", "RedditCommentStories/1.0"),
                rate_limit: parse_number(&get, "REDDIT_RATE_LIMIT", 60)?,
            },
            provider,
            openai_api_key,
            openai_model: get_or("OPENAI_MODEL", "gpt-4-turbo-preview"),
            anthropic_api_key,
            anthropic_model: get_or("ANTHROPIC_MODEL", "claude-3-opus-20240229"),
            aws,
            ai_rate_limit: parse_number(&get, "AI_RATE_LIMIT", 10)?,
            app_env: get_or("APP_ENV", "development"),
            log_level: get_or("LOG_LEVEL", "info").to_lowercase(),
            story,
            output_dir: PathBuf::from(get_or("OUTPUT_DIR", "output/stories")),
        })
    }

    /// Check that everything the selected pipeline needs is present.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.reddit.client_id.is_empty() {
            errors.push("REDDIT_CLIENT_ID is required".to_string());
        }
        if self.reddit.client_secret.is_empty() {
            errors.push("REDDIT_CLIENT_SECRET is required".to_string());
        }

        match self.provider {
            ProviderKind::OpenAi if self.openai_api_key.is_none() => {
                errors.push("OPENAI_API_KEY is required for OpenAI provider".to_string())
            }
            ProviderKind::Anthropic if self.anthropic_api_key.is_none() => {
                errors.push("ANTHROPIC_API_KEY is required for Anthropic provider".to_string())
            }
            ProviderKind::Bedrock if !self.aws.has_credentials() => errors.push(
                "AWS_PROFILE or AWS_ACCESS_KEY_ID is required for Bedrock provider".to_string(),
            ),
            _ => {}
        }

        if self.story.min_words > self.story.max_words {
            errors.push(format!(
                "STORY_MIN_WORDS ({}) must not exceed STORY_MAX_WORDS ({})",
                self.story.min_words, self.story.max_words
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn try_load_dotenv() {
        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/comment-stories/.env
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("comment-stories").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }
    }
}

fn parse_number<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            StoryError::Configuration(format!("{} must be a number, got '{}'", key, raw))
        }),
        None => Ok(default),
    }
}
