use thiserror::Error;

/// Failure taxonomy shared by every stage of the story pipeline.
#[derive(Debug, Error)]
pub enum StoryError {
    /// Fetching posts or comments from Reddit failed.
    #[error("content source unavailable: {0}")]
    SourceUnavailable(String),

    /// Missing or malformed settings, including absent provider credentials.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The text-generation provider returned an error or an unusable response.
    #[error("generation failed: {0}")]
    GenerationFailure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoryError>;
