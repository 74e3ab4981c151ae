// Public modules
pub mod config;
pub mod error;
pub mod generator;
pub mod io;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod reddit;
pub mod source;

// Re-export commonly used types
pub use config::{Config, ProviderKind};
pub use error::{Result, StoryError};
pub use generator::StoryComposer;
pub use io::{render_markdown, save_story, write_story_file};
pub use models::{CommentPreview, GeneratedStory, PostSnapshot, SourceComment, SourcePost};
pub use prompt::{available_styles, PromptBuilder, PromptSpec, StoryStyle};
pub use providers::{build_provider, GenerationProvider};
pub use reddit::RedditClient;
pub use source::{ContentSource, TimeWindow};
