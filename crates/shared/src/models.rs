use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prompt::StoryStyle;

/// A ranked post as fetched from a subreddit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePost {
    pub id: String,
    pub title: String,
    pub author: String,
    pub score: i64,
    pub created_utc: DateTime<Utc>,
    pub subreddit: String,
    pub url: String,
    pub num_comments: u64,
}

/// A comment that survived filtering, with its body already cleaned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceComment {
    pub id: String,
    pub body: String,
    pub author: String,
    pub score: i64,
    pub created_utc: DateTime<Utc>,
    pub is_top_level: bool,
}

/// Snapshot of the source post stored alongside a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSnapshot {
    pub id: String,
    pub title: String,
    pub author: String,
    pub score: i64,
    pub subreddit: String,
    pub url: String,
    pub num_comments: u64,
}

impl From<&SourcePost> for PostSnapshot {
    fn from(post: &SourcePost) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            author: post.author.clone(),
            score: post.score,
            subreddit: post.subreddit.clone(),
            url: post.url.clone(),
            num_comments: post.num_comments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPreview {
    pub id: String,
    pub author: String,
    pub score: i64,
    pub preview: String,
}

/// Finished story with everything needed to render or archive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedStory {
    pub id: String,
    pub title: String,
    pub content: String,
    pub style: StoryStyle,
    pub word_count: usize,
    pub source_post: PostSnapshot,
    pub source_comments: Vec<CommentPreview>,
    /// Seconds spent waiting on the provider.
    #[serde(rename = "generation_time")]
    pub generation_time_secs: f64,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "ai_provider")]
    pub provider: String,
}
