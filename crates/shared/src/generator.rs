use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::models::{CommentPreview, GeneratedStory, PostSnapshot, SourceComment, SourcePost};
use crate::prompt::{estimate_token_count, PromptBuilder, StoryStyle};
use crate::providers::GenerationProvider;
use crate::source::{truncate_with_ellipsis, ContentSource, TimeWindow};

/// Output ceiling for a story (~500 words with headroom).
pub const STORY_MAX_TOKENS: u32 = 1500;
/// Posts with fewer comments than this are not worth fetching.
pub const MIN_POST_COMMENTS: u64 = 5;
/// A story needs at least this many comments that survive filtering.
pub const MIN_VALID_COMMENTS: usize = 3;

const PREVIEW_CHARS: usize = 100;

/// Drives fetch, prompt building, and generation for one or many posts.
pub struct StoryComposer {
    source: Box<dyn ContentSource>,
    provider: Box<dyn GenerationProvider>,
    prompts: PromptBuilder,
    comment_limit: usize,
}

impl StoryComposer {
    pub fn new(
        config: &Config,
        source: Box<dyn ContentSource>,
        provider: Box<dyn GenerationProvider>,
    ) -> Self {
        Self {
            source,
            provider,
            prompts: PromptBuilder::new(config),
            comment_limit: config.story.default_comment_limit,
        }
    }

    pub fn source(&self) -> &dyn ContentSource {
        self.source.as_ref()
    }

    pub fn provider(&self) -> &dyn GenerationProvider {
        self.provider.as_ref()
    }

    /// Generate one story from a post and its already-filtered comments.
    pub async fn compose(
        &self,
        post: &SourcePost,
        comments: &[SourceComment],
        style: &str,
        min_words: Option<usize>,
        max_words: Option<usize>,
    ) -> Result<GeneratedStory> {
        let spec = self
            .prompts
            .build(post, comments, style, min_words, max_words);
        info!("Generating {} story from post: {}", spec.style, post.title);
        estimate_token_count(&spec);

        let started = Instant::now();
        let result = if self.provider.accepts_system_role() {
            self.provider
                .generate(
                    Some(&spec.system_instruction),
                    &spec.user_instruction,
                    STORY_MAX_TOKENS,
                )
                .await
        } else {
            self.provider
                .generate(None, &spec.combined(), STORY_MAX_TOKENS)
                .await
        };
        let generation_time_secs = started.elapsed().as_secs_f64();

        let content = result.map_err(|e| {
            error!("Story generation failed: {}", e);
            e
        })?;

        let word_count = content.split_whitespace().count();
        let created_at = Utc::now();

        let story = GeneratedStory {
            id: format!("{}_{}_{}", post.id, spec.style, created_at.timestamp()),
            title: story_title(&post.title, spec.style),
            content,
            style: spec.style,
            word_count,
            source_post: PostSnapshot::from(post),
            source_comments: comments.iter().map(comment_preview).collect(),
            generation_time_secs,
            created_at,
            provider: self.provider.name().to_string(),
        };

        info!(
            "Story generated successfully: {} words in {:.2}s",
            story.word_count, story.generation_time_secs
        );
        Ok(story)
    }

    /// Best-effort batch: every sampled post gets one independent attempt.
    pub async fn compose_many(
        &self,
        collection: &str,
        post_count: usize,
        window: TimeWindow,
        style: &str,
    ) -> Result<Vec<GeneratedStory>> {
        info!(
            "Generating stories from r/{} (top {} from {})",
            collection, post_count, window
        );

        let posts = self
            .source
            .fetch_ranked_posts(collection, post_count, window)
            .await?;

        let mut stories = Vec::new();
        for (i, post) in posts.iter().enumerate() {
            info!("Processing post {}/{}: {}", i + 1, posts.len(), post.title);

            let comments = match self.eligible_comments(post).await {
                Ok(Some(comments)) => comments,
                Ok(None) => continue,
                Err(e) => {
                    error!("Failed to generate story for post {}: {}", post.id, e);
                    continue;
                }
            };

            match self.compose(post, &comments, style, None, None).await {
                Ok(story) => stories.push(story),
                Err(e) => error!("Failed to generate story for post {}: {}", post.id, e),
            }
        }

        info!("Generated {} stories from r/{}", stories.len(), collection);
        Ok(stories)
    }

    /// Single-story mode: try candidates in order until one produces a story.
    /// A comment fetch failure aborts; a generation failure moves on.
    pub async fn compose_first(
        &self,
        posts: &[SourcePost],
        style: &str,
    ) -> Result<Option<GeneratedStory>> {
        for (i, post) in posts.iter().enumerate() {
            info!("Trying post {}/{}: {}", i + 1, posts.len(), post.title);

            let comments = match self.eligible_comments(post).await? {
                Some(comments) => comments,
                None => continue,
            };

            match self.compose(post, &comments, style, None, None).await {
                Ok(story) => return Ok(Some(story)),
                Err(e) => warn!("Generation failed for post {}: {}", post.id, e),
            }
        }

        Ok(None)
    }

    /// Fetch comments for a post, or `None` if the post should be skipped.
    async fn eligible_comments(&self, post: &SourcePost) -> Result<Option<Vec<SourceComment>>> {
        if post.num_comments < MIN_POST_COMMENTS {
            warn!("Skipping post with only {} comments", post.num_comments);
            return Ok(None);
        }

        let comments = self
            .source
            .fetch_top_comments(&post.id, self.comment_limit)
            .await?;

        if comments.len() < MIN_VALID_COMMENTS {
            warn!("Skipping post with only {} valid comments", comments.len());
            return Ok(None);
        }

        Ok(Some(comments))
    }
}

/// "The Hilarious Tale of X" for questions, "The Story of: X" otherwise.
pub fn story_title(post_title: &str, style: StoryStyle) -> String {
    let prefix = style.title_prefix();
    match post_title.strip_suffix('?') {
        Some(base) => format!("{} {}", prefix, base),
        None => format!("{}: {}", prefix, post_title),
    }
}

fn comment_preview(comment: &SourceComment) -> CommentPreview {
    CommentPreview {
        id: comment.id.clone(),
        author: comment.author.clone(),
        score: comment.score,
        preview: truncate_with_ellipsis(&comment.body, PREVIEW_CHARS),
    }
}
