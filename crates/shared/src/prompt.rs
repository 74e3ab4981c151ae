use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{SourceComment, SourcePost};
use crate::source::truncate_with_ellipsis;

const SYSTEM_FRAMING: &str = "You are a creative storyteller who transforms Reddit posts and comments \
into engaging narrative stories. You excel at weaving multiple perspectives \
into cohesive tales while maintaining the essence of the original content.";

const PROMPT_COMMENT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStyle {
    #[default]
    Engaging,
    Comedy,
    Drama,
    Documentary,
    Wholesome,
    Thriller,
}

impl StoryStyle {
    pub const ALL: [StoryStyle; 6] = [
        StoryStyle::Engaging,
        StoryStyle::Comedy,
        StoryStyle::Drama,
        StoryStyle::Documentary,
        StoryStyle::Wholesome,
        StoryStyle::Thriller,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StoryStyle::Engaging => "engaging",
            StoryStyle::Comedy => "comedy",
            StoryStyle::Drama => "drama",
            StoryStyle::Documentary => "documentary",
            StoryStyle::Wholesome => "wholesome",
            StoryStyle::Thriller => "thriller",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StoryStyle::Engaging => "A balanced, engaging narrative",
            StoryStyle::Comedy => "Humorous and light-hearted",
            StoryStyle::Drama => "Emotional and character-driven",
            StoryStyle::Documentary => "Factual and journalistic",
            StoryStyle::Wholesome => "Uplifting and positive",
            StoryStyle::Thriller => "Suspenseful and tense",
        }
    }

    /// One-sentence tonal instruction appended to the system message.
    pub fn tone(&self) -> &'static str {
        match self {
            StoryStyle::Engaging => {
                "Write in an engaging, accessible style that draws the reader in."
            }
            StoryStyle::Comedy => {
                "Write with humor and wit, finding the funny side of the situation."
            }
            StoryStyle::Drama => {
                "Create a dramatic narrative focusing on emotions and character development."
            }
            StoryStyle::Documentary => {
                "Present the story in a documentary style, as if narrating real events."
            }
            StoryStyle::Wholesome => {
                "Focus on the heartwarming and positive aspects, creating an uplifting narrative."
            }
            StoryStyle::Thriller => "Build suspense and tension throughout the narrative.",
        }
    }

    pub fn title_prefix(&self) -> &'static str {
        match self {
            StoryStyle::Engaging => "The Story of",
            StoryStyle::Comedy => "The Hilarious Tale of",
            StoryStyle::Drama => "The Dramatic Story of",
            StoryStyle::Documentary => "The True Account of",
            StoryStyle::Wholesome => "The Heartwarming Story of",
            StoryStyle::Thriller => "The Suspenseful Tale of",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.name() == name)
    }

    /// Unknown names fall back to `Engaging` with a warning; never an error.
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            warn!("Unknown style '{}', defaulting to 'engaging'", name);
            StoryStyle::Engaging
        })
    }
}

impl fmt::Display for StoryStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Post metadata echoed into the prompt for traceability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptPostData {
    pub title: String,
    pub subreddit: String,
    pub score: i64,
    pub num_comments: u64,
    pub comment_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    pub system_instruction: String,
    pub user_instruction: String,
    pub post_data: PromptPostData,
    pub style: StoryStyle,
    pub word_bounds: (usize, usize),
}

impl PromptSpec {
    /// System and user text as one block, for providers without a system role.
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.system_instruction, self.user_instruction)
    }
}

pub struct PromptBuilder {
    default_min_words: usize,
    default_max_words: usize,
}

impl PromptBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            default_min_words: config.story.min_words,
            default_max_words: config.story.max_words,
        }
    }

    pub fn build(
        &self,
        post: &SourcePost,
        comments: &[SourceComment],
        style: &str,
        min_words: Option<usize>,
        max_words: Option<usize>,
    ) -> PromptSpec {
        let min_words = min_words.unwrap_or(self.default_min_words);
        let max_words = max_words.unwrap_or(self.default_max_words);
        let style = StoryStyle::resolve(style);

        PromptSpec {
            system_instruction: format!("{} {}", SYSTEM_FRAMING, style.tone()),
            user_instruction: build_user_instruction(post, comments, style, min_words, max_words),
            post_data: PromptPostData {
                title: post.title.clone(),
                subreddit: post.subreddit.clone(),
                score: post.score,
                num_comments: post.num_comments,
                comment_count: comments.len(),
            },
            style,
            word_bounds: (min_words, max_words),
        }
    }
}

fn build_user_instruction(
    post: &SourcePost,
    comments: &[SourceComment],
    style: StoryStyle,
    min_words: usize,
    max_words: usize,
) -> String {
    let mut prompt = format!(
        "Transform this Reddit post and its top comments into a {} story.\n\n\
         **Reddit Post from r/{}:**\n\
         \"{}\"\n\n\
         **Top Comments from the community:**\n",
        style, post.subreddit, post.title
    );

    for (i, comment) in comments.iter().enumerate() {
        prompt.push_str(&format!(
            "\n{}. {}\n",
            i + 1,
            truncate_with_ellipsis(&comment.body, PROMPT_COMMENT_CHARS)
        ));
    }

    prompt.push_str(&format!(
        "\n\n**Instructions:**\n\
         - Create a cohesive narrative that naturally incorporates perspectives from all comments\n\
         - The story should flow smoothly, not just list the comments\n\
         - Maintain the spirit and tone of the original content\n\
         - Write in third person unless first person serves the narrative better\n\
         - Length: {}-{} words\n\
         - Style: {}\n\n\
         Begin the story:",
        min_words,
        max_words,
        style.description()
    ));

    prompt
}

/// Rough size of a prompt at ~4 characters per token. Advisory only.
pub fn estimate_token_count(spec: &PromptSpec) -> usize {
    let total_chars =
        spec.system_instruction.chars().count() + spec.user_instruction.chars().count();
    let estimate = total_chars / 4;
    debug!("Estimated prompt tokens: {}", estimate);
    estimate
}

pub fn available_styles() -> Vec<(&'static str, &'static str)> {
    StoryStyle::ALL
        .iter()
        .map(|style| (style.name(), style.description()))
        .collect()
}
