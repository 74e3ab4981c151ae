//! Content-source contract plus the comment filtering rules that every
//! source applies before handing comments to the prompt builder.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::{Result, StoryError};
use crate::models::{SourceComment, SourcePost};

/// Accounts whose comments are never story material.
pub const BOT_ACCOUNTS: &[&str] = &[
    "AutoModerator",
    "RemindMeBot",
    "WikiTextBot",
    "TotesMessenger",
    "GoodBot_BadBot",
    "B0tRank",
    "RepostSleuthBot",
];

pub const REMOVED_MARKER: &str = "[removed]";
pub const DELETED_MARKER: &str = "[deleted]";

const MIN_BODY_CHARS: usize = 20;
const MAX_BODY_CHARS: usize = 1000;
const EDIT_MARKERS: [&str; 2] = ["EDIT:", "Edit:"];

/// Ranking period for top posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
            TimeWindow::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hour" => Ok(TimeWindow::Hour),
            "day" => Ok(TimeWindow::Day),
            "week" => Ok(TimeWindow::Week),
            "month" => Ok(TimeWindow::Month),
            "year" => Ok(TimeWindow::Year),
            "all" => Ok(TimeWindow::All),
            other => Err(format!(
                "invalid time window '{}' (expected hour, day, week, month, year, or all)",
                other
            )),
        }
    }
}

/// Where posts and comments come from.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Top posts of a collection, with deleted and removed posts dropped.
    async fn fetch_ranked_posts(
        &self,
        collection: &str,
        count: usize,
        window: TimeWindow,
    ) -> Result<Vec<SourcePost>>;

    /// Highest-scoring valid comments of a post, cleaned, at most `limit`.
    async fn fetch_top_comments(&self, post_id: &str, limit: usize) -> Result<Vec<SourceComment>>;

    /// Never fails; problems are logged and reported as `false`.
    async fn test_reachability(&self) -> bool;
}

/// A comment as it comes off the wire, before filtering.
#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub id: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub parent_id: String,
}

impl RawComment {
    /// Reddit reports deleted accounts as a literal placeholder name.
    pub fn author_name(&self) -> Option<&str> {
        self.author
            .as_deref()
            .filter(|name| !name.is_empty() && *name != DELETED_MARKER)
    }
}

pub fn is_valid_comment(comment: &RawComment, min_score: i64) -> bool {
    let author = match comment.author_name() {
        Some(author) => author,
        None => return false,
    };

    let body = match comment.body.as_deref() {
        Some(body) if !body.is_empty() && body != REMOVED_MARKER && body != DELETED_MARKER => body,
        _ => return false,
    };

    if BOT_ACCOUNTS.contains(&author) {
        return false;
    }

    if comment.score < min_score {
        return false;
    }

    body.trim().chars().count() >= MIN_BODY_CHARS
}

/// Strip edit notes and blank lines, and cap very long comments.
pub fn clean_comment_body(body: &str) -> String {
    let mut cleaned = body.trim();

    for marker in EDIT_MARKERS {
        if let Some(idx) = cleaned.find(marker) {
            cleaned = cleaned[..idx].trim();
        }
    }

    let cleaned = cleaned
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    truncate_with_ellipsis(&cleaned, MAX_BODY_CHARS)
}

/// Keep the first `max_chars` characters, appending `...` if anything was cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Filter, rank by score (stable), truncate to `limit`, then clean.
pub fn select_top_comments(
    raw: Vec<RawComment>,
    limit: usize,
    min_score: i64,
) -> Vec<SourceComment> {
    let mut valid: Vec<RawComment> = raw
        .into_iter()
        .filter(|c| is_valid_comment(c, min_score))
        .collect();

    valid.sort_by(|a, b| b.score.cmp(&a.score));
    valid.truncate(limit);

    valid
        .into_iter()
        .map(|c| SourceComment {
            author: c.author_name().unwrap_or(DELETED_MARKER).to_string(),
            body: clean_comment_body(c.body.as_deref().unwrap_or_default()),
            score: c.score,
            created_utc: timestamp_to_utc(c.created_utc),
            is_top_level: c.parent_id.starts_with("t3_"),
            id: c.id,
        })
        .collect()
}

pub(crate) fn timestamp_to_utc(seconds: f64) -> DateTime<Utc> {
    let whole = seconds.trunc() as i64;
    let nanos = (seconds.fract() * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos)
        .single()
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
}

pub(crate) fn unavailable(context: &str, err: impl fmt::Display) -> StoryError {
    StoryError::SourceUnavailable(format!("{}: {}", context, err))
}
