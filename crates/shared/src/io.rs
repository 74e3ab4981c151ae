use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::models::GeneratedStory;

/// Render a story as a standalone Markdown document.
pub fn render_markdown(story: &GeneratedStory) -> String {
    let mut md = format!("# {}\n\n", story.title);
    md.push_str(&format!(
        "*Generated from r/{} • {} style • {} words*\n\n",
        story.source_post.subreddit,
        capitalize(story.style.name()),
        story.word_count
    ));
    md.push_str("---\n\n");
    md.push_str(&story.content);
    md.push_str("\n\n---\n\n");
    md.push_str(&format!(
        "**Source:** [{}]({})\n\n",
        story.source_post.title, story.source_post.url
    ));
    md.push_str(&format!(
        "**Generated:** {}\n",
        story.created_at.format("%Y-%m-%d %H:%M:%S")
    ));
    md.push_str(&format!("**AI Provider:** {}\n", story.provider));
    md
}

/// Write a story into `dir` as both Markdown and JSON, creating the
/// directory if needed. Returns `(markdown_path, json_path)`.
pub fn save_story(story: &GeneratedStory, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;

    let base = format!("{}_{}", story.created_at.format("%Y%m%d_%H%M%S"), story.id);
    let md_path = dir.join(format!("{}.md", base));
    let json_path = dir.join(format!("{}.json", base));

    fs::write(&md_path, render_markdown(story))?;
    fs::write(&json_path, serde_json::to_string_pretty(story)?)?;

    info!("Story saved: {}", md_path.display());
    Ok((md_path, json_path))
}

/// Write a single file whose format follows the extension: `.json` gets the
/// JSON dump, anything else gets Markdown.
pub fn write_story_file(story: &GeneratedStory, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let body = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::to_string_pretty(story)?,
        _ => render_markdown(story),
    };
    fs::write(path, body)?;

    info!("Story saved: {}", path.display());
    Ok(())
}

/// True when `path` names a single story file rather than a directory.
pub fn is_story_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("md") | Some("json")
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
