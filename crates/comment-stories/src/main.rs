use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::io::is_story_file;
use shared::source::truncate_with_ellipsis;
use shared::{
    available_styles, build_provider, save_story, write_story_file, Config, GeneratedStory,
    RedditClient, StoryComposer, TimeWindow,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const RULE_WIDTH: usize = 60;
const TEST_PROMPT: &str = "Write a one-sentence story about a robot.";
const TEST_MAX_TOKENS: u32 = 50;

#[derive(Parser)]
#[command(name = "comment-stories")]
#[command(about = "Reddit Comment Stories - Transform Reddit posts into engaging narratives")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a single story
    Generate {
        /// Subreddit to fetch posts from (defaults to DEFAULT_SUBREDDIT)
        #[arg(short = 'r', long)]
        subreddit: Option<String>,

        /// Story style
        #[arg(short, long, default_value = "engaging")]
        style: String,

        /// Time period for top posts (hour, day, week, month, year, all)
        #[arg(short, long, default_value = "day")]
        time: TimeWindow,

        /// Number of posts to check (defaults to DEFAULT_POST_LIMIT)
        #[arg(short, long)]
        posts: Option<usize>,

        /// Output file (.md or .json) or directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate multiple stories
    Batch {
        /// Subreddit to fetch posts from (defaults to DEFAULT_SUBREDDIT)
        #[arg(short = 'r', long)]
        subreddit: Option<String>,

        /// Number of posts to sample
        #[arg(short = 'n', long, default_value = "5")]
        posts: usize,

        /// Story style
        #[arg(short, long, default_value = "engaging")]
        style: String,

        /// Time period for top posts (hour, day, week, month, year, all)
        #[arg(short, long, default_value = "day")]
        time: TimeWindow,

        /// Output directory (defaults to OUTPUT_DIR)
        #[arg(short, long = "output-dir")]
        output_dir: Option<PathBuf>,
    },

    /// Test API connections
    Test {
        /// Skip the test generation call
        #[arg(long)]
        dry_run: bool,
    },

    /// List available story styles
    Styles,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if verbose {
        builder.init();
    } else {
        builder.with_target(false).without_time().init();
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Generate {
            subreddit,
            style,
            time,
            posts,
            output,
        } => {
            let subreddit = subreddit.unwrap_or_else(|| config.story.default_subreddit.clone());
            let posts = posts.unwrap_or(config.story.default_post_limit);
            cmd_generate(config, &subreddit, &style, time, posts, output).await
        }
        Command::Batch {
            subreddit,
            posts,
            style,
            time,
            output_dir,
        } => {
            let subreddit = subreddit.unwrap_or_else(|| config.story.default_subreddit.clone());
            let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
            cmd_batch(config, &subreddit, posts, &style, time, &output_dir).await
        }
        Command::Test { dry_run } => cmd_test(config, dry_run).await,
        Command::Styles => {
            cmd_styles();
            Ok(())
        }
    }
}

fn composer(config: &Config) -> Result<StoryComposer> {
    let source = RedditClient::new(config).context("Failed to create Reddit client")?;
    let provider = build_provider(config).context("Failed to create AI provider")?;
    Ok(StoryComposer::new(config, Box::new(source), provider))
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

async fn cmd_generate(
    config: &Config,
    subreddit: &str,
    style: &str,
    window: TimeWindow,
    post_limit: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    info!("🚀 Generating story from r/{}", subreddit);
    let composer = composer(config)?;

    info!("📊 Fetching top posts from the last {}...", window);
    let posts = composer
        .source()
        .fetch_ranked_posts(subreddit, post_limit, window)
        .await
        .context("Failed to fetch posts")?;

    if posts.is_empty() {
        bail!("No posts found in r/{}", subreddit);
    }

    let story = composer
        .compose_first(&posts, style)
        .await
        .context("Failed to fetch comments")?;
    let Some(story) = story else {
        bail!("Failed to generate any stories from the available posts");
    };

    print_story(&story);

    match output {
        Some(path) if is_story_file(&path) => {
            write_story_file(&story, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("📁 Story saved to: {}", path.display());
        }
        Some(dir) => save_and_report(&story, &dir)?,
        None => save_and_report(&story, &config.output_dir)?,
    }

    Ok(())
}

fn print_story(story: &GeneratedStory) {
    println!("\n{}", rule());
    println!("✨ {}", story.title);
    println!("{}\n", rule());
    println!("{}", story.content);
    println!("\n{}", rule());
    println!("📊 Story Stats:");
    println!("  • Words: {}", story.word_count);
    println!("  • Style: {}", story.style);
    println!("  • Generation time: {:.2}s", story.generation_time_secs);
    println!("  • Source: r/{}", story.source_post.subreddit);
    println!("{}", rule());
}

fn save_and_report(story: &GeneratedStory, dir: &Path) -> Result<()> {
    let (md_path, json_path) = save_story(story, dir)
        .with_context(|| format!("Failed to save story to {}", dir.display()))?;
    println!("📁 Story saved to:");
    println!("  - {}", md_path.display());
    println!("  - {}", json_path.display());
    Ok(())
}

async fn cmd_batch(
    config: &Config,
    subreddit: &str,
    post_count: usize,
    style: &str,
    window: TimeWindow,
    output_dir: &Path,
) -> Result<()> {
    info!("🚀 Batch generation from r/{}", subreddit);
    info!("📊 Processing {} posts with {} style", post_count, style);

    let composer = composer(config)?;
    let stories = composer
        .compose_many(subreddit, post_count, window, style)
        .await
        .context("Failed to fetch posts")?;

    if stories.is_empty() {
        bail!("No stories generated!");
    }

    info!("📁 Saving {} stories to {}", stories.len(), output_dir.display());
    for story in &stories {
        save_story(story, output_dir)
            .with_context(|| format!("Failed to save story {}", story.id))?;
    }

    let total_words: usize = stories.iter().map(|s| s.word_count).sum();
    let total_time: f64 = stories.iter().map(|s| s.generation_time_secs).sum();

    println!("\n{}", rule());
    println!("✅ Batch Generation Complete");
    println!("{}", rule());
    println!("  • Stories generated: {}", stories.len());
    println!("  • Average words: {}", total_words / stories.len());
    println!("  • Total generation time: {:.2}s", total_time);
    println!("  • Output directory: {}", output_dir.display());
    println!("{}", rule());

    Ok(())
}

async fn cmd_test(config: &Config, dry_run: bool) -> Result<()> {
    println!("🧪 Testing Reddit Comment Stories Setup");
    println!("{}", rule());

    println!("\n⚙️  Checking configuration...");
    if let Err(problems) = config.validate() {
        for problem in &problems {
            println!("  ✗ {}", problem);
        }
        bail!("Configuration is incomplete");
    }
    println!("✅ Configuration: OK (provider: {})", config.provider);

    let composer = composer(config)?;
    let reddit = composer.source();
    let provider = composer.provider();

    println!("\n📡 Testing Reddit API...");
    if !reddit.test_reachability().await {
        println!("❌ Reddit API: Failed");
        bail!("Reddit API is unreachable");
    }
    println!("✅ Reddit API: Connected");

    let sample = reddit
        .fetch_ranked_posts(&config.story.default_subreddit, 1, TimeWindow::Day)
        .await
        .context("Failed to fetch a sample post")?;
    if let Some(post) = sample.first() {
        println!("✅ Sample post: {}", truncate_with_ellipsis(&post.title, 50));
    }

    println!("\n🤖 Testing AI API...");
    if !provider.probe_connection().await {
        println!("❌ AI API: Failed");
        bail!("AI provider is unreachable");
    }
    println!("✅ AI API: Connected ({})", provider.name());

    if !dry_run {
        let text = provider
            .generate(None, TEST_PROMPT, TEST_MAX_TOKENS)
            .await
            .context("Test generation failed")?;
        println!("✅ Test generation: {}", truncate_with_ellipsis(&text, 50));
    }

    println!("\n✅ All systems operational!");
    Ok(())
}

fn cmd_styles() {
    println!("📝 Available Story Styles");
    println!("{}", rule());
    for (name, description) in available_styles() {
        println!("  • {:<12} - {}", name, description);
    }
    println!("{}", rule());
    println!("Use --style with any of these options (default: engaging)");
}
