use std::collections::HashMap;
use std::fs;

use mockito::Matcher;
use serde_json::{json, Value};
use shared::providers::AnthropicProvider;
use shared::{save_story, Config, ContentSource, RedditClient, StoryComposer, StoryStyle, TimeWindow};
use tempfile::TempDir;

fn config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("REDDIT_CLIENT_ID", "id"),
        ("REDDIT_CLIENT_SECRET", "secret"),
        ("ANTHROPIC_API_KEY", "sk-ant-test"),
        ("ANTHROPIC_MODEL", "claude-test"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

fn listing(children: Vec<Value>) -> Value {
    json!({ "kind": "Listing", "data": { "children": children } })
}

fn post(id: &str, title: &str, num_comments: u64) -> Value {
    json!({"kind": "t3", "data": {
        "id": id, "title": title, "author": "op", "score": 5000,
        "created_utc": 1_700_000_000.0, "url": format!("https://reddit.com/{}", id),
        "num_comments": num_comments, "selftext": ""
    }})
}

fn comment(id: &str, author: &str, body: &str, score: i64) -> Value {
    json!({"kind": "t1", "data": {
        "id": id, "author": author, "body": body, "score": score,
        "created_utc": 1_700_000_000.0, "parent_id": "t3_x", "replies": ""
    }})
}

#[tokio::test]
async fn test_post_to_saved_story() {
    let mut reddit = mockito::Server::new_async().await;
    let mut anthropic = mockito::Server::new_async().await;

    let _token = reddit
        .mock("POST", "/api/v1/access_token")
        .with_status(200)
        .with_body(r#"{"access_token": "tok", "token_type": "bearer"}"#)
        .create_async()
        .await;

    let _posts = reddit
        .mock("GET", "/r/AskReddit/top")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            listing(vec![
                post("quiet", "Nobody answered this", 2),
                post("q1", "What's the kindest thing a stranger did for you?", 812),
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let comments = reddit
        .mock("GET", "/comments/q1")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!([
                listing(vec![]),
                listing(vec![
                    comment("c1", "ana", "A stranger paid for my groceries when my card declined.", 900),
                    comment("c2", "AutoModerator", "Reminder: please follow the rules of this sub.", 5000),
                    comment("c3", "ben", "Someone returned my lost wallet with a note inside.", 640),
                    comment("c4", "cy", "A bus driver waited for me in the pouring rain.", 410),
                    comment("c5", "dee", "[removed]", 300),
                ]),
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let generation = anthropic
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "sk-ant-test")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({"model": "claude-test", "max_tokens": 1500})),
            Matcher::Regex("wholesome story".to_string()),
            Matcher::Regex("groceries".to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"content": [{"type": "text", "text": "Kindness travelled through the city that week."}]}"#)
        .expect(1)
        .create_async()
        .await;

    let config = config();
    let source = RedditClient::new(&config)
        .unwrap()
        .with_base_urls(reddit.url(), reddit.url());
    let provider = AnthropicProvider::new("sk-ant-test".to_string(), "claude-test".to_string())
        .unwrap()
        .with_base_url(anthropic.url());
    let composer = StoryComposer::new(&config, Box::new(source), Box::new(provider));

    let posts = composer
        .source()
        .fetch_ranked_posts("AskReddit", 10, TimeWindow::Day)
        .await
        .unwrap();
    assert_eq!(posts.len(), 2);

    let story = composer
        .compose_first(&posts, "wholesome")
        .await
        .unwrap()
        .expect("one post is eligible");

    comments.assert_async().await;
    generation.assert_async().await;

    assert_eq!(story.style, StoryStyle::Wholesome);
    assert_eq!(
        story.title,
        "The Heartwarming Story of What's the kindest thing a stranger did for you"
    );
    assert_eq!(story.word_count, 7);
    assert_eq!(story.provider, "anthropic");
    let preview_ids: Vec<&str> = story.source_comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(preview_ids, vec!["c1", "c3", "c4"]);

    let out = TempDir::new().unwrap();
    let (md_path, json_path) = save_story(&story, out.path()).unwrap();

    let md = fs::read_to_string(md_path).unwrap();
    assert!(md.contains("*Generated from r/AskReddit • Wholesome style • 7 words*"));
    assert!(md.contains("(https://reddit.com/q1)"));

    let saved: Value = serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
    assert_eq!(saved["source_post"]["id"], "q1");
    assert_eq!(saved["ai_provider"], "anthropic");
}
