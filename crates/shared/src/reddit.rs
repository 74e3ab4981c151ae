use std::collections::VecDeque;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{Result, StoryError};
use crate::models::{SourceComment, SourcePost};
use crate::source::{
    select_top_comments, timestamp_to_utc, unavailable, ContentSource, RawComment, TimeWindow,
    DELETED_MARKER, REMOVED_MARKER,
};

pub const REDDIT_AUTH_BASE: &str = "https://www.reddit.com";
pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
struct Thing<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: String,
    title: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    selftext: String,
}

/// Read-only Reddit client using application-only OAuth.
pub struct RedditClient {
    client: Client,
    client_id: String,
    client_secret: String,
    user_agent: String,
    min_comment_score: i64,
    auth_base: String,
    api_base: String,
    token: OnceCell<String>,
}

impl RedditClient {
    pub fn new(config: &Config) -> Result<Self> {
        if config.reddit.client_id.is_empty() || config.reddit.client_secret.is_empty() {
            return Err(StoryError::Configuration(
                "REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET are required".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(config.reddit.user_agent.clone())
            .build()
            .map_err(|e| {
                StoryError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            "Reddit client initialized with user agent: {}",
            config.reddit.user_agent
        );

        Ok(Self {
            client,
            client_id: config.reddit.client_id.clone(),
            client_secret: config.reddit.client_secret.clone(),
            user_agent: config.reddit.user_agent.clone(),
            min_comment_score: config.story.min_comment_score,
            auth_base: REDDIT_AUTH_BASE.to_string(),
            api_base: REDDIT_API_BASE.to_string(),
            token: OnceCell::new(),
        })
    }

    /// Point the client at different hosts (used against mock servers).
    pub fn with_base_urls(
        mut self,
        auth_base: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        self.auth_base = auth_base.into().trim_end_matches('/').to_string();
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn access_token(&self) -> Result<&str> {
        self.token
            .get_or_try_init(|| self.request_token())
            .await
            .map(String::as_str)
    }

    async fn request_token(&self) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/v1/access_token", self.auth_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| unavailable("Failed to request Reddit access token", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(StoryError::SourceUnavailable(format!(
                "Reddit auth returned error: {} - {}",
                status, error_text
            )));
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| unavailable("Failed to parse Reddit auth response", e))?;

        token.access_token.ok_or_else(|| {
            StoryError::SourceUnavailable(format!(
                "Reddit auth returned no token: {}",
                token.error.unwrap_or_else(|| "unknown error".to_string())
            ))
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let token = self.access_token().await?;
        let url = format!("{}{}", self.api_base, path_and_query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| unavailable("Failed to reach Reddit", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            return Err(StoryError::SourceUnavailable(format!(
                "Reddit API returned error: {} - {}",
                status, error_text
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| unavailable("Failed to parse Reddit API response", e))
    }
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn fetch_ranked_posts(
        &self,
        collection: &str,
        count: usize,
        window: TimeWindow,
    ) -> Result<Vec<SourcePost>> {
        let path = format!(
            "/r/{}/top?t={}&limit={}&raw_json=1",
            urlencoding::encode(collection),
            window,
            count
        );

        let listing = match self.get_json::<Listing<RawPost>>(&path).await {
            Ok(listing) => listing,
            Err(e) => {
                error!("Error fetching posts from r/{}: {}", collection, e);
                return Err(e);
            }
        };

        let posts: Vec<SourcePost> = listing
            .data
            .children
            .into_iter()
            .map(|thing| thing.data)
            .filter_map(|raw| {
                let author = raw
                    .author
                    .filter(|a| !a.is_empty() && a != DELETED_MARKER)?;
                if raw.selftext == REMOVED_MARKER {
                    return None;
                }
                debug!("Fetched post: {} (score: {})", raw.title, raw.score);
                Some(SourcePost {
                    id: raw.id,
                    title: raw.title,
                    author,
                    score: raw.score,
                    created_utc: timestamp_to_utc(raw.created_utc),
                    subreddit: collection.to_string(),
                    url: raw.url,
                    num_comments: raw.num_comments,
                })
            })
            .collect();

        info!("Fetched {} posts from r/{}", posts.len(), collection);
        Ok(posts)
    }

    async fn fetch_top_comments(&self, post_id: &str, limit: usize) -> Result<Vec<SourceComment>> {
        let path = format!(
            "/comments/{}?sort=top&raw_json=1",
            urlencoding::encode(post_id)
        );

        let listings = match self.get_json::<Vec<Value>>(&path).await {
            Ok(listings) => listings,
            Err(e) => {
                error!("Error fetching comments from post {}: {}", post_id, e);
                return Err(e);
            }
        };

        let tree = listings.get(1).ok_or_else(|| {
            StoryError::SourceUnavailable(format!("Post {} returned no comment listing", post_id))
        })?;

        let raw = flatten_comment_tree(tree);
        let comments = select_top_comments(raw, limit, self.min_comment_score);

        for comment in &comments {
            debug!(
                "Fetched comment by {} (score: {})",
                comment.author, comment.score
            );
        }
        info!(
            "Fetched {} valid comments from post {}",
            comments.len(),
            post_id
        );

        Ok(comments)
    }

    async fn test_reachability(&self) -> bool {
        match self.get_json::<Listing<RawPost>>("/hot?limit=1").await {
            Ok(listing) => {
                if let Some(thing) = listing.data.children.first() {
                    info!(
                        "Successfully connected to Reddit API. Test post: {}",
                        thing.data.title
                    );
                }
                true
            }
            Err(e) => {
                error!("Failed to connect to Reddit API: {}", e);
                false
            }
        }
    }
}

/// Breadth-first walk of a comment listing. "more" placeholders are skipped.
fn flatten_comment_tree(listing: &Value) -> Vec<RawComment> {
    let mut queue: VecDeque<&Value> = children(listing).collect();
    let mut comments = Vec::new();

    while let Some(node) = queue.pop_front() {
        if node["kind"] != "t1" {
            continue;
        }

        let data = &node["data"];
        match RawComment::deserialize(data) {
            Ok(comment) => comments.push(comment),
            Err(e) => debug!("Skipping malformed comment: {}", e),
        }

        queue.extend(children(&data["replies"]));
    }

    comments
}

fn children(listing: &Value) -> impl Iterator<Item = &Value> {
    listing["data"]["children"]
        .as_array()
        .into_iter()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_config() -> Config {
        Config::from_lookup(|key| match key {
            "REDDIT_CLIENT_ID" => Some("id".to_string()),
            "REDDIT_CLIENT_SECRET" => Some("secret".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn comment(id: &str, author: &str, body: &str, score: i64, replies: Value) -> Value {
        json!({
            "kind": "t1",
            "data": {
                "id": id,
                "author": author,
                "body": body,
                "score": score,
                "created_utc": 1_700_000_000.0,
                "parent_id": "t3_abc",
                "replies": replies
            }
        })
    }

    fn listing(children: Vec<Value>) -> Value {
        json!({ "kind": "Listing", "data": { "children": children } })
    }

    async fn mock_token(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/api/v1/access_token")
            .match_body("grant_type=client_credentials")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "tok", "token_type": "bearer"}"#)
            .create_async()
            .await
    }

    #[test]
    fn test_flatten_is_breadth_first_and_skips_more() {
        let tree = listing(vec![
            comment(
                "a",
                "alice",
                "top level comment a with text",
                10,
                listing(vec![
                    comment("a1", "carol", "reply to a with enough text", 5, json!("")),
                    json!({ "kind": "more", "data": { "children": ["x", "y"] } }),
                ]),
            ),
            comment("b", "bob", "top level comment b with text", 20, json!("")),
            json!({ "kind": "more", "data": { "children": ["z"] } }),
        ]);

        let ids: Vec<String> = flatten_comment_tree(&tree)
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "a1"]);
    }

    #[test]
    fn test_missing_credentials_fail_at_construction() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert!(matches!(
            RedditClient::new(&config),
            Err(StoryError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_ranked_posts_drops_deleted_and_removed() {
        let mut server = mockito::Server::new_async().await;
        let token = mock_token(&mut server).await;
        let posts = server
            .mock("GET", "/r/AskReddit/top")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("t".into(), "week".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "3".into()),
            ]))
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(
                listing(vec![
                    json!({"kind": "t3", "data": {"id": "p1", "title": "Keep me", "author": "op",
                        "score": 900, "created_utc": 1_700_000_000.0, "url": "https://reddit.com/p1",
                        "num_comments": 40, "selftext": ""}}),
                    json!({"kind": "t3", "data": {"id": "p2", "title": "Gone", "author": "[deleted]",
                        "score": 800, "created_utc": 1_700_000_000.0, "url": "u", "num_comments": 4}}),
                    json!({"kind": "t3", "data": {"id": "p3", "title": "Removed", "author": "op2",
                        "score": 700, "created_utc": 1_700_000_000.0, "url": "u", "num_comments": 9,
                        "selftext": "[removed]"}}),
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = RedditClient::new(&test_config())
            .unwrap()
            .with_base_urls(server.url(), server.url());
        let result = client
            .fetch_ranked_posts("AskReddit", 3, TimeWindow::Week)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "p1");
        assert_eq!(result[0].subreddit, "AskReddit");
        assert_eq!(result[0].num_comments, 40);
        token.assert_async().await;
        posts.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_top_comments_filters_and_ranks() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let body = json!([
            listing(vec![]),
            listing(vec![
                comment("c1", "alice", "A perfectly reasonable comment.", 275, json!("")),
                comment("c2", "AutoModerator", "Please remember the subreddit rules.", 9999, json!("")),
                comment(
                    "c3",
                    "bob",
                    "Another long enough comment.\nEDIT: thanks kind stranger",
                    500,
                    listing(vec![comment("c4", "carol", "Nested reply with enough text.", 350, json!(""))]),
                ),
                comment("c5", "dave", "short", 800, json!("")),
            ]),
        ]);
        let _comments = server
            .mock("GET", "/comments/abc")
            .match_query(mockito::Matcher::UrlEncoded("sort".into(), "top".into()))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = RedditClient::new(&test_config())
            .unwrap()
            .with_base_urls(server.url(), server.url());
        let result = client.fetch_top_comments("abc", 5).await.unwrap();

        let ids: Vec<&str> = result.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c3", "c4", "c1"]);
        assert_eq!(result[0].body, "Another long enough comment.");
        assert!(result[0].is_top_level);
    }

    #[tokio::test]
    async fn test_remote_error_is_source_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _posts = server
            .mock("GET", mockito::Matcher::Regex("^/r/.*".into()))
            .with_status(503)
            .with_body("try later")
            .create_async()
            .await;

        let client = RedditClient::new(&test_config())
            .unwrap()
            .with_base_urls(server.url(), server.url());
        let err = client
            .fetch_ranked_posts("AskReddit", 5, TimeWindow::Day)
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_reachability_reports_false_on_auth_failure() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/api/v1/access_token")
            .with_status(401)
            .create_async()
            .await;

        let client = RedditClient::new(&test_config())
            .unwrap()
            .with_base_urls(server.url(), server.url());
        assert!(!client.test_reachability().await);
    }

    #[tokio::test]
    async fn test_fetch_ranked_posts_empty_listing_is_ok() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _posts = server
            .mock("GET", "/r/quietsub/top")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(listing(vec![]).to_string())
            .create_async()
            .await;

        let client = RedditClient::new(&test_config())
            .unwrap()
            .with_base_urls(server.url(), server.url());
        let posts = client
            .fetch_ranked_posts("quietsub", 10, TimeWindow::Day)
            .await
            .unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_ranked_posts_all_ineligible_is_ok() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _posts = server
            .mock("GET", "/r/AskReddit/top")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                listing(vec![
                    json!({"kind": "t3", "data": {"id": "p1", "title": "Gone", "author": "[deleted]",
                        "score": 10, "num_comments": 30}}),
                    json!({"kind": "t3", "data": {"id": "p2", "title": "Removed", "author": "op",
                        "score": 10, "num_comments": 30, "selftext": "[removed]"}}),
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = RedditClient::new(&test_config())
            .unwrap()
            .with_base_urls(server.url(), server.url());
        let posts = client
            .fetch_ranked_posts("AskReddit", 10, TimeWindow::Day)
            .await
            .unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn test_reachability_reports_true_when_hot_listing_loads() {
        let mut server = mockito::Server::new_async().await;
        let token = mock_token(&mut server).await;
        let hot = server
            .mock("GET", "/hot")
            .match_query(mockito::Matcher::UrlEncoded("limit".into(), "1".into()))
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(
                listing(vec![json!({"kind": "t3", "data": {"id": "h1", "title": "Hot post"}})])
                    .to_string(),
            )
            .create_async()
            .await;

        let client = RedditClient::new(&test_config())
            .unwrap()
            .with_base_urls(server.url(), server.url());
        assert!(client.test_reachability().await);
        token.assert_async().await;
        hot.assert_async().await;
    }
}
