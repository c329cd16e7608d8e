//! Reddit subreddit search through the OAuth API

use super::{DataSource, SourceContext, finalize};
use crate::error::{FinanceError, Result};
use crate::http::read_body;
use crate::model::{FetchRequest, Payload, Record, SocialPost, SourceKind, Symbol};
use crate::ratelimit::RateGate;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const OAUTH_BASE_URL: &str = "https://oauth.reddit.com";
const PERMALINK_BASE: &str = "https://www.reddit.com";

/// Conservative share of Reddit's 100 requests per minute OAuth allowance
const REQUESTS_PER_MINUTE: u32 = 60;

/// Refresh tokens this long before Reddit expires them
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: u64,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: PostData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostData {
    id: String,
    subreddit: String,
    title: String,
    selftext: String,
    author: String,
    score: i64,
    num_comments: u64,
    permalink: String,
    created_utc: f64,
}

struct AccessToken {
    value: String,
    /// `None` when the expiry could not be represented; refreshed on next use
    refresh_at: Option<Instant>,
}

impl AccessToken {
    fn new(value: String, issued_at: Instant, expires_in: u64) -> Self {
        Self {
            value,
            refresh_at: refresh_deadline(issued_at, expires_in),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.refresh_at.is_some_and(|deadline| now < deadline)
    }
}

/// When a token issued at `issued_at` should be replaced
fn refresh_deadline(issued_at: Instant, expires_in: u64) -> Option<Instant> {
    let lifetime = Duration::from_secs(expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
    issued_at.checked_add(lifetime)
}

/// Merge per-subreddit search results
///
/// Failed subreddits are logged and skipped. An error is returned only when
/// every subreddit failed.
fn combine_searches(results: Vec<(String, Result<Vec<Record>>)>) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0usize;

    for (subreddit, result) in results {
        match result {
            Ok(found) => {
                succeeded += 1;
                records.extend(found);
            }
            Err(e) => {
                warn!(%subreddit, error = %e, "subreddit search failed");
                last_error = Some(e);
            }
        }
    }

    if succeeded == 0 {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    // The same post can match in a cross-posted subreddit search
    records.sort_by_key(Record::dedup_key);
    records.dedup_by(|a, b| a.dedup_key() == b.dedup_key());
    Ok(records)
}

/// Reddit post source (requires `REDDIT_CLIENT_ID` and `REDDIT_CLIENT_SECRET`)
pub struct RedditSource {
    client: Client,
    client_id: String,
    client_secret: String,
    user_agent: String,
    subreddits: Vec<String>,
    gate: RateGate,
    token: Mutex<Option<AccessToken>>,
}

impl RedditSource {
    pub fn new(context: &SourceContext) -> Result<Self> {
        let credentials = &context.config.credentials;
        let (client_id, client_secret) = credentials.reddit()?;

        Ok(Self {
            client: context.client.clone(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            user_agent: credentials.reddit_user_agent.clone(),
            subreddits: context.config.reddit_subreddits.clone(),
            gate: RateGate::per_minute(REQUESTS_PER_MINUTE).with_budget(context.budget.clone()),
            token: Mutex::new(None),
        })
    }

    /// Subreddits searched on each fetch
    pub fn subreddits(&self) -> &[String] {
        &self.subreddits
    }

    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(current.value.clone());
        }

        self.gate.acquire().await;
        debug!("requesting Reddit access token");

        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(USER_AGENT, &self.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let body = read_body(SourceKind::Reddit, response).await?;
        let (value, expires_in) = parse_token(&body)?;

        *token = Some(AccessToken::new(value.clone(), Instant::now(), expires_in));
        Ok(value)
    }

    async fn search(&self, subreddit: &str, token: &str, symbol: &Symbol) -> Result<Vec<Record>> {
        self.gate.acquire().await;
        debug!(%subreddit, %symbol, "searching subreddit");

        let response = self
            .client
            .get(format!("{OAUTH_BASE_URL}/r/{subreddit}/search"))
            .bearer_auth(token)
            .header(USER_AGENT, &self.user_agent)
            .query(&[
                ("q", symbol.as_str()),
                ("restrict_sr", "1"),
                ("sort", "new"),
                ("limit", "100"),
                ("t", "year"),
            ])
            .send()
            .await?;

        let body = read_body(SourceKind::Reddit, response).await?;
        parse_listing(symbol, &body)
    }
}

/// Parse the token endpoint body into `(access_token, expires_in_secs)`
pub fn parse_token(body: &str) -> Result<(String, u64)> {
    let response: TokenResponse = serde_json::from_str(body)?;
    match (response.access_token, response.error) {
        (Some(token), _) if !token.is_empty() => Ok((token, response.expires_in)),
        (_, Some(error)) => Err(FinanceError::Api {
            vendor: SourceKind::Reddit,
            message: format!("token request rejected: {error}"),
        }),
        _ => Err(FinanceError::Api {
            vendor: SourceKind::Reddit,
            message: "token response carried no access_token".to_string(),
        }),
    }
}

/// Parse a search listing into post records
pub fn parse_listing(symbol: &Symbol, body: &str) -> Result<Vec<Record>> {
    let listing: Listing = serde_json::from_str(body)?;

    let records = listing
        .data
        .children
        .into_iter()
        .filter_map(|child| {
            let post = child.data;
            let timestamp = DateTime::from_timestamp(post.created_utc as i64, 0)?;
            Some(Record::new(
                symbol.clone(),
                SourceKind::Reddit,
                timestamp,
                Payload::Post(SocialPost {
                    id: post.id,
                    subreddit: post.subreddit,
                    title: post.title,
                    body: post.selftext,
                    author: post.author,
                    score: post.score,
                    comments: post.num_comments,
                    url: format!("{PERMALINK_BASE}{}", post.permalink),
                }),
            ))
        })
        .collect();

    Ok(records)
}

#[async_trait]
impl DataSource for RedditSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Reddit
    }

    /// Search every configured subreddit
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>> {
        let token = self.access_token().await?;

        let mut results = Vec::with_capacity(self.subreddits.len());
        for subreddit in &self.subreddits {
            let result = self.search(subreddit, &token, &request.symbol).await;
            results.push((subreddit.clone(), result));
        }

        let records = combine_searches(results)?;
        Ok(finalize(records, request))
    }
}
