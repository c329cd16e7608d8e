//! Configuration for data collection

use crate::error::{FinanceError, Result};
use crate::retry::RetryPolicy;
use finance_utils::env::{lookup_bool, lookup_int, lookup_non_empty, lookup_or, process_env};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// User agent sent to Reddit when `REDDIT_USER_AGENT` is unset
pub const DEFAULT_REDDIT_USER_AGENT: &str = "Finance-Agent-System/1.0";

/// Contact string sent to SEC EDGAR when `SEC_USER_AGENT` is unset
pub const DEFAULT_SEC_USER_AGENT: &str = "finance-agent (finance-agent@example.com)";

/// Subreddits searched when `REDDIT_SUBREDDITS` is unset
pub const DEFAULT_SUBREDDITS: [&str; 3] = ["stocks", "investing", "wallstreetbets"];

/// Credential variable names, in display order
pub const CREDENTIAL_KEYS: [&str; 4] = [
    "FINNHUB_API_KEY",
    "REDDIT_CLIENT_ID",
    "REDDIT_CLIENT_SECRET",
    "SEC_USER_AGENT",
];

/// API credentials
///
/// `Debug` only reports whether each secret is present.
#[derive(Clone, Default)]
pub struct Credentials {
    pub finnhub_api_key: Option<String>,
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_user_agent: String,
    pub sec_user_agent: String,
}

impl Credentials {
    fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            finnhub_api_key: lookup_non_empty(lookup, "FINNHUB_API_KEY"),
            reddit_client_id: lookup_non_empty(lookup, "REDDIT_CLIENT_ID"),
            reddit_client_secret: lookup_non_empty(lookup, "REDDIT_CLIENT_SECRET"),
            reddit_user_agent: lookup_or(lookup, "REDDIT_USER_AGENT", DEFAULT_REDDIT_USER_AGENT),
            sec_user_agent: lookup_or(lookup, "SEC_USER_AGENT", DEFAULT_SEC_USER_AGENT),
        }
    }

    /// Finnhub API key, or `MissingCredential`
    pub fn finnhub(&self) -> Result<&str> {
        self.finnhub_api_key
            .as_deref()
            .ok_or_else(|| FinanceError::MissingCredential("FINNHUB_API_KEY".to_string()))
    }

    /// Reddit client id and secret, or `MissingCredential` naming the first absent one
    pub fn reddit(&self) -> Result<(&str, &str)> {
        let id = self
            .reddit_client_id
            .as_deref()
            .ok_or_else(|| FinanceError::MissingCredential("REDDIT_CLIENT_ID".to_string()))?;
        let secret = self
            .reddit_client_secret
            .as_deref()
            .ok_or_else(|| FinanceError::MissingCredential("REDDIT_CLIENT_SECRET".to_string()))?;
        Ok((id, secret))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn presence(value: Option<&String>) -> &'static str {
            if value.is_some() { "<set>" } else { "<unset>" }
        }

        f.debug_struct("Credentials")
            .field("finnhub_api_key", &presence(self.finnhub_api_key.as_ref()))
            .field("reddit_client_id", &presence(self.reddit_client_id.as_ref()))
            .field("reddit_client_secret", &presence(self.reddit_client_secret.as_ref()))
            .field("reddit_user_agent", &self.reddit_user_agent)
            .field("sec_user_agent", &self.sec_user_agent)
            .finish()
    }
}

/// Configuration for data collection
#[derive(Debug, Clone)]
pub struct DataConfig {
    /// Whether fetched records are cached in memory
    pub cache_enabled: bool,

    /// Lifespan of cached records
    pub cache_ttl: Duration,

    /// Whether all sources share one request budget
    pub rate_limit_enabled: bool,

    /// Size of the shared request budget
    pub max_requests_per_minute: u32,

    /// Maximum number of attempts per source call
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Upper bound on a single backoff
    pub retry_backoff_max: Duration,

    /// Request timeout duration
    pub request_timeout: Duration,

    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,

    /// Accept invalid TLS certificates
    pub ssl_verify_disabled: bool,

    /// Subreddits searched by the Reddit source
    pub reddit_subreddits: Vec<String>,

    /// Pages requested from the CNBC search feed
    pub cnbc_rounds: u32,

    pub credentials: Credentials,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            rate_limit_enabled: true,
            max_requests_per_minute: 60,
            max_retries: 3,
            retry_backoff_base: Duration::from_millis(500),
            retry_backoff_max: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            http_proxy: None,
            https_proxy: None,
            ssl_verify_disabled: false,
            reddit_subreddits: DEFAULT_SUBREDDITS.iter().map(|s| (*s).to_string()).collect(),
            cnbc_rounds: 3,
            credentials: Credentials {
                reddit_user_agent: DEFAULT_REDDIT_USER_AGENT.to_string(),
                sec_user_agent: DEFAULT_SEC_USER_AGENT.to_string(),
                ..Credentials::default()
            },
        }
    }
}

impl DataConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    /// Read configuration through an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let reddit_subreddits = lookup_non_empty(&lookup, "REDDIT_SUBREDDITS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().trim_start_matches("r/").to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.reddit_subreddits);

        let config = Self {
            cache_enabled: lookup_bool(&lookup, "CACHE_ENABLED", defaults.cache_enabled),
            cache_ttl: Duration::from_secs(lookup_int(
                &lookup,
                "CACHE_TTL",
                defaults.cache_ttl.as_secs(),
            )),
            rate_limit_enabled: lookup_bool(
                &lookup,
                "RATE_LIMIT_ENABLED",
                defaults.rate_limit_enabled,
            ),
            max_requests_per_minute: lookup_int(
                &lookup,
                "MAX_REQUESTS_PER_MINUTE",
                defaults.max_requests_per_minute,
            ),
            max_retries: lookup_int(&lookup, "MAX_RETRIES", defaults.max_retries),
            retry_backoff_base: defaults.retry_backoff_base,
            retry_backoff_max: defaults.retry_backoff_max,
            request_timeout: Duration::from_secs(lookup_int(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            http_proxy: lookup_non_empty(&lookup, "HTTP_PROXY"),
            https_proxy: lookup_non_empty(&lookup, "HTTPS_PROXY"),
            ssl_verify_disabled: lookup_bool(&lookup, "DISABLE_SSL_VERIFY", false),
            reddit_subreddits,
            cnbc_rounds: lookup_int(&lookup, "CNBC_ROUNDS", defaults.cnbc_rounds),
            credentials: Credentials::from_lookup(&lookup),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(FinanceError::Config(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(FinanceError::Config(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        if self.cache_enabled && self.cache_ttl.is_zero() {
            return Err(FinanceError::Config(
                "CACHE_TTL must be greater than 0 when caching is enabled".to_string(),
            ));
        }

        if self.cnbc_rounds == 0 {
            return Err(FinanceError::Config(
                "CNBC_ROUNDS must be greater than 0".to_string(),
            ));
        }

        for (name, proxy) in [("HTTP_PROXY", &self.http_proxy), ("HTTPS_PROXY", &self.https_proxy)] {
            if let Some(proxy) = proxy {
                url::Url::parse(proxy)
                    .map_err(|e| FinanceError::Config(format!("{name} is not a valid URL: {e}")))?;
            }
        }

        Ok(())
    }

    /// Retry policy derived from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.retry_backoff_base,
            self.retry_backoff_max,
            2.0,
        )
    }

    /// Non-sensitive settings, for display
    pub fn summary(&self) -> BTreeMap<&'static str, String> {
        let mut summary = BTreeMap::new();
        summary.insert("cache_enabled", self.cache_enabled.to_string());
        summary.insert("cache_ttl_secs", self.cache_ttl.as_secs().to_string());
        summary.insert("rate_limit_enabled", self.rate_limit_enabled.to_string());
        summary.insert(
            "max_requests_per_minute",
            self.max_requests_per_minute.to_string(),
        );
        summary.insert("max_retries", self.max_retries.to_string());
        summary.insert(
            "request_timeout_secs",
            self.request_timeout.as_secs().to_string(),
        );
        summary.insert("ssl_verify_disabled", self.ssl_verify_disabled.to_string());
        summary.insert("proxy_configured", (self.http_proxy.is_some() || self.https_proxy.is_some()).to_string());
        summary.insert("reddit_subreddits", self.reddit_subreddits.join(","));
        summary.insert("cnbc_rounds", self.cnbc_rounds.to_string());
        summary
    }
}
