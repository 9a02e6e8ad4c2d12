//! Configuration for the Web of Science harvester.

use std::time::{Duration, SystemTime};

use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{Jitter, RetryDecision, RetryPolicy as _};

use crate::error::ClientError;
use crate::models::{Organization, YearRange};

/// API configuration constants.
pub mod api {
    use std::time::Duration;

    /// Base URL for the Web of Science Starter API.
    pub const BASE_URL: &str = "https://api.clarivate.com/apis/wos-starter/v1";

    /// Database queried for every search.
    pub const DATABASE: &str = "WOS";

    /// Header carrying the API credential.
    pub const API_KEY_HEADER: &str = "x-apikey";

    /// Request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Records requested per page (the API maximum).
    pub const PAGE_SIZE: u32 = 50;

    /// Default first publication year filter.
    pub const FIRST_YEAR: u16 = 1900;

    /// Default last publication year filter.
    pub const LAST_YEAR: u16 = 2030;

    /// Client-wide request budget.
    pub const REQUESTS_PER_SECOND: u32 = 5;

    /// Concurrent page fetches per organization.
    pub const MAX_CONCURRENT_PAGES: usize = 4;

    /// Organizations harvested at the same time.
    pub const MAX_CONCURRENT_ORGS: usize = 2;

    /// Maximum keepalive connections.
    pub const MAX_KEEPALIVE: usize = 10;

    /// Keepalive expiry.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);
}

/// Backoff applied to rate-limited (429) responses.
pub mod backoff {
    use std::time::Duration;

    /// Delay before the first retry.
    pub const BASE_DELAY: Duration = Duration::from_secs(1);

    /// Backoff cap.
    pub const MAX_DELAY: Duration = Duration::from_secs(120);

    /// Total attempts per page, first request included.
    pub const MAX_ATTEMPTS: u32 = 5;
}

/// Rows a single spreadsheet sheet can hold.
pub const SPREADSHEET_ROW_LIMIT: usize = 1_048_576;

/// Organizations the harvester knows about, as `(query name, display name)`.
///
/// The query name goes into the `OG=` filter; the display name tags rows.
pub const ORGANIZATIONS: &[(&str, &str)] = &[
    ("Reichman University", "Reichman University"),
    ("Sabanci University", "Sabancı University"),
    ("TOBB Ekonomi ve Teknoloji University", "TOBB Ekonomi ve Teknoloji Üniversitesi"),
    ("University of Navarra", "University of Navarra"),
    (
        "Universitat Internacional de Catalunya (UIC)",
        "Universitat Internacional de Catalunya (UIC)",
    ),
    ("Ozyegin University", "Özyeğin University"),
    ("Kadir Has University", "Kadir Has University"),
    ("Izmir Ekonomi Universitesi", "İzmir Ekonomi Üniversitesi"),
    ("Jacobs University", "Jacobs University"),
    ("Ihsan Dogramaci Bilkent University", "İhsan Doğramacı Bilkent University"),
    ("Bahcesehir University", "Bahçeşehir University"),
    ("Atilim University", "Atılım University"),
    ("Koc University", "Koç University"),
    ("Universitat Ramon Llull", "Universitat Ramon Llull"),
    ("Yasar University", "Yaşar Üniversitesi"),
    ("Dogus University", "Doğuş University"),
    ("Ted University", "TED University"),
    ("Ege University", "Ege Üniversitesi"),
    ("Dokuz Eylul University", "Dokuz Eylül Üniversitesi"),
];

/// The full organization catalog.
#[must_use]
pub fn organizations() -> Vec<Organization> {
    ORGANIZATIONS.iter().map(|(query, display)| Organization::new(*query, *display)).collect()
}

/// Look an organization up by query name or display name (case-insensitive).
#[must_use]
pub fn find_organization(name: &str) -> Option<Organization> {
    let needle = name.trim().to_lowercase();
    ORGANIZATIONS
        .iter()
        .find(|(query, display)| query.to_lowercase() == needle || display.to_lowercase() == needle)
        .map(|(query, display)| Organization::new(*query, *display))
}

/// Retry policy for rate-limited page requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Upper bound on any single wait.
    pub max_delay: Duration,

    /// Total attempts per page, first request included.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Exponential schedule `min(base_delay * 2^n, max_delay)` without jitter,
    /// allowing `max_attempts - 1` retries.
    #[must_use]
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::builder()
            .retry_bounds(self.base_delay, self.max_delay.max(self.base_delay))
            .base(2)
            .jitter(Jitter::None)
            .build_with_max_retries(self.max_attempts.saturating_sub(1))
    }

    /// Wait before the next attempt once `past_retries` retries have been
    /// spent, or `None` when the attempts are exhausted.
    #[must_use]
    pub fn delay_for(&self, past_retries: u32) -> Option<Duration> {
        let now = SystemTime::now();
        match self.backoff().should_retry(now, past_retries) {
            RetryDecision::Retry { execute_after } => {
                let wait = execute_after.duration_since(now).unwrap_or_default();
                // Drop the sub-millisecond clock drift between `now` and the decision.
                Some(Duration::from_millis(u64::try_from(wait.as_millis()).unwrap_or(u64::MAX)))
            }
            RetryDecision::DoNotRetry => None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: backoff::BASE_DELAY,
            max_delay: backoff::MAX_DELAY,
            max_attempts: backoff::MAX_ATTEMPTS,
        }
    }
}

/// Harvester configuration.
#[derive(Clone)]
pub struct Config {
    /// Web of Science API key.
    pub api_key: Option<String>,

    /// Base URL for the Starter API (for testing with mock servers).
    pub base_url: String,

    /// Request timeout.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Records requested per page.
    pub page_size: u32,

    /// Publication year filter.
    pub year_range: YearRange,

    /// Backoff for 429 responses.
    pub retry: RetryPolicy,

    /// Client-wide request budget.
    pub requests_per_second: u32,

    /// Concurrent page fetches per organization.
    pub max_concurrent_pages: usize,

    /// Organizations harvested at the same time.
    pub max_concurrent_orgs: usize,
}

impl Config {
    /// Create a new configuration with the given API key and default limits.
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: api::BASE_URL.to_string(),
            request_timeout: api::REQUEST_TIMEOUT,
            connect_timeout: api::CONNECT_TIMEOUT,
            page_size: api::PAGE_SIZE,
            year_range: YearRange::new(api::FIRST_YEAR, api::LAST_YEAR),
            retry: RetryPolicy::default(),
            requests_per_second: api::REQUESTS_PER_SECOND,
            max_concurrent_pages: api::MAX_CONCURRENT_PAGES,
            max_concurrent_orgs: api::MAX_CONCURRENT_ORGS,
        }
    }

    /// Create a test configuration pointed at a mock server.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            api_key: Some("test-key".to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryPolicy {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(20),
                max_attempts: 5,
            },
            requests_per_second: 10_000,
            ..Self::new(None)
        }
    }

    /// Create configuration from environment variables (`.env` honoured).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingApiKey`] if `WOS_API_KEY` is unset or blank.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenv::dotenv().ok();

        let api_key = std::env::var("WOS_API_KEY").ok().filter(|k| !k.trim().is_empty());
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("WOS_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the credential and base URL before any request is made.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the base URL is malformed.
    pub fn validate(&self) -> Result<(), ClientError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ClientError::MissingApiKey),
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidConfig(format!("base URL {}: {e}", self.base_url)))?;
        if self.page_size == 0 {
            return Err(ClientError::InvalidConfig("page size must be positive".to_string()));
        }
        Ok(())
    }

    /// Check if an API key is configured.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("has_api_key", &self.has_api_key())
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("year_range", &self.year_range)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Hosted language-model settings for the question loop.
#[derive(Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL.
    pub base_url: String,

    /// API key.
    pub api_key: String,

    /// Model name.
    pub model: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl LlmConfig {
    /// Default OpenAI-compatible endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Read `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns error if `OPENAI_API_KEY` is unset.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenv::dotenv().ok();

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ClientError::InvalidConfig("OPENAI_API_KEY is not set".to_string()))?;

        Ok(Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string()),
            api_key,
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| Self::DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(60),
        })
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.api_key.is_none());
        assert!(!config.has_api_key());
        assert_eq!(config.page_size, 50);
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ClientError::MissingApiKey)));

        let blank = Config::new(Some("   ".to_string()));
        assert!(matches!(blank.validate(), Err(ClientError::MissingApiKey)));

        let config = Config::new(Some("key".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = Config::new(Some("key".to_string()));
        config.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ClientError::InvalidConfig(_))));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = Config::new(Some("super-secret".to_string()));
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("has_api_key"));
    }

    #[test]
    fn test_retry_delay_doubles_then_caps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(120),
            max_attempts: 10,
        };
        assert_eq!(policy.delay_for(0), Some(Duration::from_secs(1)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(6), Some(Duration::from_secs(64)));
        assert_eq!(policy.delay_for(7), Some(Duration::from_secs(120)));
        assert_eq!(policy.delay_for(8), Some(Duration::from_secs(120)));
        assert_eq!(policy.delay_for(9), None);
    }

    #[test]
    fn test_retry_stops_after_max_attempts() {
        let policy = RetryPolicy::default();
        let waits = (0..).take_while(|n| policy.delay_for(*n).is_some()).count();
        assert_eq!(waits, backoff::MAX_ATTEMPTS as usize - 1);

        let single = RetryPolicy { max_attempts: 1, ..policy };
        assert_eq!(single.delay_for(0), None);
    }

    #[test]
    fn test_find_organization() {
        let org = find_organization("koc university").unwrap();
        assert_eq!(org.display_name, "Koç University");
        assert_eq!(find_organization("Koç University").unwrap().query_name, "Koc University");
        assert!(find_organization("Unknown University").is_none());
        assert_eq!(organizations().len(), ORGANIZATIONS.len());
    }
}
