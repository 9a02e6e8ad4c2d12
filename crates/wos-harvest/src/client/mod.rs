//! Web of Science Starter API client.
//!
//! Provides async HTTP client with:
//! - Connection pooling via reqwest
//! - Per-page retry on 429 with capped exponential backoff
//! - Client-wide request pacing shared across concurrent fetches
//! - Bounded fan-out over the pages of one query

mod middleware;

pub use middleware::RequestPacer;

use std::time::SystemTime;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest_retry::{RetryDecision, RetryPolicy as _};

use crate::config::{Config, RetryPolicy, api};
use crate::error::{ClientError, ClientResult, PipelineError, PipelineResult};
use crate::models::{FailedPage, Harvest, HarvestReport, Page, SearchQuery, SearchResponse};

/// Outcome of fetching one page, retries included.
#[derive(Debug)]
pub struct PageFetch {
    /// One-based page number.
    pub page: u32,

    /// Final response or the error that dropped the page.
    pub result: ClientResult<SearchResponse>,

    /// Backoff waits taken for this page.
    pub backoff_waits: u32,
}

/// Web of Science API client.
#[derive(Clone)]
pub struct WosClient {
    /// HTTP client.
    client: Client,

    /// Shared request pacer.
    pacer: RequestPacer,

    /// Starter API base URL.
    base_url: String,

    /// Backoff for 429 responses.
    retry: RetryPolicy,

    /// Concurrent page fetches per query.
    max_concurrent_pages: usize,
}

impl WosClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingApiKey`] without touching the network when
    /// no credential is configured, or an error if HTTP client initialization fails.
    pub fn new(config: &Config) -> ClientResult<Self> {
        config.validate()?;

        let key = config.api_key.as_deref().ok_or(ClientError::MissingApiKey)?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            api::API_KEY_HEADER,
            HeaderValue::from_str(key.trim())
                .map_err(|e| ClientError::InvalidConfig(format!("API key: {e}")))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(api::MAX_KEEPALIVE)
            .pool_idle_timeout(api::KEEPALIVE_EXPIRY)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            pacer: RequestPacer::per_second(config.requests_per_second),
            base_url: config.base_url.clone(),
            retry: config.retry,
            max_concurrent_pages: config.max_concurrent_pages.max(1),
        })
    }

    /// Retry policy in effect.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Issue a single search request for one page, without retrying.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status or undecodable body.
    pub async fn search(&self, query: &SearchQuery, page: u32) -> ClientResult<SearchResponse> {
        let url = format!("{}/documents", self.base_url);
        let params = [
            ("db", api::DATABASE.to_string()),
            ("q", query.expression()),
            ("limit", query.page_size.to_string()),
            ("page", page.to_string()),
        ];

        self.pacer.ready().await;

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::status(status.as_u16(), text));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(ClientError::from)
    }

    /// Fetch one page, backing off and retrying while the API answers 429.
    ///
    /// Any other failure is returned at once. No wait follows the final attempt.
    pub async fn fetch_page(&self, query: &SearchQuery, page: u32) -> PageFetch {
        let backoff = self.retry.backoff();
        let started = SystemTime::now();
        let mut past_retries = 0;

        loop {
            tracing::debug!(
                organization = %query.organization.display_name,
                page,
                attempt = past_retries + 1,
                max_attempts = self.retry.max_attempts,
                "Fetching page"
            );

            let err = match self.search(query, page).await {
                Err(err) if err.is_retryable() => err,
                result => return PageFetch { page, result, backoff_waits: past_retries },
            };

            let RetryDecision::Retry { execute_after } = backoff.should_retry(started, past_retries) else {
                tracing::warn!(
                    organization = %query.organization.display_name,
                    page,
                    error = %err,
                    "Rate limited on final attempt"
                );
                return PageFetch {
                    page,
                    result: Err(ClientError::RateLimited { attempts: past_retries + 1 }),
                    backoff_waits: past_retries,
                };
            };

            let delay = execute_after.duration_since(SystemTime::now()).unwrap_or_default();
            tracing::warn!(
                organization = %query.organization.display_name,
                page,
                attempt = past_retries + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Rate limited, backing off"
            );
            tokio::time::sleep(delay).await;
            past_retries += 1;
        }
    }

    /// Fetch every record matching the query.
    ///
    /// Page 1 determines the page count and must succeed; later pages run with
    /// bounded concurrency and are reassembled in page order. Pages that fail
    /// are listed in the report instead of aborting the run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FirstPage`] if page 1 cannot be fetched.
    pub async fn harvest(&self, query: &SearchQuery) -> PipelineResult<Harvest> {
        let organization = &query.organization.display_name;
        let first = self.fetch_page(query, 1).await;

        let mut report = HarvestReport { backoff_waits: first.backoff_waits, ..Default::default() };
        let first_response = first.result.map_err(|source| {
            tracing::error!(organization = %organization, error = %source, "First page failed");
            PipelineError::FirstPage { organization: organization.clone(), source }
        })?;

        let metadata = first_response.metadata;
        report.total_records = metadata.total;
        report.total_pages = query.page_count(metadata.total, metadata.limit);
        report.fetched_pages = 1;

        tracing::info!(
            organization = %organization,
            total_records = metadata.total,
            per_page = metadata.limit,
            total_pages = report.total_pages,
            "Harvest started"
        );

        let mut pages = vec![Page { number: 1, records: first_response.hits }];

        let rest: Vec<PageFetch> = stream::iter(2..=report.total_pages)
            .map(|page| self.fetch_page(query, page))
            .buffered(self.max_concurrent_pages)
            .collect()
            .await;

        for fetch in rest {
            report.backoff_waits += fetch.backoff_waits;
            match fetch.result {
                Ok(response) => {
                    report.fetched_pages += 1;
                    tracing::debug!(
                        organization = %organization,
                        page = fetch.page,
                        total_pages = report.total_pages,
                        records = response.hits.len(),
                        "Page fetched"
                    );
                    pages.push(Page { number: fetch.page, records: response.hits });
                }
                Err(err) => {
                    tracing::warn!(
                        organization = %organization,
                        page = fetch.page,
                        error = %err,
                        "Page dropped"
                    );
                    report.failed_pages.push(FailedPage { page: fetch.page, reason: err.to_string() });
                }
            }
        }

        let harvest = Harvest { query: query.clone(), pages, report };
        tracing::info!(
            organization = %organization,
            records = harvest.record_count(),
            failed_pages = harvest.report.failed_pages.len(),
            backoff_waits = harvest.report.backoff_waits,
            "Harvest finished"
        );

        Ok(harvest)
    }
}

impl std::fmt::Debug for WosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WosClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("pacer", &self.pacer)
            .finish_non_exhaustive()
    }
}
