//! News search API client with counted, fixed-delay retry.
//!
//! # Architecture
//!
//! - [`SearchApi`]: core trait for issuing one paginated search request
//! - [`NaverSearch`]: HTTP implementation against the news search endpoint
//! - [`RetrySearch`]: decorator that retries any [`SearchApi`] a fixed number
//!   of times and can degrade an exhausted request to an empty result
//!
//! # Degraded results
//!
//! [`RetrySearch::search_or_empty`] returns an empty [`SearchResponse`] once
//! every attempt has failed. Callers cannot tell "no results" from "API
//! unreachable" by the return value; the difference is only visible in the
//! logs. The tagged [`SearchApi::search`] result is kept for callers that
//! need to know.

use crate::config::{ApiConfig, Credentials};
use crate::error::{CollectError, SearchError};
use crate::models::SearchResponse;
use crate::utils::truncate_for_log;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Trait for a single paginated search request.
pub trait SearchApi {
    /// Fetch `display` results for `query` starting at the 1-based offset `start`.
    async fn search(
        &self,
        query: &str,
        start: usize,
        display: u32,
    ) -> Result<SearchResponse, SearchError>;
}

/// HTTP client for `GET {endpoint}/news.json`.
pub struct NaverSearch {
    client: reqwest::Client,
    url: Url,
    sort: String,
    credentials: Credentials,
}

impl NaverSearch {
    pub fn new(
        api: &ApiConfig,
        request_timeout: Duration,
        credentials: Credentials,
    ) -> Result<Self, CollectError> {
        let base = api.search_endpoint.trim_end_matches('/');
        let url = Url::parse(&format!("{base}/news.json"))
            .map_err(|e| CollectError::Config(format!("api.search_endpoint '{base}': {e}")))?;
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            url,
            sort: api.sort.clone(),
            credentials,
        })
    }

    fn request_url(&self, query: &str, start: usize, display: u32) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("display", &display.to_string())
            .append_pair("start", &start.to_string())
            .append_pair("sort", &self.sort);
        url
    }
}

impl fmt::Debug for NaverSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NaverSearch")
            .field("url", &self.url.as_str())
            .field("sort", &self.sort)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl SearchApi for NaverSearch {
    #[instrument(level = "debug", skip(self, display), fields(page_size = tracing::field::Empty))]
    async fn search(
        &self,
        query: &str,
        start: usize,
        display: u32,
    ) -> Result<SearchResponse, SearchError> {
        tracing::Span::current().record("page_size", display);
        let t0 = Instant::now();
        let resp = self
            .client
            .get(self.request_url(query, start, display))
            .header("X-Naver-Client-Id", &self.credentials.client_id)
            .header("X-Naver-Client-Secret", &self.credentials.client_secret)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, 300),
            });
        }

        let parsed: SearchResponse = serde_json::from_str(&body)?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            total = parsed.total,
            items = parsed.items.len(),
            "Search page received"
        );
        Ok(parsed)
    }
}

/// Retries a [`SearchApi`] up to `max_attempts` times with a fixed delay.
pub struct RetrySearch<T> {
    inner: T,
    max_attempts: usize,
    delay: Duration,
}

impl<T> RetrySearch<T>
where
    T: SearchApi,
{
    /// Wrap `inner` with retry.
    ///
    /// # Arguments
    ///
    /// * `inner` - The search implementation to retry
    /// * `max_attempts` - Total attempts including the first; zero is treated as one
    /// * `delay` - Pause between two attempts, never after the last one
    ///
    /// # Example
    ///
    /// ```ignore
    /// let search = RetrySearch::new(NaverSearch::new(&api, timeout, creds)?, 3, Duration::from_secs(1));
    /// let page = search.search_or_empty("청도군", 1, 100).await;
    /// ```
    pub fn new(inner: T, max_attempts: usize, delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Like [`SearchApi::search`], but an exhausted request yields an empty
    /// response instead of an error.
    pub async fn search_or_empty(&self, query: &str, start: usize, display: u32) -> SearchResponse {
        match self.search(query, start, display).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(query, start, error = %e, "Search failed after retries; treating page as empty");
                SearchResponse::empty()
            }
        }
    }
}

impl<T> RetrySearch<T> {
    #[cfg(test)]
    pub(crate) fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for RetrySearch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySearch")
            .field("max_attempts", &self.max_attempts)
            .field("delay", &self.delay)
            .finish()
    }
}

impl<T> SearchApi for RetrySearch<T>
where
    T: SearchApi,
{
    async fn search(
        &self,
        query: &str,
        start: usize,
        display: u32,
    ) -> Result<SearchResponse, SearchError> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.inner.search(query, start, display).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    warn!(
                        attempt,
                        max = self.max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %e,
                        "Search attempt failed; retrying"
                    );
                    sleep(self.delay).await;
                }
            }
        }
    }
}
