use crate::cache::FetchCache;
use crate::config::{RateLimit, ScraperConfig};
use crate::retry::retry_with_policy;
use crate::ScrapeError;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use rand::seq::SliceRandom;
use reqwest::{Client, StatusCode};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Desktop user agents rotated per client to look less like a bot.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.6778.265 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.6778.265 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.6778.265 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.6777.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
];

/// Transient statuses worth another attempt; everything else fails fast.
const RETRYABLE_STATUS: &[StatusCode] = &[
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One attempt's outcome, tagged with whether another attempt makes sense.
struct AttemptError {
    error: ScrapeError,
    transient: bool,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

fn quota_from(rate_limit: &RateLimit) -> Quota {
    let per_second = NonZeroU32::new(rate_limit.requests_per_second)
        .unwrap_or(NonZeroU32::new(2).unwrap());
    let burst = NonZeroU32::new(rate_limit.burst).unwrap_or(per_second);
    Quota::per_second(per_second).allow_burst(burst)
}

/// Page fetcher wrapping a reqwest client with retry/backoff, a global
/// token-bucket rate limit, and URL-keyed memoization.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    cache: FetchCache,
    limiter: Arc<DirectRateLimiter>,
    config: ScraperConfig,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self::with_config(&ScraperConfig::default())
    }

    pub fn with_config(config: &ScraperConfig) -> Self {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "Failed to create HTTP client");
                panic!("Failed to initialize HTTP client: {}", e);
            });

        Self::with_client(client, config)
    }

    /// Builds a fetcher around a caller-supplied client, e.g. one configured
    /// for a rendering proxy.
    pub fn with_client(client: Client, config: &ScraperConfig) -> Self {
        Self {
            client,
            cache: FetchCache::new(config.cache_capacity),
            limiter: Arc::new(RateLimiter::direct(quota_from(&config.rate_limit))),
            config: config.clone(),
        }
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Fetches a page body, memoizing successes per URL for the process
    /// lifetime. Transient failures are retried with exponential backoff;
    /// a malformed URL fails immediately without an attempt.
    #[instrument(level = "debug", skip(self), err)]
    pub async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        let _ = Url::parse(url)?;

        if let Some(cached) = self.cache.get(url) {
            debug!(url = %url, "Cache hit, skipping network fetch");
            return Ok(cached);
        }

        let result = retry_with_policy(
            &self.config.retry,
            |e: &AttemptError| e.transient,
            || self.fetch_once(url),
        )
        .await;

        match result {
            Ok(body) => {
                self.cache.insert(url.to_string(), body.clone());
                Ok(body)
            }
            Err(attempt) => {
                error!(url = %url, error = %attempt.error, "Fetch failed after retries");
                Err(attempt.error)
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String, AttemptError> {
        self.limiter.until_ready().await;
        debug!(url = %url, "Requesting page");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Request error");
            let error = if e.is_timeout() {
                ScrapeError::TimeoutError(format!("{url}: {e}"))
            } else {
                ScrapeError::FetchError(format!("{url}: {e}"))
            };
            // Network-level failures (connect, timeout) are transient.
            AttemptError {
                error,
                transient: true,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let transient = RETRYABLE_STATUS.contains(&status);
            warn!(url = %url, status = %status, transient, "Request failed");
            return Err(AttemptError {
                error: ScrapeError::FetchError(format!("{url} returned status {status}")),
                transient,
            });
        }

        let body = response.text().await.map_err(|e| AttemptError {
            error: ScrapeError::FetchError(format!("{url}: failed to read body: {e}")),
            transient: true,
        })?;

        debug!(url = %url, content_length = body.len(), "Successfully fetched page");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_fails_without_an_attempt() {
        let fetcher = Fetcher::new();
        let err = fetcher.fetch_page("not a url").await.unwrap_err();
        assert!(matches!(err, ScrapeError::UrlParseError(_)));
    }

    #[tokio::test]
    async fn cached_url_short_circuits_the_network() {
        let fetcher = Fetcher::new();
        fetcher
            .cache()
            .insert("https://example.com/".into(), "<html>hi</html>".into());
        let body = fetcher.fetch_page("https://example.com/").await.unwrap();
        assert_eq!(body, "<html>hi</html>");
    }

    #[test]
    fn retryable_status_set_is_transient_only() {
        assert!(RETRYABLE_STATUS.contains(&StatusCode::SERVICE_UNAVAILABLE));
        assert!(RETRYABLE_STATUS.contains(&StatusCode::TOO_MANY_REQUESTS));
        assert!(!RETRYABLE_STATUS.contains(&StatusCode::NOT_FOUND));
        assert!(!RETRYABLE_STATUS.contains(&StatusCode::UNAUTHORIZED));
    }
}
