//! Page fetching with exponential backoff retry logic.
//!
//! News sites rate-limit aggressively and their CDNs throw transient
//! errors under load, so every request goes through a retrying client
//! with a politeness delay between requests.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`FetchAsync`]: Core trait defining async page retrieval
//! - [`PageFetcher`]: Wraps a configured [`reqwest::Client`]
//! - [`RetryFetch`]: Decorator that adds retry logic to any `FetchAsync` implementation
//!
//! The crawl drivers only see `FetchAsync`, which is also what makes
//! them testable against canned fixtures.
//!
//! # Retry Strategy
//!
//! - Maximum 5 retry attempts
//! - Exponential backoff starting at 1 second
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use rand::{rng, Rng};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Desktop browser user agent; some news CDNs serve stripped-down or
/// blocked pages to obvious bots.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0 Safari/537.36";

/// Trait for async page retrieval.
///
/// Implementors fetch one URL and return its decoded body. This
/// abstraction allows decorators (like retry logic) and test doubles.
pub trait FetchAsync {
    /// Fetch a page and return its body.
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to fetch
    ///
    /// # Returns
    ///
    /// The response body as text, or an error if the request failed.
    async fn fetch(&self, url: &Url) -> Result<String, Box<dyn Error>>;
}

/// HTTP client with a politeness delay before every request.
#[derive(Debug)]
pub struct PageFetcher {
    /// Configured `reqwest` client (browser user agent, Arabic-first
    /// `Accept-Language`, 30 second timeout).
    pub client: Client,
    /// Pause before each request so the crawl stays polite.
    pub delay: StdDuration,
}

impl FetchAsync for PageFetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, Box<dyn Error>> {
        sleep(self.delay).await;
        let t0 = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u128,
            "Fetched page"
        );
        Ok(body)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchAsync`] implementation.
///
/// # Backoff Strategy
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    /// The underlying fetcher to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: FetchAsync,
{
    /// Create a new retry wrapper around an existing [`FetchAsync`] implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The underlying fetcher to wrap
    /// * `max_retries` - Maximum number of retry attempts (5 recommended)
    /// * `base_delay` - Initial delay between retries (1 second recommended)
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchAsync for RetryFetch<T>
where
    T: FetchAsync + fmt::Debug,
{
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<String, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.fetch(url).await {
                Ok(body) => {
                    return Ok(body);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "fetch() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Build the production fetcher: a politeness-delayed [`PageFetcher`]
/// wrapped in [`RetryFetch`].
///
/// # Arguments
///
/// * `delay` - Politeness pause before each request
///
/// # Returns
///
/// The ready-to-use fetcher, or an error if the HTTP client could not
/// be constructed.
pub fn build_fetcher(delay: StdDuration) -> Result<RetryFetch<PageFetcher>, Box<dyn Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ar,en;q=0.9"));

    let client = Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .timeout(StdDuration::from_secs(30))
        .build()?;

    Ok(RetryFetch::new(
        PageFetcher { client, delay },
        5,
        StdDuration::from_secs(1),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails a fixed number of times, then succeeds.
    #[derive(Debug)]
    struct FlakyFetch {
        calls: AtomicUsize,
        succeed_after: usize,
    }

    impl FetchAsync for FlakyFetch {
        async fn fetch(&self, _url: &Url) -> Result<String, Box<dyn Error>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.succeed_after {
                Err("transient failure".into())
            } else {
                Ok("<html></html>".to_string())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failures() {
        let flaky = FlakyFetch {
            calls: AtomicUsize::new(0),
            succeed_after: 2,
        };
        let fetcher = RetryFetch::new(flaky, 5, StdDuration::from_secs(1));
        let url = Url::parse("https://thevoice.ma/").unwrap();

        let body = fetcher.fetch(&url).await.unwrap();
        assert_eq!(body, "<html></html>");
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let flaky = FlakyFetch {
            calls: AtomicUsize::new(0),
            succeed_after: usize::MAX,
        };
        let fetcher = RetryFetch::new(flaky, 2, StdDuration::from_secs(1));
        let url = Url::parse("https://thevoice.ma/").unwrap();

        assert!(fetcher.fetch(&url).await.is_err());
        // initial attempt plus two retries
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_build_fetcher_constructs_client() {
        build_fetcher(StdDuration::from_millis(0)).unwrap();
    }
}
