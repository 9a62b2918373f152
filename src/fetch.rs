use crate::error::{Result, ScraperError};
use crate::rate_limiter::RateLimiter;
use crate::types::Page;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Transport boundary: everything the crawl needs from the network
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page>;
}

pub struct ReqwestFetcher {
    client: Client,
    limiter: Option<RateLimiter>,
}

impl ReqwestFetcher {
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        requests_per_min: Option<u64>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            limiter: requests_per_min.map(RateLimiter::new),
        })
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<Page> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        let response = self.client.get(url).send().await?.error_for_status()?;
        let final_url = response.url().to_string();
        let body = response.text().await?;
        debug!(url = %final_url, bytes = body.len(), "Fetched page");
        Ok(Page::new(final_url, body))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    /// Wait before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Fetches `url`, retrying transient failures at most `policy.retries` times.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    policy: RetryPolicy,
) -> Result<Page> {
    let mut attempt = 0;
    loop {
        match fetcher.fetch(url).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() && attempt < policy.retries => {
                attempt += 1;
                warn!(url, attempt, error = %e, "Transient fetch failure, retrying");
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            Err(e) => {
                return Err(match e {
                    ScraperError::Fetch { .. } => e,
                    other => ScraperError::Fetch {
                        url: url.to_string(),
                        message: other.to_string(),
                    },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Fetcher for Flaky {
        async fn fetch(&self, url: &str) -> Result<Page> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(ScraperError::Fetch {
                    url: url.to_string(),
                    message: "connection reset".into(),
                });
            }
            Ok(Page::new(url, "<html></html>"))
        }
    }

    fn flaky(failures: u32) -> Flaky {
        Flaky {
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    fn quick(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_recovers_within_retry_budget() {
        let fetcher = flaky(2);
        let page = fetch_with_retry(&fetcher, "http://example.com", quick(2))
            .await
            .unwrap();
        assert_eq!(page.url, "http://example.com");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let fetcher = flaky(10);
        let err = fetch_with_retry(&fetcher, "http://example.com", quick(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Fetch { .. }));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    struct Broken;

    #[async_trait]
    impl Fetcher for Broken {
        async fn fetch(&self, _url: &str) -> Result<Page> {
            Err(ScraperError::ParseStructure("not a page".into()))
        }
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let err = fetch_with_retry(&Broken, "http://example.com", quick(5))
            .await
            .unwrap_err();
        match err {
            ScraperError::Fetch { url, message } => {
                assert_eq!(url, "http://example.com");
                assert!(message.contains("not a page"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
