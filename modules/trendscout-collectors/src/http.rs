//! Shared HTTP plumbing for collectors: a retry loop for rate limits and
//! flaky networks, and status/JSON helpers that turn responses into
//! `anyhow` errors with context.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "trendscout/0.1";

/// Attempt budget for [`fetch_with_retry`]. The wait before retry `n`
/// (counted from 0) is `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Send `request`, retrying on 429 and on transport errors.
///
/// Any other status (2xx or not) is returned immediately. When attempts run
/// out the last outcome is returned unchanged, so callers may still see a 429.
pub async fn fetch_with_retry(request: RequestBuilder, policy: &RetryPolicy) -> reqwest::Result<Response> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        // Streaming bodies cannot be cloned; send those once.
        let Some(this_try) = request.try_clone() else {
            return request.send().await;
        };
        let last = attempt + 1 >= max_attempts;

        match this_try.send().await {
            Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS && !last => {
                warn!(url = %resp.url(), attempt, "Rate limited, backing off");
            }
            Ok(resp) => return Ok(resp),
            Err(e) if !last => {
                warn!(error = %e, attempt, "Request failed, retrying");
            }
            Err(e) => return Err(e),
        }

        tokio::time::sleep(policy.delay_for(attempt)).await;
        attempt += 1;
    }
}

/// Turn a non-2xx response into an error carrying the status and body.
pub async fn check_status(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("{what} returned HTTP {}: {}", status.as_u16(), truncate(&body, 200))
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// HTTP client shared by one collector: 30 s timeout, fixed user agent, and
/// a [`RetryPolicy`] applied to every request.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl HttpFetcher {
    pub fn new(policy: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client, policy }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send with retry and require a 2xx status.
    pub async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let resp = fetch_with_retry(request, &self.policy)
            .await
            .with_context(|| format!("{what} request failed"))?;
        check_status(resp, what).await
    }

    pub async fn json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        self.send(request, what)
            .await?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode {what} response"))
    }

    pub async fn bytes(&self, request: RequestBuilder, what: &str) -> Result<Vec<u8>> {
        let bytes = self
            .send(request, what)
            .await?
            .bytes()
            .await
            .with_context(|| format!("Failed to read {what} body"))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
