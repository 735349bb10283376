//! HTTP plumbing for remote catalog providers.
//!
//! - **HTTP Client**: one shared, pooled `reqwest` client for every provider
//! - **Rate Limiting**: a minimum spacing between requests of one provider
//! - **Retry Logic**: retries with exponential backoff on 429 and transport errors
//! - **JSON Extraction**: dot-path helpers in [`json`]
//!
//! # Examples
//!
//! ```rust
//! use ensemble::net::HttpClient;
//! use std::time::Duration;
//!
//! # async fn example() -> ensemble::Result<()> {
//! let client = HttpClient::new("tidal")
//!     .with_rate_limit(Duration::from_millis(250))
//!     .with_max_retries(2);
//!
//! let body: serde_json::Value = client.get_json("https://api.example.com/search?q=abbey").await?;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode, header::HeaderMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub mod json;

/// Shared HTTP client: 15 second timeout, pooled connections, compression.
static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(concat!("Ensemble/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(8)
        .gzip(true)
        .brotli(true)
        .build()
        .unwrap_or_else(|_| Client::new())
});

/// Enforces a minimum delay between consecutive requests.
///
/// Clones share the same schedule, so every clone of an [`HttpClient`] is
/// throttled together.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    next_slot: Arc<Mutex<Option<Instant>>>,
    spacing: Duration,
}

impl RateLimiter {
    pub fn new(spacing: Duration) -> Self {
        Self {
            next_slot: Arc::new(Mutex::new(None)),
            spacing,
        }
    }

    /// Waits until the next request slot is free, then reserves it.
    pub async fn wait(&self) {
        let slot = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.spacing);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// HTTP client bound to one provider, with rate limiting and retries.
#[derive(Clone, Debug)]
pub struct HttpClient {
    provider_id: String,
    rate_limiter: RateLimiter,
    max_retries: u32,
    headers: HeaderMap,
}

impl HttpClient {
    /// Creates a client for `provider_id` with a 200ms spacing and 3 retries.
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            rate_limiter: RateLimiter::new(Duration::from_millis(200)),
            max_retries: 3,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_rate_limit(mut self, spacing: Duration) -> Self {
        self.rate_limiter = RateLimiter::new(spacing);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Adds a header sent with every request. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.parse::<reqwest::header::HeaderName>(),
            value.parse::<reqwest::header::HeaderValue>(),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Performs a GET request with rate limiting and retries.
    ///
    /// # Errors
    ///
    /// * [`Error::RateLimit`](crate::Error::RateLimit) - still throttled after all retries
    /// * [`Error::ProviderUnavailable`](crate::Error::ProviderUnavailable) - any other non-2xx status
    /// * [`Error::Network`](crate::Error::Network) - transport failure after all retries
    pub async fn get(&self, url: &str) -> crate::Result<Bytes> {
        let mut attempts = 0;

        loop {
            self.rate_limiter.wait().await;

            match CLIENT.get(url).headers(self.headers.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.bytes().await?);
                }
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempts < self.max_retries {
                        attempts += 1;
                        let delay = Duration::from_secs(2_u64.pow(attempts));
                        debug!(provider = %self.provider_id, attempts, ?delay, "throttled, backing off");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok());

                    return Err(crate::Error::rate_limit(retry_after));
                }
                Ok(response) => {
                    return Err(crate::Error::provider(
                        &self.provider_id,
                        format!("HTTP {}", response.status()),
                    ));
                }
                Err(e) => {
                    if attempts < self.max_retries {
                        attempts += 1;
                        debug!(provider = %self.provider_id, attempts, error = %e, "request failed, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    /// Performs a GET request and deserializes the body as JSON.
    pub async fn get_json<T>(&self, url: &str) -> crate::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let bytes = self.get(url).await?;
        serde_json::from_slice(&bytes).map_err(Into::into)
    }
}
