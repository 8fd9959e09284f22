use crate::credentials::CredentialPool;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};

const MAX_ATTEMPTS: u32 = 5;
const BASE_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 8_000;

#[derive(Debug)]
pub enum HttpError {
    Network(reqwest::Error),
    Upstream(StatusCode),
    ExhaustedRetries,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Network(err) => write!(f, "network error: {}", err),
            HttpError::Upstream(status) => write!(f, "upstream returned {}", status),
            HttpError::ExhaustedRetries => write!(f, "exhausted retries against upstream"),
        }
    }
}

impl std::error::Error for HttpError {}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        HttpError::Network(err)
    }
}

/// Token bucket shared across all in-flight requests, refilled at
/// `rate_per_second` and capped at the same size so a burst can never
/// exceed one second's allowance.
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    rate_per_second: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rate_per_second: u32) -> Self {
        let capacity = rate_per_second.max(1) as f64;
        Self {
            tokens: capacity,
            capacity,
            rate_per_second: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_second).min(self.capacity);
        self.last_refill = now;
    }

    /// Returns `None` if a token was taken immediately, or `Some(wait)`
    /// with how long the caller must sleep before retrying.
    fn try_take(&mut self) -> Option<Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - self.tokens;
            Some(Duration::from_secs_f64(deficit / self.rate_per_second))
        }
    }
}

/// Bounds both concurrency (in-flight requests) and request rate
/// (tokens per second) for all calls made against the upstream API,
/// rotating through a [`CredentialPool`] for the `api_key` query
/// parameter on every attempt.
pub struct RateLimitedClient {
    http: reqwest::Client,
    credentials: Arc<CredentialPool>,
    concurrency: Arc<Semaphore>,
    bucket: Arc<Mutex<TokenBucket>>,
}

impl RateLimitedClient {
    pub fn new(
        credentials: Arc<CredentialPool>,
        concurrency: u32,
        rate_limit_per_second: u32,
        user_agent: &str,
    ) -> Result<Self, HttpError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .build()?;

        Ok(Self {
            http,
            credentials,
            concurrency: Arc::new(Semaphore::new(concurrency.max(1) as usize)),
            bucket: Arc::new(Mutex::new(TokenBucket::new(rate_limit_per_second))),
        })
    }

    async fn acquire_slot(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                bucket.try_take()
            };
            match wait {
                None => return,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }
    }

    async fn send_with_retry(
        &self,
        build: impl Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, HttpError> {
        let _permit = self
            .concurrency
            .acquire()
            .await
            .expect("semaphore is never closed");

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.acquire_slot().await;

            let key = self.credentials.next();
            let result = build(&self.http, key).send().await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if is_retryable_status(status) && attempt < MAX_ATTEMPTS {
                        tracing::warn!(status = %status, attempt, "upstream request retrying");
                        tokio::time::sleep(backoff_for(attempt)).await;
                        continue;
                    }
                    return Err(HttpError::Upstream(status));
                }
                Err(err) if is_retryable_network_error(&err) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(error = %err, attempt, "network error retrying");
                    tokio::time::sleep(backoff_for(attempt)).await;
                    continue;
                }
                Err(err) => return Err(HttpError::Network(err)),
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, HttpError> {
        let response = self
            .send_with_retry(|client, key| {
                client
                    .get(url)
                    .query(&[("api_key", key.to_string())])
                    .query(query)
            })
            .await?;
        Ok(response.json::<T>().await?)
    }

    /// Fetches a raw response without deserializing the body, for
    /// callers that need to stream it (gzip export dumps, paginated
    /// id-list fetches that parse NDJSON/JSON themselves).
    pub async fn get_raw(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, HttpError> {
        self.send_with_retry(|client, key| {
            client
                .get(url)
                .query(&[("api_key", key.to_string())])
                .query(query)
        })
        .await
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn is_retryable_network_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn backoff_for(attempt: u32) -> Duration {
    let millis = BASE_BACKOFF_MS.saturating_mul(1u64 << attempt.min(5)).min(MAX_BACKOFF_MS);
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bucket_drains_then_refills() {
        let mut bucket = TokenBucket::new(2);
        assert!(bucket.try_take().is_none());
        assert!(bucket.try_take().is_none());
        assert!(bucket.try_take().is_some());
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert!(backoff_for(1) < backoff_for(3));
        assert_eq!(backoff_for(10), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[test]
    fn retryable_statuses_cover_5xx_and_429() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }
}
