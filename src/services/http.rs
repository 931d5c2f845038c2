use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

use crate::constants::HTTP_RETRY_BASE_MS;
use crate::error::{AppError, Result};

/// Thin wrapper around a shared `reqwest::Client` carrying the per-call
/// timeout and bounded-retry policy every upstream call goes through.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    Duration::from_millis(HTTP_RETRY_BASE_MS << attempt)
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let inner = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { inner })
    }

    /// GET with a per-call timeout, no retry.
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<reqwest::Response> {
        self.get_with_retry(url, timeout, 0).await
    }

    /// GET with bounded retry: network errors and 429/5xx responses are
    /// retried up to `retries` extra times with exponential backoff starting
    /// at 200ms. A timeout counts as an abort and is never retried.
    pub async fn get_with_retry(
        &self,
        url: &str,
        timeout: Duration,
        retries: u32,
    ) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            match self.inner.get(url).timeout(timeout).send().await {
                Ok(res) => {
                    if is_retryable_status(res.status()) && attempt < retries {
                        sleep(backoff_for_attempt(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(res);
                }
                Err(err) => {
                    if !err.is_timeout() && attempt < retries {
                        sleep(backoff_for_attempt(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(AppError::ExternalApi(format!(
                        "GET {} failed: {}",
                        url, err
                    )));
                }
            }
        }
    }

    /// JSON POST with the same timeout/retry policy as `get_with_retry`.
    pub async fn post_json(
        &self,
        url: &str,
        body: &Value,
        timeout: Duration,
        retries: u32,
    ) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            match self.inner.post(url).json(body).timeout(timeout).send().await {
                Ok(res) => {
                    if is_retryable_status(res.status()) && attempt < retries {
                        sleep(backoff_for_attempt(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(res);
                }
                Err(err) => {
                    if !err.is_timeout() && attempt < retries {
                        sleep(backoff_for_attempt(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(AppError::ExternalApi(format!(
                        "POST {} failed: {}",
                        url, err
                    )));
                }
            }
        }
    }
}
