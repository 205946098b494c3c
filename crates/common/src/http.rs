//! JSON-over-HTTP helper shared by the model and index clients
//!
//! Transient failures (transport errors, 429, 5xx) are retried with
//! exponential backoff up to `max_retries` times. Anything else fails at once.
//! Callers map [`HttpFailure`] into their own error variant.

use crate::errors::{AppError, Result};
use backoff::ExponentialBackoffBuilder;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;

/// A request that could not be completed
#[derive(Debug, Clone)]
pub struct HttpFailure {
    /// Response status, when the server answered
    pub status: Option<StatusCode>,
    pub message: String,
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({})", self.message, status),
            None => f.write_str(&self.message),
        }
    }
}

/// HTTP client with timeout and bounded retries
#[derive(Debug, Clone)]
pub struct JsonClient {
    client: Client,
    max_retries: u32,
}

impl JsonClient {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            max_retries,
        })
    }

    /// Send the request produced by `build` and decode a JSON body
    ///
    /// `build` runs once per attempt.
    pub async fn send<T, F>(&self, build: F) -> std::result::Result<T, HttpFailure>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let max_retries = self.max_retries;
        let mut attempt = 0u32;

        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_elapsed_time(Some(Duration::from_secs(60)))
            .build();

        backoff::future::retry_notify(
            policy,
            || {
                attempt += 1;
                let exhausted = attempt > max_retries;
                let request = build(&self.client);
                async move { execute(request, exhausted).await }
            },
            |failure: HttpFailure, delay: Duration| {
                tracing::warn!(
                    error = %failure,
                    delay_ms = delay.as_millis() as u64,
                    "HTTP request failed, retrying"
                );
            },
        )
        .await
    }
}

async fn execute<T: DeserializeOwned>(
    request: RequestBuilder,
    exhausted: bool,
) -> std::result::Result<T, backoff::Error<HttpFailure>> {
    let retryable = |failure: HttpFailure| {
        if exhausted {
            backoff::Error::permanent(failure)
        } else {
            backoff::Error::transient(failure)
        }
    };

    let response = request.send().await.map_err(|e| {
        retryable(HttpFailure {
            status: None,
            message: format!("Request failed: {}", e),
        })
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let failure = HttpFailure {
            status: Some(status),
            message: format!("API error: {}", body),
        };
        return Err(if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            retryable(failure)
        } else {
            backoff::Error::permanent(failure)
        });
    }

    response.json::<T>().await.map_err(|e| {
        backoff::Error::permanent(HttpFailure {
            status: Some(status),
            message: format!("Failed to parse response: {}", e),
        })
    })
}
