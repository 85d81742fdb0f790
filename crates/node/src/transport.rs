//! An HTTP client retrying transient failures of the fork management APIs.
//!
//! Only session management calls go through this client. The JSON-RPC traffic to a forked
//! endpoint is left to the caller's provider and is never retried here.

use std::{fmt::Display, time::Duration};

use reqwest::{Client, RequestBuilder, Response};
use thiserror::Error;
use tracing::warn;

/// How often and how patiently a request is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    /// Retries on top of the first attempt.
    pub max_retries: u32,

    /// The delay before the `n`th retry is `base_delay * 2^n`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// The delay before the given retry, counting retries from 1.
    ///
    /// The first retry therefore already waits twice the base delay.
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(150))
    }
}

/// What went wrong in an attempt that is worth retrying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransientFailure {
    /// The request did not produce a response.
    Network(String),
    /// The server answered with a 5xx status.
    Status { status: u16, body: String },
}

impl Display for TransientFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(error) => write!(f, "network error: {error}"),
            Self::Status { status, body } => write!(f, "status {status}: {body}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed after {attempts} attempts, last failure was {last}")]
    RetriesExhausted {
        attempts: u32,
        last: TransientFailure,
    },
    /// A failure retrying can't fix, such as a request that can't be built.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// A [Client] wrapper retrying network errors and 5xx responses with exponential backoff.
///
/// Responses with any other status, 4xx included, are handed back to the caller untouched.
#[derive(Clone, Debug, Default)]
pub struct ResilientClient {
    client: Client,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Sends the request built by `request`, which is invoked once per attempt.
    pub async fn send(
        &self,
        request: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<Response, TransportError> {
        let mut retries = 0;

        loop {
            let failure = match request(&self.client).send().await {
                Ok(response) if response.status().as_u16() < 500 => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|error| format!("<unreadable body: {error}>"));
                    TransientFailure::Status { status, body }
                }
                Err(error) if error.is_builder() => return Err(error.into()),
                Err(error) => TransientFailure::Network(error.to_string()),
            };

            if retries >= self.policy.max_retries {
                return Err(TransportError::RetriesExhausted {
                    attempts: retries + 1,
                    last: failure,
                });
            }

            retries += 1;
            let delay = self.policy.delay(retries);
            warn!(retry = retries, ?delay, %failure, "Retrying the request");
            tokio::time::sleep(delay).await;
        }
    }
}
