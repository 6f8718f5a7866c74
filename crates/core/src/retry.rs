//! Retrying HTTP fetch helper.
//!
//! Every outbound call made by CareCard (completion service, Overpass, OSRM) goes through
//! [`RetryingClient`]. A request is attempted once and, on failure, retried with pure
//! exponential backoff until the [`RetryPolicy`] runs out:
//!
//! - HTTP 429 is retried.
//! - Every other non-2xx status is retried the same way. 4xx and 5xx are not told apart.
//! - Transport failures (connection refused, reset, DNS, transport-level timeouts) are retried.
//! - A caller cancellation or a caller deadline on a single attempt is terminal.
//!
//! The network itself sits behind the [`HttpTransport`] trait so that the policy can be
//! exercised against a scripted transport on a paused clock.

use crate::constants::{DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_RETRIES};
use crate::{CareError, CareResult};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use reqwest::Method;

/// Bounds on how often and how patiently a request is retried.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Create a new `RetryPolicy`.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidInput` if `initial_delay_ms` is zero or if
    /// `backoff_multiplier` is not a finite number greater than 1.
    pub fn new(max_retries: u32, initial_delay_ms: u64, backoff_multiplier: f64) -> CareResult<Self> {
        if initial_delay_ms == 0 {
            return Err(CareError::InvalidInput(
                "initial retry delay must be greater than zero".into(),
            ));
        }
        if !backoff_multiplier.is_finite() || backoff_multiplier <= 1.0 {
            return Err(CareError::InvalidInput(format!(
                "backoff multiplier must be greater than 1 (got {backoff_multiplier})"
            )));
        }

        Ok(Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            backoff_multiplier,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Total number of attempts this policy allows, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// The waits between consecutive attempts, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial_delay), move |d| {
            Some(grow(*d, self.backoff_multiplier))
        })
        .take(self.max_retries as usize)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

fn grow(delay: Duration, multiplier: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier).unwrap_or(Duration::MAX)
}

/// Description of a single outbound HTTP request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    /// Caller deadline for one attempt. Exceeding it is terminal, not retried.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Build a POST request with a JSON body and matching `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns `CareError::Serialization` if `body` cannot be encoded.
    pub fn post_json<T: Serialize>(url: impl Into<String>, body: &T) -> CareResult<Self> {
        let bytes = serde_json::to_vec(body).map_err(CareError::Serialization)?;
        let mut req = Self::new(Method::POST, url).header("Content-Type", "application/json");
        req.body = Some(bytes);
        Ok(req)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A response as returned by the transport.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The network seam used by [`RetryingClient`].
///
/// Implementations report failures to complete the exchange as `CareError::Transport` and
/// return every completed exchange as `Ok`, whatever its status.
pub trait HttpTransport: Send + Sync {
    fn execute(
        &self,
        request: &HttpRequest,
    ) -> impl Future<Output = CareResult<HttpResponse>> + Send;
}

/// Production transport backed by `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> CareResult<HttpResponse> {
        let mut builder = self.http.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| CareError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| CareError::Transport(e.to_string()))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// HTTP client that applies a [`RetryPolicy`] around a transport.
#[derive(Clone, Debug)]
pub struct RetryingClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: HttpTransport> RetryingClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `request` with the client's default policy.
    ///
    /// # Errors
    ///
    /// Returns `CareError::RequestFailed` wrapping the last failure once retries are
    /// exhausted.
    pub async fn fetch(&self, request: &HttpRequest) -> CareResult<HttpResponse> {
        self.fetch_with_policy(request, &self.policy, None).await
    }

    /// Send `request`, giving up as soon as `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `CareError::Cancelled` if the token fires during an attempt or during a
    /// backoff wait, otherwise as [`RetryingClient::fetch`].
    pub async fn fetch_cancellable(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> CareResult<HttpResponse> {
        self.fetch_with_policy(request, &self.policy, Some(cancel)).await
    }

    /// Send `request` under an explicit policy.
    ///
    /// # Errors
    ///
    /// - `CareError::RequestFailed` once the policy is exhausted, carrying the last failure
    ///   (`HttpStatus` or `Transport`).
    /// - `CareError::Cancelled` or `CareError::AttemptTimedOut` immediately, without retrying.
    pub async fn fetch_with_policy(
        &self,
        request: &HttpRequest,
        policy: &RetryPolicy,
        cancel: Option<&CancellationToken>,
    ) -> CareResult<HttpResponse> {
        let mut delay = policy.initial_delay();
        let mut retries_left = policy.max_retries();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let err = match self.attempt(request, cancel).await {
                Ok(resp) => return Ok(resp),
                Err(e) if !e.is_retryable() => {
                    tracing::info!("{} {} aborted: {}", request.method, request.url, e);
                    return Err(e);
                }
                Err(e) => e,
            };

            if retries_left == 0 {
                tracing::error!(
                    "{} {} failed after {} attempt(s): {}",
                    request.method,
                    request.url,
                    attempts,
                    err
                );
                return Err(CareError::RequestFailed {
                    attempts,
                    source: Box::new(err),
                });
            }

            tracing::warn!(
                "{} {} failed ({}), retrying in {}ms ({} retries left)",
                request.method,
                request.url,
                err,
                delay.as_millis(),
                retries_left
            );
            backoff(delay, cancel).await?;
            retries_left -= 1;
            delay = grow(delay, policy.backoff_multiplier());
        }
    }

    async fn attempt(
        &self,
        request: &HttpRequest,
        cancel: Option<&CancellationToken>,
    ) -> CareResult<HttpResponse> {
        let bounded = async {
            let send = self.transport.execute(request);
            match request.timeout {
                Some(limit) => tokio::time::timeout(limit, send)
                    .await
                    .map_err(|_| CareError::AttemptTimedOut(limit))?,
                None => send.await,
            }
        };

        let resp = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(CareError::Cancelled),
                r = bounded => r?,
            },
            None => bounded.await?,
        };

        if resp.is_success() {
            Ok(resp)
        } else {
            Err(CareError::HttpStatus {
                status: resp.status,
            })
        }
    }
}

async fn backoff(delay: Duration, cancel: Option<&CancellationToken>) -> CareResult<()> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(CareError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        },
        None => {
            tokio::time::sleep(delay).await;
            Ok(())
        }
    }
}
