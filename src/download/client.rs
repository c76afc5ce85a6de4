//! HTTP transport capability and its reqwest implementation.
//!
//! Workers only see [`HttpTransport`]: a single GET that yields the status,
//! headers and a body stream. Dropping the [`HttpResponse`] (or its body)
//! aborts the underlying connection.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use tracing::{debug, instrument};
use url::Url;

use super::constants::default_user_agent;
use super::error::DownloadError;

/// Response body as a stream of chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, DownloadError>> + Send>>;

/// Status line, headers and body of a GET response.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase for `status`, empty when unknown.
    pub reason: String,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: BodyStream,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to issue a GET request.
///
/// Redirects are not followed: a 3xx response is returned as-is.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends a GET for `url` and resolves once response headers arrive.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for DNS, connect, TLS or protocol failures.
    async fn get(&self, url: &Url) -> Result<HttpResponse, DownloadError>;
}

/// Settings for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Connect timeout; `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    /// Per-read idle timeout; `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout: None,
            read_timeout: None,
        }
    }
}

/// reqwest-backed [`HttpTransport`].
///
/// Create once and share: the inner client pools connections.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default options (no timeouts).
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_options(&HttpClientOptions::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client with explicit options.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be
    /// initialised or the User-Agent is not a valid header value.
    #[instrument(level = "debug")]
    pub fn with_options(options: &HttpClientOptions) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .redirect(Policy::none())
            .user_agent(options.user_agent.as_str());
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = options.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn get(&self, url: &Url) -> Result<HttpResponse, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DownloadError::network(url.as_str(), e))?;

        let status = response.status();
        debug!(status = status.as_u16(), "received response headers");

        let headers = response.headers().clone();
        let stream_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(stream_url.as_str(), e)));

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: Box::pin(body),
        })
    }
}
