//! Upstream stream sources.
//!
//! [`UpstreamSource`] is the seam between a bridge session and the network:
//! each call to [`UpstreamSource::open`] is one connection attempt and yields
//! a stream of text lines. [`HttpUpstream`] is the production implementation.

use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use super::sse;
use crate::error::GatewayError;

/// Stream of upstream text lines for one connection attempt.
pub type LineStream = BoxStream<'static, Result<String, GatewayError>>;

/// A push-stream endpoint a bridge session can (re)connect to.
pub trait UpstreamSource: Send + Sync + 'static {
    /// Human-readable endpoint, used in logs and status.
    fn endpoint(&self) -> &str;

    /// Opens a new connection to the stream.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] when the connection cannot be established
    /// or the upstream rejects it.
    fn open(&self) -> impl Future<Output = Result<LineStream, GatewayError>> + Send;
}

/// SSE endpoint reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    url: String,
}

impl HttpUpstream {
    /// Creates a source for `url` using a shared client.
    ///
    /// The client must not carry a request timeout; streams are unbounded.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl UpstreamSource for HttpUpstream {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn open(&self) -> Result<LineStream, GatewayError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::UpstreamStatus {
                endpoint: self.url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(sse::lines(response.bytes_stream()).boxed())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_is_an_upstream_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let source = HttpUpstream::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/api/alerts/stream",
        );
        assert_eq!(source.endpoint(), "http://127.0.0.1:9/api/alerts/stream");
        let Err(err) = source.open().await else {
            panic!("connection should fail");
        };
        assert!(matches!(err, GatewayError::Upstream(_)));
    }
}
