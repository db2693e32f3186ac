//! Provider trait and implementations for hosted and local backends

pub mod anthropic;
pub mod openai;

use async_trait::async_trait;
use futures_util::StreamExt;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use url::Url;

use estuary_core::{GenerateRequest, GenerationResult};

use crate::error::{AiError, classify_status};
use crate::frame::{ByteSource, Framing};
use crate::retry::RetryPolicy;
use crate::stream::ChunkStream;

/// Connection settings shared by every provider
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Endpoint base URL; each provider falls back to its hosted default
    pub base_url: Option<Url>,
    /// API key; omitted for local engines that need none
    pub api_key: Option<SecretString>,
    /// Stream framing; local engines may speak JSON lines instead of SSE
    pub framing: Framing,
    /// Backoff schedule for transient connection failures
    pub retry: RetryPolicy,
}

/// Trait implemented by each backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Send a non-streaming request and return the complete result
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerationResult, AiError>;

    /// Send a streaming request and return the canonical chunk stream
    ///
    /// Retries cover connection establishment only; once the stream has
    /// yielded data, failures surface through the stream itself.
    async fn generate_stream(
        &self,
        request: &GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, AiError>;
}

/// Classify a failed request dispatch
pub(crate) fn request_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout
    } else {
        AiError::Network(e.to_string())
    }
}

/// Pass through success responses, classify everything else
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(http::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    let body = response.text().await.unwrap_or_default();

    tracing::warn!(status = %status, "provider returned error");
    Err(classify_status(status, &body, retry_after))
}

/// Adapt a response body into the framing layer's byte source
pub(crate) fn byte_source(response: reqwest::Response) -> ByteSource {
    Box::pin(response.bytes_stream().map(|item| match item {
        Ok(bytes) => Ok(bytes.to_vec()),
        Err(e) => Err(request_error(e)),
    }))
}
