//! Block-oriented messages API provider (family A)

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use url::Url;

use estuary_core::{GenerateRequest, GenerationResult};

use super::{Provider, ProviderConfig, byte_source, check_status, request_error};
use crate::convert::anthropic::{AnthropicAdapter, response_into_result};
use crate::error::AiError;
use crate::frame::{Framing, frames};
use crate::protocol::anthropic::{AnthropicRequest, AnthropicResponse};
use crate::retry::{RetryPolicy, with_retry};
use crate::stream::{ChunkStream, generation_stream};

/// Default hosted API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API provider
pub struct AnthropicProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    retry: RetryPolicy,
}

impl AnthropicProvider {
    /// Create from provider configuration
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded default base URL is invalid (should never happen).
    #[must_use]
    pub fn new(name: impl Into<String>, config: ProviderConfig) -> Self {
        let base_url = config
            .base_url
            .unwrap_or_else(|| Url::parse(DEFAULT_BASE_URL).expect("valid default URL"));

        Self {
            name: name.into(),
            client: Client::new(),
            base_url,
            api_key: config.api_key,
            retry: config.retry,
        }
    }

    /// Build the messages endpoint URL
    fn messages_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/messages")
    }

    /// Dispatch one request attempt and classify the response status
    async fn send(&self, wire: &AnthropicRequest) -> Result<reqwest::Response, AiError> {
        let mut builder = self
            .client
            .post(self.messages_url())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(wire);

        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(provider = %self.name, error = %e, "request dispatch failed");
            request_error(e)
        })?;

        check_status(response).await
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerationResult, AiError> {
        let wire: AnthropicRequest = request.into();
        let started = Instant::now();

        let response = with_retry(self.retry, || self.send(&wire)).await?;
        let wire_response: AnthropicResponse = response.json().await.map_err(|e| AiError::Decode {
            context: format!("failed to parse response body: {e}"),
        })?;

        Ok(response_into_result(wire_response, started.elapsed()))
    }

    async fn generate_stream(
        &self,
        request: &GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, AiError> {
        let mut wire: AnthropicRequest = request.into();
        wire.stream = Some(true);

        let response = with_retry(self.retry, || self.send(&wire)).await?;

        let frames = frames(byte_source(response), Framing::Sse);
        Ok(generation_stream(
            frames,
            Box::new(AnthropicAdapter::new()),
            request.config.stop.clone(),
            cancel,
        ))
    }
}
