//! Delta-array chat completions provider (family B)
//!
//! Also covers OpenAI-compatible local engines. Configure `Framing::JsonLines`
//! for engines that frame their streams as newline-delimited JSON; those
//! streams carry no `[DONE]` sentinel, so completion is taken from the first
//! finish reason instead.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use url::Url;

use estuary_core::{GenerateRequest, GenerationResult};

use super::{Provider, ProviderConfig, byte_source, check_status, request_error};
use crate::convert::openai::{OpenAiAdapter, response_into_result};
use crate::error::AiError;
use crate::frame::{Framing, frames};
use crate::protocol::openai::{OpenAiRequest, OpenAiResponse, OpenAiStreamOptions};
use crate::retry::{RetryPolicy, with_retry};
use crate::stream::{ChunkStream, generation_stream};

/// Default hosted API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat completions provider
pub struct OpenAiProvider {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    framing: Framing,
    retry: RetryPolicy,
}

impl OpenAiProvider {
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
            framing: config.framing,
            retry: config.retry,
        }
    }

    /// Build the chat completions endpoint URL
    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// Dispatch one request attempt and classify the response status
    async fn send(&self, wire: &OpenAiRequest) -> Result<reqwest::Response, AiError> {
        let mut builder = self.client.post(self.completions_url()).json(wire);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(provider = %self.name, error = %e, "request dispatch failed");
            request_error(e)
        })?;

        check_status(response).await
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerationResult, AiError> {
        let wire: OpenAiRequest = request.into();
        let started = Instant::now();

        let response = with_retry(self.retry, || self.send(&wire)).await?;
        let wire_response: OpenAiResponse = response.json().await.map_err(|e| AiError::Decode {
            context: format!("failed to parse response body: {e}"),
        })?;

        Ok(response_into_result(wire_response, started.elapsed()))
    }

    async fn generate_stream(
        &self,
        request: &GenerateRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, AiError> {
        let mut wire: OpenAiRequest = request.into();
        wire.stream = Some(true);

        // Local JSON-lines engines reject unknown request fields, so the
        // usage opt-in is sent only on the hosted SSE path
        let adapter = match self.framing {
            Framing::Sse => {
                wire.stream_options = Some(OpenAiStreamOptions { include_usage: true });
                OpenAiAdapter::new()
            }
            Framing::JsonLines => OpenAiAdapter::eager(),
        };

        let response = with_retry(self.retry, || self.send(&wire)).await?;

        let frames = frames(byte_source(response), self.framing);
        Ok(generation_stream(
            frames,
            Box::new(adapter),
            request.config.stop.clone(),
            cancel,
        ))
    }
}
