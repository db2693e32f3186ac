//! Streaming generation engine over multiple LLM wire protocols
//!
//! Normalizes block-oriented SSE, delta-array SSE/JSON-lines, and
//! non-streaming chat completion protocols into one canonical incremental
//! chunk stream, with stop-sequence holdback, tool-call assembly, retry,
//! and cooperative cancellation.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod assembler;
pub mod convert;
pub mod error;
pub mod event;
pub mod frame;
pub mod protocol;
pub mod provider;
pub mod retry;
pub mod stream;

pub use error::AiError;
pub use event::ProviderEvent;
pub use frame::{ByteSource, FrameStream, Framing, RawFrame, frames};
pub use provider::{Provider, ProviderConfig, anthropic::AnthropicProvider, openai::OpenAiProvider};
pub use retry::{RetryPolicy, with_retry};
pub use stream::{ChunkStream, generation_stream};
