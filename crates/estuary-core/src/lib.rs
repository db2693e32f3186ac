//! Canonical data model for Estuary
//!
//! Provider-neutral types shared across the engine: conversation messages,
//! generation parameters, tool definitions and calls, and the incremental
//! chunk/result model every wire protocol is normalized into.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod chunk;
pub mod generate;
pub mod message;
pub mod tool;

pub use chunk::{FinishReason, GenerationChunk, GenerationResult, Usage};
pub use generate::{GenerateConfig, GenerateRequest};
pub use message::{Content, ContentPart, Message, Role};
pub use tool::{ToolCall, ToolChoice, ToolDefinition};
