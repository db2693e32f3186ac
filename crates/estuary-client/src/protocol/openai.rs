//! Delta-array-oriented chat completions wire format (family B)
//!
//! Also spoken by OpenAI-compatible local engines, some of which frame
//! their streams as JSON lines instead of SSE.

use serde::{Deserialize, Serialize};

// -- Request types (outbound only) --

/// Chat completions request
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<OpenAiMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Ask for usage counters on the final stream chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<OpenAiStreamOptions>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiTool>>,
    /// Tool choice, string mode or named function object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
}

/// Streaming options
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiStreamOptions {
    /// Include usage totals in the final chunk
    pub include_usage: bool,
}

/// One conversation turn
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiMessage {
    /// "system", "user", "assistant", or "tool"
    pub role: String,
    /// Message content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<OpenAiContent>,
    /// Tool calls echoed back in history
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    /// Tool call this message responds to (tool role)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Content: plain string or typed parts
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OpenAiContent {
    /// Plain text
    Text(String),
    /// Multimodal parts
    Parts(Vec<OpenAiContentPart>),
}

/// One typed content part
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAiContentPart {
    /// Text span
    Text {
        /// The text string
        text: String,
    },
    /// Image reference
    ImageUrl {
        /// Image URL wrapper
        image_url: OpenAiImageUrl,
    },
    /// Audio payload
    InputAudio {
        /// Audio data wrapper
        input_audio: OpenAiInputAudio,
    },
}

/// Image URL wrapper
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiImageUrl {
    /// Image location (URL or data URI)
    pub url: String,
}

/// Audio data wrapper
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiInputAudio {
    /// Audio data (URL or base64)
    pub data: String,
    /// Audio format (e.g. "wav")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Completed tool call echoed back in history
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiToolCall {
    /// Call id
    pub id: String,
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name and arguments
    pub function: OpenAiFunctionCall,
}

/// Function invocation payload
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiFunctionCall {
    /// Function name
    pub name: String,
    /// Complete JSON arguments
    pub arguments: String,
}

/// Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function schema
    pub function: OpenAiFunction,
}

/// Function schema
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiFunction {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

// -- Response types (non-streaming, family C fallback) --

/// Non-streaming chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponse {
    /// Generated choices; the engine reads the first
    pub choices: Vec<OpenAiChoice>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

/// One completion choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoice {
    /// Generated message
    pub message: OpenAiChoiceMessage,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Message within a choice
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiChoiceMessage {
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls requested by the model
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAiResponseToolCall>>,
}

/// Completed tool call in a non-streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponseToolCall {
    /// Call id
    pub id: String,
    /// Function name and arguments
    pub function: OpenAiResponseFunctionCall,
}

/// Function payload in a non-streaming response
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiResponseFunctionCall {
    /// Function name
    pub name: String,
    /// Complete JSON arguments
    pub arguments: String,
}

/// Token usage counters
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OpenAiUsage {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens
    #[serde(default)]
    pub completion_tokens: u32,
}

// -- Streaming chunk types --

/// One streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChunk {
    /// Delta-bearing choices; empty on usage-only chunks
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
    /// Usage totals, present on the final chunk when requested
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

/// One choice within a streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamChoice {
    /// Incremental delta
    #[serde(default)]
    pub delta: OpenAiStreamDelta,
    /// Present on the last delta of the choice
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental delta payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamDelta {
    /// Incremental text content
    #[serde(default)]
    pub content: Option<String>,
    /// Incremental tool call fragments
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

/// Partial tool call within a stream delta
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamToolCall {
    /// Index into the response's tool call array
    pub index: u32,
    /// Call id (first fragment only)
    #[serde(default)]
    pub id: Option<String>,
    /// Partial function data
    #[serde(default)]
    pub function: Option<OpenAiStreamFunctionCall>,
}

/// Partial function data within a streaming tool call
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiStreamFunctionCall {
    /// Function name (first fragment only)
    #[serde(default)]
    pub name: Option<String>,
    /// Arguments JSON fragment
    #[serde(default)]
    pub arguments: Option<String>,
}
