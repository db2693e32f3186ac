//! Block-oriented messages API wire format (family A)

use serde::{Deserialize, Serialize};

// -- Request types (outbound only; this is a client) --

/// Messages API request
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    /// Model identifier
    pub model: String,
    /// Maximum tokens to generate (required by this API)
    pub max_tokens: u32,
    /// System prompt (top-level, not in messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation messages
    pub messages: Vec<AnthropicMessage>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    /// Tool choice configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<AnthropicToolChoice>,
}

/// One conversation turn
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    /// "user" or "assistant"
    pub role: String,
    /// Content blocks
    pub content: AnthropicContent,
}

/// Content: plain string shorthand or an array of blocks
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnthropicContent {
    /// Plain text
    Text(String),
    /// Array of content blocks
    Blocks(Vec<AnthropicContentBlock>),
}

/// One content block in a request message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    /// Text content
    Text {
        /// The text string
        text: String,
    },
    /// Image content
    Image {
        /// Image source
        source: AnthropicImageSource,
    },
    /// Tool use echoed back in history
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input as JSON
        input: serde_json::Value,
    },
    /// Tool result supplied by the caller
    ToolResult {
        /// Tool use ID this result responds to
        tool_use_id: String,
        /// Result content
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

/// Image source reference
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicImageSource {
    /// Source type ("base64" or "url")
    #[serde(rename = "type")]
    pub source_type: String,
    /// Media type (e.g. "image/png")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Base64 data or URL
    pub data: String,
}

/// Tool definition
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicTool {
    /// Tool name
    pub name: String,
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for input parameters
    pub input_schema: serde_json::Value,
}

/// Tool choice: "auto", "any", or a named "tool"
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicToolChoice {
    /// Choice type
    #[serde(rename = "type")]
    pub choice_type: String,
    /// Specific tool name (when type is "tool")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// -- Response types (non-streaming, family C fallback) --

/// Non-streaming messages API response
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse {
    /// Response content blocks
    pub content: Vec<AnthropicResponseBlock>,
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token usage
    pub usage: AnthropicUsage,
}

/// One block of a non-streaming response
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicResponseBlock {
    /// Text output
    Text {
        /// The text string
        text: String,
    },
    /// Tool invocation
    ToolUse {
        /// Tool use identifier
        id: String,
        /// Tool name
        name: String,
        /// Tool input as JSON
        input: serde_json::Value,
    },
}

/// Token usage counters
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AnthropicUsage {
    /// Input tokens
    #[serde(default)]
    pub input_tokens: u32,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: u32,
}

// -- Streaming event types --

/// SSE stream events, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    /// Stream opened; diagnostics only
    MessageStart {
        /// Partial message metadata (unused)
        #[serde(default)]
        message: serde_json::Value,
    },
    /// A content block opened
    ContentBlockStart {
        /// Block index
        index: u32,
        /// Initial block content
        content_block: AnthropicStreamContentBlock,
    },
    /// Incremental content within a block
    ContentBlockDelta {
        /// Block index
        index: u32,
        /// Delta payload
        delta: AnthropicStreamDelta,
    },
    /// A content block closed
    ContentBlockStop {
        /// Block index
        index: u32,
    },
    /// Message metadata delta carrying stop reason and usage
    MessageDelta {
        /// Stop reason delta
        delta: AnthropicMessageDelta,
        /// Updated usage
        #[serde(default)]
        usage: Option<AnthropicUsage>,
    },
    /// Stream completed
    MessageStop,
    /// Keep-alive
    Ping,
}

/// Event type tags the adapter recognizes; anything else is a future
/// event type and is skipped rather than failed
pub const KNOWN_STREAM_EVENT_TYPES: &[&str] = &[
    "message_start",
    "content_block_start",
    "content_block_delta",
    "content_block_stop",
    "message_delta",
    "message_stop",
    "ping",
];

/// Initial content of a `content_block_start` event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamContentBlock {
    /// Text block
    Text {
        /// Initial text (usually empty)
        #[serde(default)]
        text: String,
    },
    /// Tool use block
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
    },
}

/// Delta payload of a `content_block_delta` event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamDelta {
    /// Incremental text
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// Incremental tool input JSON
    InputJsonDelta {
        /// JSON fragment
        partial_json: String,
    },
}

/// Payload of a `message_delta` event
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicMessageDelta {
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Stop sequence that fired, when applicable
    #[serde(default)]
    pub stop_sequence: Option<String>,
}
