use serde::{Deserialize, Serialize};

/// A tool the model may invoke
///
/// The engine echoes the schema to the provider verbatim and never
/// validates arguments against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's arguments
    pub parameters: serde_json::Value,
}

/// Policy for whether and which tool the model should call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ToolChoice {
    /// Model decides freely
    Auto,
    /// Model must not call tools
    None,
    /// Model must call some tool
    Required,
    /// Model must call the named tool
    Tool {
        /// Name of the required tool
        name: String,
    },
}

/// A completed tool invocation issued by the model
///
/// Produced only by the stream assembler or the non-streaming response
/// converter; `arguments` is always syntactically complete JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-issued call id, unique within a response
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Complete JSON argument payload
    pub arguments: String,
}
