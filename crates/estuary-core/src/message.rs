use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System instructions
    System,
    /// End-user input
    User,
    /// Model output
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single conversation message
///
/// Immutable once constructed; the engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message author
    pub role: Role,
    /// Message body
    pub content: Content,
    /// Tool call this message responds to (tool role only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a plain-text message
    pub const fn text(role: Role, text: String) -> Self {
        Self {
            role,
            content: Content::Text(text),
            tool_call_id: None,
        }
    }
}

/// Message content: plain text or an ordered sequence of typed parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text (shorthand)
    Text(String),
    /// Ordered multimodal parts
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Flatten content to plain text, joining text parts
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } | ContentPart::Audio { .. } => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// One typed piece of multimodal content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text span
    Text {
        /// The text string
        text: String,
    },
    /// Image reference (URL or data URI)
    Image {
        /// Image location
        url: String,
        /// Media type (e.g. "image/png")
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    /// Audio reference (URL or data URI)
    Audio {
        /// Audio location
        url: String,
        /// Media type (e.g. "audio/wav")
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
}
