//! Provider wire-format types
//!
//! Serde models of each supported wire protocol, kept separate from the
//! canonical types so adapters are the only code that sees both sides.
//! Error bodies share one decoder: both families wrap the detail in an
//! `error` envelope, differing only in which tag field they populate.

use serde::Deserialize;

pub mod anthropic;
pub mod openai;

/// What a provider error body yielded after decoding
#[derive(Debug, Clone)]
pub struct ErrorBody {
    /// Human-readable message, or the raw body when nothing parsed
    pub message: String,
    /// Machine-readable code or type tag, when the body carried one
    pub code: Option<String>,
}

impl ErrorBody {
    /// Whether the code marks a content-policy/moderation rejection
    pub fn is_content_policy(&self) -> bool {
        self.code.as_deref().is_some_and(|code| {
            matches!(
                code,
                "content_policy_violation" | "content_filter" | "moderation_blocked"
            )
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    /// Code field used by the delta-array family
    #[serde(default)]
    code: Option<String>,
    /// Type tag used by the block-oriented family
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

/// Decode a provider error body
///
/// Covers both families' `{"error": {...}}` envelope; an unparseable body
/// stands in as the message with no code. The explicit `code` field wins
/// over the type tag when both are present.
pub fn decode_error_body(body: &str) -> ErrorBody {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ErrorBody {
            message: envelope.error.message,
            code: envelope.error.code.or(envelope.error.error_type),
        },
        Err(_) => ErrorBody {
            message: body.trim().to_owned(),
            code: None,
        },
    }
}
