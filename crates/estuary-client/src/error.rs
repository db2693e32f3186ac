use http::StatusCode;
use thiserror::Error;

use crate::protocol;

/// Errors surfaced by the generation engine
///
/// Every failure carries a stable kind, a human-readable message, and —
/// where meaningful — a machine-actionable hint such as a retry-after
/// duration. Cancellation is not represented here: it is a normal terminal
/// state of the chunk stream, not an error path.
#[derive(Debug, Error)]
pub enum AiError {
    /// Missing or rejected credentials; never retried
    #[error("authentication failed: {message}")]
    Authentication {
        /// Provider-supplied detail
        message: String,
    },

    /// Provider rate limit exceeded
    #[error("rate limited: {message}")]
    RateLimited {
        /// Seconds until the limit resets, when the provider says
        retry_after: Option<u64>,
        /// Provider-supplied detail
        message: String,
    },

    /// Upstream 5xx failure
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status returned by the provider
        status: u16,
        /// Provider-supplied detail
        message: String,
    },

    /// Request the provider rejected as malformed (4xx); never retried
    #[error("invalid request ({status}): {message}")]
    InvalidRequest {
        /// HTTP status returned by the provider
        status: u16,
        /// Provider-supplied detail
        message: String,
    },

    /// Request timed out before a response arrived
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure (connection reset, DNS, TLS)
    #[error("network error: {0}")]
    Network(String),

    /// Provider refused the content on safety grounds; never retried
    #[error("content filtered: {message}")]
    ContentFiltered {
        /// Provider-supplied detail
        message: String,
    },

    /// Malformed wire data; retrying cannot fix an upstream payload
    #[error("decode error: {context}")]
    Decode {
        /// What was being decoded when the failure occurred
        context: String,
    },

    /// A closed tool call whose accumulated arguments are not valid JSON
    #[error("tool call `{name}` closed with malformed arguments: {reason}")]
    ToolCallParse {
        /// Tool the model attempted to invoke
        name: String,
        /// The accumulated argument payload as received
        payload: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Failure that fits no other kind
    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl AiError {
    /// Whether the retry policy may re-attempt after this failure
    ///
    /// Applies only to the connection/initial-response phase; a request
    /// that has begun streaming is never replayed.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Timeout | Self::Network(_)
        )
    }

    /// Provider-supplied retry-after hint in seconds, if any
    pub const fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Classify a terminal HTTP status plus provider error body
///
/// The body is decoded against the shared provider error envelope; when
/// nothing parses, the raw body stands in as the message. A content-policy
/// code takes precedence over the status-based kind: providers report
/// moderation rejections under ordinary 4xx statuses.
pub fn classify_status(status: StatusCode, body: &str, retry_after: Option<u64>) -> AiError {
    let wire = protocol::decode_error_body(body);
    if wire.is_content_policy() {
        return AiError::ContentFiltered {
            message: wire.message,
        };
    }
    let message = wire.message;

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AiError::Authentication { message },
        StatusCode::TOO_MANY_REQUESTS => AiError::RateLimited { retry_after, message },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AiError::Timeout,
        s if s.is_server_error() => AiError::Server {
            status: s.as_u16(),
            message,
        },
        s if s.is_client_error() => AiError::InvalidRequest {
            status: s.as_u16(),
            message,
        },
        s => AiError::Unknown(format!("unexpected status {s}: {message}")),
    }
}
