use estuary_core::{FinishReason, Usage};

/// The closed internal event vocabulary every wire protocol adapts into
///
/// Adapters translate provider-native frames to this vocabulary; the state
/// machine and assembler never see provider shapes. A frame with nothing to
/// contribute (stream-open events, pings, unknown future event types)
/// adapts to no events at all.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A fragment of assistant text
    TextDelta(String),
    /// A tool invocation opened at a content-block index
    ToolCallStarted {
        /// Provider content-block index for this call
        index: u32,
        /// Provider-issued call id
        id: String,
        /// Tool name
        name: String,
    },
    /// A fragment of an open tool call's argument payload
    ToolCallArgumentDelta {
        /// Index of the open call
        index: u32,
        /// Raw argument bytes, not necessarily valid JSON on their own
        fragment: String,
    },
    /// The content block at an index closed
    ToolCallEnded {
        /// Index of the closing call
        index: u32,
    },
    /// The provider declared generation finished
    Completed {
        /// Unified finish reason
        finish_reason: FinishReason,
        /// Usage totals when the provider reported them
        usage: Option<Usage>,
    },
}
