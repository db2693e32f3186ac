//! Conversion between canonical types and provider wire formats
//!
//! One adapter per wire-protocol family. Adapters are the only code that
//! sees both the provider shapes and the internal event vocabulary; new
//! providers require a new adapter, never a change to the state machine.

pub mod anthropic;
pub mod openai;

use crate::error::AiError;
use crate::event::ProviderEvent;
use crate::frame::RawFrame;

/// Maps decoded provider-native frames to the internal event vocabulary
///
/// Stateful per request: adapters track open content blocks and stashed
/// usage. A frame that contributes nothing (stream-open events, pings,
/// unknown future event types) adapts to an empty vec.
pub trait EventAdapter: Send {
    /// Adapt one raw frame into zero or more internal events
    fn adapt(&mut self, frame: &RawFrame) -> Result<Vec<ProviderEvent>, AiError>;
}
