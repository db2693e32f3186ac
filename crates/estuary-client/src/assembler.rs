//! Incremental tool-call argument assembly
//!
//! Accumulates argument fragments per content-block index until the call
//! closes, then emits exactly one completed `ToolCall` with syntactically
//! complete JSON. State is scoped to a single request and discarded at its
//! terminal state.

use std::collections::BTreeMap;

use estuary_core::ToolCall;

use crate::error::AiError;

/// One tool call still receiving fragments
#[derive(Debug)]
struct OpenCall {
    id: String,
    name: String,
    arguments: String,
}

/// Per-request assembler mapping open content-block indices to buffers
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    open: BTreeMap<u32, OpenCall>,
}

impl ToolCallAssembler {
    /// Create an empty assembler for one request
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new call at an index
    ///
    /// Reopening an index that is still open is a protocol violation and
    /// surfaces as a decode error.
    pub fn start(&mut self, index: u32, id: String, name: String) -> Result<(), AiError> {
        if self.open.contains_key(&index) {
            return Err(AiError::Decode {
                context: format!("tool call started twice at open index {index}"),
            });
        }
        self.open.insert(
            index,
            OpenCall {
                id,
                name,
                arguments: String::new(),
            },
        );
        Ok(())
    }

    /// Append an argument fragment to the open call at an index
    ///
    /// Fragments for unopened indices are ignored: some providers emit a
    /// delta before an explicit start event when a call has no arguments.
    pub fn append(&mut self, index: u32, fragment: &str) {
        match self.open.get_mut(&index) {
            Some(call) => call.arguments.push_str(fragment),
            None => {
                tracing::debug!(index, "ignoring argument fragment for unopened tool call");
            }
        }
    }

    /// Close the call at an index and emit it
    ///
    /// Returns `Ok(None)` when the index was never opened. A closed call
    /// whose accumulated fragment is not well-formed JSON fails with an
    /// error naming the tool and the payload — never silently dropped.
    pub fn end(&mut self, index: u32) -> Result<Option<ToolCall>, AiError> {
        let Some(call) = self.open.remove(&index) else {
            tracing::debug!(index, "ignoring end for unopened tool call");
            return Ok(None);
        };
        Self::seal(call).map(Some)
    }

    /// Force-close every still-open call at stream end, in index order
    ///
    /// Best-effort: calls whose arguments fail to parse are dropped with a
    /// diagnostic rather than failing the whole result.
    pub fn finish(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.open)
            .into_values()
            .filter_map(|call| match Self::seal(call) {
                Ok(sealed) => Some(sealed),
                Err(e) => {
                    tracing::warn!(error = %e, "dropping unparseable force-closed tool call");
                    None
                }
            })
            .collect()
    }

    /// Validate accumulated arguments and produce the completed call
    fn seal(call: OpenCall) -> Result<ToolCall, AiError> {
        // Tools without parameters legitimately close with no fragments
        let arguments = if call.arguments.trim().is_empty() {
            "{}".to_owned()
        } else {
            call.arguments
        };

        if let Err(e) = serde_json::from_str::<serde_json::Value>(&arguments) {
            return Err(AiError::ToolCallParse {
                name: call.name,
                payload: arguments,
                reason: e.to_string(),
            });
        }

        Ok(ToolCall {
            id: call.id,
            name: call.name,
            arguments,
        })
    }
}
