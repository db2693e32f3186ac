use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tool::ToolCall;

/// Canonical reason a generation terminated
///
/// Exactly one value terminates every completed or cancelled generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the configured or provider token limit
    MaxTokens,
    /// Model requested a tool invocation
    ToolCall,
    /// A configured stop sequence was produced
    StopSequence,
    /// Content was filtered by provider safety systems
    ContentFilter,
    /// The caller cancelled the request
    Cancelled,
}

/// Token usage totals as reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub input_tokens: u32,
    /// Tokens generated in the completion
    pub output_tokens: u32,
}

impl Usage {
    /// Total tokens across prompt and completion
    pub const fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// One incremental unit of generation output
///
/// Chunks arrive in strict sequence with no fixed cadence: a chunk may
/// carry zero or many characters, at most one completed tool call, and
/// exactly one chunk per stream is final.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationChunk {
    /// New text released since the previous chunk (possibly empty)
    pub text: String,
    /// Running count of received text deltas, at provider granularity
    pub tokens: u32,
    /// Throughput measured against wall-clock time so far
    pub tokens_per_second: f64,
    /// A tool call that completed with this chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
    /// Present if and only if this chunk is terminal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Usage totals, reported only on the terminal chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl GenerationChunk {
    /// Whether this is the terminal chunk of its stream
    pub const fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// The fully reduced form of a chunk sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Concatenation of all non-terminal chunk text
    pub text: String,
    /// Completed tool calls, in emission order
    pub tool_calls: Vec<ToolCall>,
    /// Why generation terminated
    pub finish_reason: FinishReason,
    /// Usage totals, when the provider reported them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Wall-clock duration of the request
    pub duration: Duration,
    /// Generated tokens per second of wall-clock time
    pub tokens_per_second: f64,
}

impl GenerationResult {
    /// Reduce an ordered chunk sequence into a result
    ///
    /// Deterministic: the same chunk sequence always produces the same
    /// result. Chunks after the first terminal chunk are ignored, matching
    /// the stream invariant that none exist.
    pub fn from_chunks<I>(chunks: I, duration: Duration) -> Self
    where
        I: IntoIterator<Item = GenerationChunk>,
    {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut finish_reason = None;
        let mut usage = None;
        let mut tokens_per_second = 0.0;

        for chunk in chunks {
            text.push_str(&chunk.text);
            if let Some(call) = chunk.tool_call {
                tool_calls.push(call);
            }
            tokens_per_second = chunk.tokens_per_second;
            if let Some(reason) = chunk.finish_reason {
                finish_reason = Some(reason);
                usage = chunk.usage;
                break;
            }
        }

        Self {
            text,
            tool_calls,
            finish_reason: finish_reason.unwrap_or(FinishReason::Stop),
            usage,
            duration,
            tokens_per_second,
        }
    }

    /// Expand a single-shot result into an equivalent chunk sequence
    ///
    /// Lets non-streaming providers present the same incremental interface
    /// as streaming ones: text first, then one chunk per tool call, then
    /// the terminal chunk.
    pub fn into_chunks(self) -> Vec<GenerationChunk> {
        let tokens = self.usage.map_or(0, |u| u.output_tokens);
        let mut chunks = Vec::with_capacity(self.tool_calls.len() + 2);

        if !self.text.is_empty() {
            chunks.push(GenerationChunk {
                text: self.text,
                tokens,
                tokens_per_second: self.tokens_per_second,
                tool_call: None,
                finish_reason: None,
                usage: None,
            });
        }

        for call in self.tool_calls {
            chunks.push(GenerationChunk {
                text: String::new(),
                tokens,
                tokens_per_second: self.tokens_per_second,
                tool_call: Some(call),
                finish_reason: None,
                usage: None,
            });
        }

        chunks.push(GenerationChunk {
            text: String::new(),
            tokens,
            tokens_per_second: self.tokens_per_second,
            tool_call: None,
            finish_reason: Some(self.finish_reason),
            usage: self.usage,
        });

        chunks
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn text_chunk(text: &str) -> GenerationChunk {
        GenerationChunk {
            text: text.to_owned(),
            tokens: 1,
            tokens_per_second: 10.0,
            tool_call: None,
            finish_reason: None,
            usage: None,
        }
    }

    fn final_chunk(reason: FinishReason) -> GenerationChunk {
        GenerationChunk {
            text: String::new(),
            tokens: 2,
            tokens_per_second: 12.0,
            tool_call: None,
            finish_reason: Some(reason),
            usage: Some(Usage {
                input_tokens: 5,
                output_tokens: 2,
            }),
        }
    }

    #[test]
    fn from_chunks_concatenates_text_in_order() {
        let chunks = vec![
            text_chunk("Hello "),
            text_chunk("world"),
            final_chunk(FinishReason::Stop),
        ];

        let result = GenerationResult::from_chunks(chunks, Duration::from_secs(1));
        assert_eq!(result.text, "Hello world");
        assert_eq!(result.finish_reason, FinishReason::Stop);
        assert_eq!(result.usage.unwrap().total_tokens(), 7);
        assert_eq!(result.tokens_per_second, 12.0);
    }

    #[test]
    fn from_chunks_stops_at_terminal_chunk() {
        let chunks = vec![
            text_chunk("kept"),
            final_chunk(FinishReason::MaxTokens),
            text_chunk("ignored"),
        ];

        let result = GenerationResult::from_chunks(chunks, Duration::from_secs(1));
        assert_eq!(result.text, "kept");
        assert_eq!(result.finish_reason, FinishReason::MaxTokens);
    }

    #[test]
    fn from_chunks_collects_tool_calls_in_emission_order() {
        let call = |id: &str| ToolCall {
            id: id.to_owned(),
            name: "get_time".to_owned(),
            arguments: "{}".to_owned(),
        };
        let chunks = vec![
            GenerationChunk {
                tool_call: Some(call("b")),
                ..text_chunk("")
            },
            GenerationChunk {
                tool_call: Some(call("a")),
                ..text_chunk("")
            },
            final_chunk(FinishReason::ToolCall),
        ];

        let result = GenerationResult::from_chunks(chunks, Duration::from_secs(1));
        assert_eq!(result.tool_calls.len(), 2);
        assert_eq!(result.tool_calls[0].id, "b");
        assert_eq!(result.tool_calls[1].id, "a");
    }

    #[test]
    fn into_chunks_round_trips_through_from_chunks() {
        let result = GenerationResult {
            text: "answer".to_owned(),
            tool_calls: vec![ToolCall {
                id: "tc_1".to_owned(),
                name: "get_weather".to_owned(),
                arguments: r#"{"city":"Oslo"}"#.to_owned(),
            }],
            finish_reason: FinishReason::ToolCall,
            usage: Some(Usage {
                input_tokens: 10,
                output_tokens: 4,
            }),
            duration: Duration::from_secs(2),
            tokens_per_second: 2.0,
        };

        let chunks = result.clone().into_chunks();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.last().unwrap().is_final());

        let reduced = GenerationResult::from_chunks(chunks, Duration::from_secs(2));
        assert_eq!(reduced.text, result.text);
        assert_eq!(reduced.tool_calls, result.tool_calls);
        assert_eq!(reduced.finish_reason, result.finish_reason);
        assert_eq!(reduced.usage, result.usage);
    }

    #[test]
    fn into_chunks_skips_empty_text_chunk() {
        let result = GenerationResult {
            text: String::new(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: None,
            duration: Duration::from_secs(1),
            tokens_per_second: 0.0,
        };

        let chunks = result.into_chunks();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_final());
    }
}
