//! Conversion between canonical types and the delta-array wire format

use std::collections::HashSet;
use std::time::Duration;

use estuary_core::{
    Content, ContentPart, FinishReason, GenerateRequest, GenerationResult, Message, Role, ToolCall,
    ToolChoice, Usage,
};

use crate::error::AiError;
use crate::event::ProviderEvent;
use crate::frame::RawFrame;
use crate::protocol::openai::{
    OpenAiContent, OpenAiContentPart, OpenAiFunction, OpenAiImageUrl, OpenAiInputAudio,
    OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiTool,
};

use super::EventAdapter;

/// Sentinel frame terminating an SSE-framed stream
const DONE_SENTINEL: &str = "[DONE]";

// -- Outbound: canonical request -> wire format --

impl From<&GenerateRequest> for OpenAiRequest {
    fn from(req: &GenerateRequest) -> Self {
        let tools = if req.config.tools.is_empty() {
            None
        } else {
            Some(
                req.config
                    .tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: "function".to_owned(),
                        function: OpenAiFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.parameters.clone(),
                        },
                    })
                    .collect(),
            )
        };

        Self {
            model: req.model.clone(),
            messages: req.messages.iter().map(message_to_wire).collect(),
            temperature: req.config.temperature,
            top_p: req.config.top_p,
            max_tokens: req.config.max_tokens,
            stop: if req.config.stop.is_empty() {
                None
            } else {
                Some(req.config.stop.clone())
            },
            stream: None,
            stream_options: None,
            tools,
            tool_choice: req.config.tool_choice.as_ref().map(tool_choice_to_wire),
        }
    }
}

fn message_to_wire(msg: &Message) -> OpenAiMessage {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let content = match &msg.content {
        Content::Text(text) => OpenAiContent::Text(text.clone()),
        Content::Parts(parts) => {
            OpenAiContent::Parts(parts.iter().map(part_to_wire).collect())
        }
    };

    OpenAiMessage {
        role: role.to_owned(),
        content: Some(content),
        tool_calls: None,
        tool_call_id: msg.tool_call_id.clone(),
    }
}

fn part_to_wire(part: &ContentPart) -> OpenAiContentPart {
    match part {
        ContentPart::Text { text } => OpenAiContentPart::Text { text: text.clone() },
        ContentPart::Image { url, .. } => OpenAiContentPart::ImageUrl {
            image_url: OpenAiImageUrl { url: url.clone() },
        },
        ContentPart::Audio { url, media_type } => OpenAiContentPart::InputAudio {
            input_audio: OpenAiInputAudio {
                data: url.clone(),
                format: media_type
                    .as_deref()
                    .and_then(|m| m.strip_prefix("audio/"))
                    .map(ToOwned::to_owned),
            },
        },
    }
}

fn tool_choice_to_wire(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => serde_json::Value::String("auto".to_owned()),
        ToolChoice::None => serde_json::Value::String("none".to_owned()),
        ToolChoice::Required => serde_json::Value::String("required".to_owned()),
        ToolChoice::Tool { name } => serde_json::json!({
            "type": "function",
            "function": { "name": name }
        }),
    }
}

// -- Inbound: non-streaming response -> canonical result (family C) --

/// Reduce a non-streaming response to a `GenerationResult`
pub fn response_into_result(resp: OpenAiResponse, duration: Duration) -> GenerationResult {
    let choice = resp.choices.into_iter().next();

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut finish_reason = FinishReason::Stop;

    if let Some(choice) = choice {
        if let Some(content) = choice.message.content {
            text = content;
        }
        if let Some(calls) = choice.message.tool_calls {
            tool_calls = calls
                .into_iter()
                .map(|tc| ToolCall {
                    id: tc.id,
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                })
                .collect();
        }
        if let Some(reason) = choice.finish_reason.as_deref() {
            finish_reason = map_finish_reason(reason);
        }
    }

    let usage = resp.usage.map(|u| Usage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });

    let elapsed = duration.as_secs_f64();
    let tokens_per_second = match usage {
        Some(u) if elapsed > 0.0 => f64::from(u.output_tokens) / elapsed,
        _ => 0.0,
    };

    GenerationResult {
        text,
        tool_calls,
        finish_reason,
        usage,
        duration,
        tokens_per_second,
    }
}

/// Per-provider finish reason table; unrecognized values default to `Stop`
/// rather than failing the generation
fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" | "max_tokens" => FinishReason::MaxTokens,
        "tool_calls" | "function_call" => FinishReason::ToolCall,
        "content_filter" => FinishReason::ContentFilter,
        // "stop", "eos_token", and anything future-shaped
        _ => FinishReason::Stop,
    }
}

// -- Streaming: wire chunks -> internal event vocabulary --

/// Stateful adapter for the delta-array stream protocol
///
/// This family never closes tool calls explicitly: a call ends when a new
/// index starts or when the choice's finish reason arrives. SSE-framed
/// streams terminate with a `[DONE]` sentinel after an optional usage-only
/// chunk; line-framed local engines simply stop after the finish reason,
/// so those complete eagerly.
#[derive(Debug)]
pub struct OpenAiAdapter {
    /// Indices that have produced a start event
    started: HashSet<u32>,
    /// Most recently started index, closed implicitly
    open_index: Option<u32>,
    /// Finish reason stashed until the stream terminates
    finish_reason: Option<FinishReason>,
    /// Usage stashed from a usage-bearing chunk
    usage: Option<Usage>,
    /// Complete on finish reason instead of waiting for `[DONE]`
    eager_complete: bool,
    /// Whether a `Completed` event has been produced
    completed: bool,
}

impl OpenAiAdapter {
    /// Adapter for an SSE-framed stream terminated by `[DONE]`
    pub fn new() -> Self {
        Self {
            started: HashSet::new(),
            open_index: None,
            finish_reason: None,
            usage: None,
            eager_complete: false,
            completed: false,
        }
    }

    /// Adapter for a line-framed stream with no terminating sentinel
    pub fn eager() -> Self {
        Self {
            eager_complete: true,
            ..Self::new()
        }
    }

    fn complete(&mut self) -> ProviderEvent {
        self.completed = true;
        ProviderEvent::Completed {
            finish_reason: self.finish_reason.take().unwrap_or(FinishReason::Stop),
            usage: self.usage.take(),
        }
    }

    fn on_chunk(&mut self, chunk: OpenAiStreamChunk) -> Vec<ProviderEvent> {
        let mut events = Vec::new();

        if let Some(u) = chunk.usage {
            self.usage = Some(Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            });
        }

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(content) = choice.delta.content {
                events.push(ProviderEvent::TextDelta(content));
            }

            for tc in choice.delta.tool_calls.unwrap_or_default() {
                if !self.started.contains(&tc.index) {
                    if let Some(id) = tc.id.clone() {
                        // A new index implicitly ends the previous call
                        if let Some(prev) = self.open_index.replace(tc.index) {
                            events.push(ProviderEvent::ToolCallEnded { index: prev });
                        }
                        self.started.insert(tc.index);
                        let name = tc
                            .function
                            .as_ref()
                            .and_then(|f| f.name.clone())
                            .unwrap_or_default();
                        events.push(ProviderEvent::ToolCallStarted {
                            index: tc.index,
                            id,
                            name,
                        });
                    } else {
                        tracing::debug!(
                            index = tc.index,
                            "tool call fragment before any id, leaving to assembler policy"
                        );
                    }
                }

                if let Some(arguments) = tc.function.and_then(|f| f.arguments)
                    && !arguments.is_empty()
                {
                    events.push(ProviderEvent::ToolCallArgumentDelta {
                        index: tc.index,
                        fragment: arguments,
                    });
                }
            }

            if let Some(reason) = choice.finish_reason.as_deref() {
                if let Some(open) = self.open_index.take() {
                    events.push(ProviderEvent::ToolCallEnded { index: open });
                }
                self.finish_reason = Some(map_finish_reason(reason));
                if self.eager_complete {
                    events.push(self.complete());
                }
            }
        }

        events
    }
}

impl Default for OpenAiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventAdapter for OpenAiAdapter {
    fn adapt(&mut self, frame: &RawFrame) -> Result<Vec<ProviderEvent>, AiError> {
        if frame.data == DONE_SENTINEL {
            if self.completed {
                return Ok(Vec::new());
            }
            return Ok(vec![self.complete()]);
        }

        if self.completed {
            tracing::debug!("skipping frame after stream completion");
            return Ok(Vec::new());
        }

        let chunk: OpenAiStreamChunk =
            serde_json::from_str(&frame.data).map_err(|e| AiError::Decode {
                context: format!("malformed stream chunk: {e}"),
            })?;

        Ok(self.on_chunk(chunk))
    }
}
