//! Conversion between canonical types and the block-oriented wire format

use std::collections::HashSet;
use std::time::Duration;

use estuary_core::{
    Content, ContentPart, FinishReason, GenerateRequest, GenerationResult, Message, Role, ToolCall,
    ToolChoice, Usage,
};

use crate::error::AiError;
use crate::event::ProviderEvent;
use crate::frame::RawFrame;
use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicImageSource, AnthropicMessage,
    AnthropicRequest, AnthropicResponse, AnthropicResponseBlock, AnthropicStreamContentBlock,
    AnthropicStreamDelta, AnthropicStreamEvent, AnthropicTool, AnthropicToolChoice,
    KNOWN_STREAM_EVENT_TYPES,
};

use super::EventAdapter;

/// Default max tokens when not specified (this API requires the field)
const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Outbound: canonical request -> wire format --

impl From<&GenerateRequest> for AnthropicRequest {
    fn from(req: &GenerateRequest) -> Self {
        let mut system = None;
        let mut messages = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system = Some(msg.content.as_text()),
                _ => messages.push(message_to_wire(msg)),
            }
        }

        let tools = if req.config.tools.is_empty() {
            None
        } else {
            Some(
                req.config
                    .tools
                    .iter()
                    .map(|t| AnthropicTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.parameters.clone(),
                    })
                    .collect(),
            )
        };

        Self {
            model: req.model.clone(),
            max_tokens: req.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages,
            temperature: req.config.temperature,
            top_p: req.config.top_p,
            top_k: req.config.top_k,
            stop_sequences: if req.config.stop.is_empty() {
                None
            } else {
                Some(req.config.stop.clone())
            },
            stream: None,
            tools,
            tool_choice: req.config.tool_choice.as_ref().map(tool_choice_to_wire),
        }
    }
}

fn message_to_wire(msg: &Message) -> AnthropicMessage {
    // Tool results travel as user-role tool_result blocks
    if msg.role == Role::Tool
        && let Some(tool_call_id) = &msg.tool_call_id
    {
        return AnthropicMessage {
            role: "user".to_owned(),
            content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                tool_use_id: tool_call_id.clone(),
                content: Some(msg.content.as_text()),
            }]),
        };
    }

    let role = match msg.role {
        Role::Assistant => "assistant",
        Role::User | Role::System | Role::Tool => "user",
    };

    let content = match &msg.content {
        Content::Text(text) => AnthropicContent::Text(text.clone()),
        Content::Parts(parts) => {
            let blocks = parts.iter().filter_map(part_to_block).collect();
            AnthropicContent::Blocks(blocks)
        }
    };

    AnthropicMessage {
        role: role.to_owned(),
        content,
    }
}

fn part_to_block(part: &ContentPart) -> Option<AnthropicContentBlock> {
    match part {
        ContentPart::Text { text } => Some(AnthropicContentBlock::Text { text: text.clone() }),
        ContentPart::Image { url, media_type } => {
            let source = if let Some(rest) = url.strip_prefix("data:")
                && let Some((mime_and_encoding, data)) = rest.split_once(',')
            {
                let media_type = mime_and_encoding
                    .strip_suffix(";base64")
                    .unwrap_or(mime_and_encoding);
                AnthropicImageSource {
                    source_type: "base64".to_owned(),
                    media_type: Some(media_type.to_owned()),
                    data: data.to_owned(),
                }
            } else {
                AnthropicImageSource {
                    source_type: "url".to_owned(),
                    media_type: media_type.clone(),
                    data: url.clone(),
                }
            };
            Some(AnthropicContentBlock::Image { source })
        }
        ContentPart::Audio { .. } => {
            // This wire family has no audio block type
            tracing::debug!("dropping audio content part unsupported by wire format");
            None
        }
    }
}

fn tool_choice_to_wire(choice: &ToolChoice) -> AnthropicToolChoice {
    match choice {
        // This family has no "none" mode; both map to auto
        ToolChoice::Auto | ToolChoice::None => AnthropicToolChoice {
            choice_type: "auto".to_owned(),
            name: None,
        },
        ToolChoice::Required => AnthropicToolChoice {
            choice_type: "any".to_owned(),
            name: None,
        },
        ToolChoice::Tool { name } => AnthropicToolChoice {
            choice_type: "tool".to_owned(),
            name: Some(name.clone()),
        },
    }
}

// -- Inbound: non-streaming response -> canonical result (family C) --

/// Reduce a non-streaming response to a `GenerationResult`
pub fn response_into_result(resp: AnthropicResponse, duration: Duration) -> GenerationResult {
    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in resp.content {
        match block {
            AnthropicResponseBlock::Text { text: t } => text.push_str(&t),
            AnthropicResponseBlock::ToolUse { id, name, input } => {
                let arguments =
                    serde_json::to_string(&input).unwrap_or_else(|_| "{}".to_owned());
                tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments,
                });
            }
        }
    }

    let finish_reason = resp
        .stop_reason
        .as_deref()
        .map_or(FinishReason::Stop, map_stop_reason);

    let usage = Usage {
        input_tokens: resp.usage.input_tokens,
        output_tokens: resp.usage.output_tokens,
    };

    let elapsed = duration.as_secs_f64();
    let tokens_per_second = if elapsed > 0.0 {
        f64::from(usage.output_tokens) / elapsed
    } else {
        0.0
    };

    GenerationResult {
        text,
        tool_calls,
        finish_reason,
        usage: Some(usage),
        duration,
        tokens_per_second,
    }
}

/// Per-provider finish reason table; unrecognized values default to `Stop`
/// rather than failing the generation
fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::MaxTokens,
        "tool_use" => FinishReason::ToolCall,
        "stop_sequence" => FinishReason::StopSequence,
        "content_filter" => FinishReason::ContentFilter,
        // "end_turn", "stop", and anything future-shaped
        _ => FinishReason::Stop,
    }
}

// -- Streaming: wire events -> internal event vocabulary --

/// Stateful adapter for the block-oriented stream protocol
#[derive(Debug, Default)]
pub struct AnthropicAdapter {
    /// Indices of content blocks known to be tool calls
    tool_blocks: HashSet<u32>,
    /// Input tokens reported at stream open, merged into final usage
    input_tokens: Option<u32>,
    /// Whether a `Completed` event has been produced
    completed: bool,
}

impl AnthropicAdapter {
    /// Create a fresh adapter for one request
    pub fn new() -> Self {
        Self::default()
    }

    fn on_event(&mut self, event: AnthropicStreamEvent) -> Vec<ProviderEvent> {
        match event {
            AnthropicStreamEvent::Ping => Vec::new(),

            AnthropicStreamEvent::MessageStart { message } => {
                // Stream-open event is diagnostics only, but it carries the
                // prompt token count the terminal usage needs
                self.input_tokens = message
                    .pointer("/usage/input_tokens")
                    .and_then(serde_json::Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok());
                Vec::new()
            }

            AnthropicStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => match content_block {
                AnthropicStreamContentBlock::Text { .. } => Vec::new(),
                AnthropicStreamContentBlock::ToolUse { id, name } => {
                    self.tool_blocks.insert(index);
                    vec![ProviderEvent::ToolCallStarted { index, id, name }]
                }
            },

            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                AnthropicStreamDelta::TextDelta { text } => {
                    vec![ProviderEvent::TextDelta(text)]
                }
                AnthropicStreamDelta::InputJsonDelta { partial_json } => {
                    vec![ProviderEvent::ToolCallArgumentDelta {
                        index,
                        fragment: partial_json,
                    }]
                }
            },

            AnthropicStreamEvent::ContentBlockStop { index } => {
                if self.tool_blocks.remove(&index) {
                    vec![ProviderEvent::ToolCallEnded { index }]
                } else {
                    Vec::new()
                }
            }

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let Some(reason) = delta.stop_reason.as_deref() else {
                    return Vec::new();
                };

                self.completed = true;
                let usage = usage.map(|u| Usage {
                    input_tokens: if u.input_tokens > 0 {
                        u.input_tokens
                    } else {
                        self.input_tokens.unwrap_or(0)
                    },
                    output_tokens: u.output_tokens,
                });

                vec![ProviderEvent::Completed {
                    finish_reason: map_stop_reason(reason),
                    usage,
                }]
            }

            AnthropicStreamEvent::MessageStop => {
                if self.completed {
                    Vec::new()
                } else {
                    // A stop reason normally arrives in message_delta first;
                    // a bare message_stop still terminates the stream
                    self.completed = true;
                    vec![ProviderEvent::Completed {
                        finish_reason: FinishReason::Stop,
                        usage: self.input_tokens.map(|input_tokens| Usage {
                            input_tokens,
                            output_tokens: 0,
                        }),
                    }]
                }
            }
        }
    }
}

impl EventAdapter for AnthropicAdapter {
    fn adapt(&mut self, frame: &RawFrame) -> Result<Vec<ProviderEvent>, AiError> {
        match serde_json::from_str::<AnthropicStreamEvent>(&frame.data) {
            Ok(event) => Ok(self.on_event(event)),
            Err(e) => {
                // Unknown future event types are skipped; malformed payloads
                // of known types are decode errors
                let tag = serde_json::from_str::<serde_json::Value>(&frame.data)
                    .ok()
                    .and_then(|v| {
                        v.get("type")
                            .and_then(serde_json::Value::as_str)
                            .map(ToOwned::to_owned)
                    });

                match tag {
                    Some(tag) if !KNOWN_STREAM_EVENT_TYPES.contains(&tag.as_str()) => {
                        tracing::debug!(event_type = %tag, "skipping unrecognized stream event");
                        Ok(Vec::new())
                    }
                    _ => Err(AiError::Decode {
                        context: format!("malformed stream event: {e}"),
                    }),
                }
            }
        }
    }
}
