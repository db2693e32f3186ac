//! Wire-transport frame decoding
//!
//! Splits a raw byte source into discrete provider-native frames before any
//! protocol-specific interpretation. Two framings cover the supported wire
//! families: server-sent events and one-JSON-object-per-line.

use std::pin::Pin;

use eventsource_stream::{Eventsource, EventStreamError};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::AiError;

/// An ordered source of raw bytes plus a way for the transport to surface
/// failures; the engine never opens connections itself
pub type ByteSource = Pin<Box<dyn Stream<Item = Result<Vec<u8>, AiError>> + Send>>;

/// A lazily decoded sequence of frames
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<RawFrame, AiError>> + Send>>;

/// One discrete unit of the wire transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// SSE event name, when the framing carries one
    pub event: Option<String>,
    /// Frame payload with multi-line continuations already folded
    pub data: String,
}

/// How a provider frames its event stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// `event:`/`data:` server-sent events
    #[default]
    Sse,
    /// One JSON object per line
    JsonLines,
}

/// Decode a byte source into frames
///
/// Lazy and pull-based: input is consumed only as frames are requested.
/// Keep-alive lines and comments are skipped; malformed framing (including
/// an unterminated multi-byte sequence at end of input) surfaces a decode
/// error rather than silently truncating.
pub fn frames(source: ByteSource, framing: Framing) -> FrameStream {
    match framing {
        Framing::Sse => sse_frames(source),
        Framing::JsonLines => json_line_frames(source),
    }
}

fn sse_frames(source: ByteSource) -> FrameStream {
    Box::pin(async_stream::stream! {
        let mut events = source.eventsource();
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let data = event.data.trim().to_owned();
                    if data.is_empty() {
                        continue;
                    }
                    let kind = if event.event.is_empty() || event.event == "message" {
                        None
                    } else {
                        Some(event.event)
                    };
                    yield Ok(RawFrame { event: kind, data });
                }
                Err(EventStreamError::Transport(e)) => {
                    yield Err(e);
                    return;
                }
                Err(e) => {
                    yield Err(AiError::Decode {
                        context: format!("malformed event stream: {e}"),
                    });
                    return;
                }
            }
        }
    })
}

fn json_line_frames(mut source: ByteSource) -> FrameStream {
    Box::pin(async_stream::stream! {
        let mut buf: Vec<u8> = Vec::new();

        while let Some(item) = source.next().await {
            match item {
                Ok(bytes) => {
                    buf.extend_from_slice(&bytes);
                    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        match line_to_frame(&line) {
                            Ok(Some(frame)) => yield Ok(frame),
                            Ok(None) => {}
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        // Final frame need not be newline-terminated
        if !buf.is_empty() {
            match line_to_frame(&buf) {
                Ok(Some(frame)) => yield Ok(frame),
                Ok(None) => {}
                Err(e) => yield Err(e),
            }
        }
    })
}

/// Decode one line into a frame, skipping blank keep-alive lines
fn line_to_frame(line: &[u8]) -> Result<Option<RawFrame>, AiError> {
    let text = std::str::from_utf8(line).map_err(|e| AiError::Decode {
        context: format!("invalid UTF-8 in line-framed stream: {e}"),
    })?;

    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    Ok(Some(RawFrame {
        event: None,
        data: text.to_owned(),
    }))
}
