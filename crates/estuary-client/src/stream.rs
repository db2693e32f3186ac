//! The canonical generation pipeline
//!
//! Drives frames through a protocol adapter and the tool-call assembler,
//! producing the externally visible chunk sequence. One sequential,
//! pull-based pipeline per request: the blocking read happens only when the
//! consumer polls, which provides natural backpressure. All bookkeeping is
//! request-scoped, so concurrent requests share nothing.

use std::pin::Pin;
use std::time::Instant;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use estuary_core::{FinishReason, GenerationChunk, ToolCall, Usage};

use crate::assembler::ToolCallAssembler;
use crate::convert::EventAdapter;
use crate::error::AiError;
use crate::event::ProviderEvent;
use crate::frame::FrameStream;

/// The externally visible sequence of generation chunks
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<GenerationChunk, AiError>> + Send>>;

/// Withholds the trailing bytes of pending text until they are proven not
/// to complete a configured stop sequence
///
/// Keeps a tail of `longest stop − 1` bytes unflushed so a stop sequence
/// split across deltas can never leak into visible output. Flush points
/// are adjusted down to UTF-8 char boundaries.
#[derive(Debug)]
struct Holdback {
    buf: String,
    tail: usize,
    stops: Vec<String>,
}

/// Outcome of feeding one delta through the holdback buffer
#[derive(Debug, PartialEq, Eq)]
enum Scan {
    /// Text cleared for emission (possibly empty)
    Released(String),
    /// A stop sequence matched; the matched suffix and everything after it
    /// are trimmed and only the preceding text is released
    StopHit {
        /// Text preceding the stop sequence
        released: String,
    },
}

impl Holdback {
    fn new(stops: Vec<String>) -> Self {
        let tail = stops
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .saturating_sub(1);
        Self {
            buf: String::new(),
            tail,
            stops,
        }
    }

    fn push(&mut self, delta: &str) -> Scan {
        self.buf.push_str(delta);

        let earliest = self
            .stops
            .iter()
            .filter_map(|stop| self.buf.find(stop.as_str()))
            .min();
        if let Some(pos) = earliest {
            let released = self.buf[..pos].to_owned();
            self.buf.clear();
            return Scan::StopHit { released };
        }

        if self.tail == 0 {
            return Scan::Released(std::mem::take(&mut self.buf));
        }

        let mut flush_upto = self.buf.len().saturating_sub(self.tail);
        while flush_upto > 0 && !self.buf.is_char_boundary(flush_upto) {
            flush_upto -= 1;
        }
        let released: String = self.buf.drain(..flush_upto).collect();
        Scan::Released(released)
    }

    /// Release the held tail at stream end; any full stop sequence would
    /// already have matched on an earlier push
    fn flush(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }
}

/// Chunk construction with running throughput accounting
struct Emitter {
    tokens: u32,
    started: Instant,
}

impl Emitter {
    fn new() -> Self {
        Self {
            tokens: 0,
            started: Instant::now(),
        }
    }

    fn tokens_per_second(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            f64::from(self.tokens) / elapsed
        } else {
            0.0
        }
    }

    fn text(&self, text: String) -> GenerationChunk {
        GenerationChunk {
            text,
            tokens: self.tokens,
            tokens_per_second: self.tokens_per_second(),
            tool_call: None,
            finish_reason: None,
            usage: None,
        }
    }

    fn tool(&self, call: ToolCall) -> GenerationChunk {
        GenerationChunk {
            text: String::new(),
            tokens: self.tokens,
            tokens_per_second: self.tokens_per_second(),
            tool_call: Some(call),
            finish_reason: None,
            usage: None,
        }
    }

    fn terminal(&self, finish_reason: FinishReason, usage: Option<Usage>) -> GenerationChunk {
        GenerationChunk {
            text: String::new(),
            tokens: self.tokens,
            tokens_per_second: self.tokens_per_second(),
            tool_call: None,
            finish_reason: Some(finish_reason),
            usage,
        }
    }
}

/// Run one generation request through the canonical pipeline
///
/// States run Idle → Streaming → {Completed | Cancelled | Errored}, all
/// terminal states final. Exactly one terminal chunk is produced on the
/// Completed and Cancelled paths; a transport or decode failure surfaces
/// as `Err` with no terminal chunk, leaving already-emitted output
/// standing. Cancellation is cooperative, observed before each read and
/// each emission; once observed, no further input is consumed.
pub fn generation_stream(
    mut frames: FrameStream,
    mut adapter: Box<dyn EventAdapter>,
    stop_sequences: Vec<String>,
    cancel: CancellationToken,
) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let mut emitter = Emitter::new();
        let mut holdback = Holdback::new(stop_sequences);
        let mut assembler = ToolCallAssembler::new();

        loop {
            let item = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    yield Ok(emitter.terminal(FinishReason::Cancelled, None));
                    return;
                }
                item = frames.next() => item,
            };

            let frame = match item {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    yield Err(e);
                    return;
                }
                None => {
                    yield Err(AiError::Decode {
                        context: "stream ended without a completion event".to_owned(),
                    });
                    return;
                }
            };

            let events = match adapter.adapt(&frame) {
                Ok(events) => events,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for event in events {
                if cancel.is_cancelled() {
                    yield Ok(emitter.terminal(FinishReason::Cancelled, None));
                    return;
                }

                match event {
                    ProviderEvent::TextDelta(delta) => {
                        emitter.tokens += 1;
                        match holdback.push(&delta) {
                            Scan::Released(text) => {
                                yield Ok(emitter.text(text));
                            }
                            Scan::StopHit { released } => {
                                if !released.is_empty() {
                                    yield Ok(emitter.text(released));
                                }
                                yield Ok(emitter.terminal(FinishReason::StopSequence, None));
                                return;
                            }
                        }
                    }

                    ProviderEvent::ToolCallStarted { index, id, name } => {
                        if let Err(e) = assembler.start(index, id, name) {
                            yield Err(e);
                            return;
                        }
                    }

                    ProviderEvent::ToolCallArgumentDelta { index, fragment } => {
                        assembler.append(index, &fragment);
                    }

                    ProviderEvent::ToolCallEnded { index } => {
                        match assembler.end(index) {
                            Ok(Some(call)) => yield Ok(emitter.tool(call)),
                            Ok(None) => {}
                            Err(e) => {
                                yield Err(e);
                                return;
                            }
                        }
                    }

                    ProviderEvent::Completed { finish_reason, usage } => {
                        let tail = holdback.flush();
                        if !tail.is_empty() {
                            yield Ok(emitter.text(tail));
                        }
                        for call in assembler.finish() {
                            yield Ok(emitter.tool(call));
                        }
                        yield Ok(emitter.terminal(finish_reason, usage));
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::frame::RawFrame;

    /// Test adapter driven by compact frame scripts:
    /// `text:…`, `start:index,id,name`, `args:index,fragment`,
    /// `end:index`, `done:reason`
    struct ScriptAdapter;

    impl EventAdapter for ScriptAdapter {
        fn adapt(&mut self, frame: &RawFrame) -> Result<Vec<ProviderEvent>, AiError> {
            let (kind, rest) = frame.data.split_once(':').unwrap_or((frame.data.as_str(), ""));
            let event = match kind {
                "text" => ProviderEvent::TextDelta(rest.to_owned()),
                "start" => {
                    let mut parts = rest.splitn(3, ',');
                    ProviderEvent::ToolCallStarted {
                        index: parts.next().unwrap().parse().unwrap(),
                        id: parts.next().unwrap().to_owned(),
                        name: parts.next().unwrap().to_owned(),
                    }
                }
                "args" => {
                    let (index, fragment) = rest.split_once(',').unwrap();
                    ProviderEvent::ToolCallArgumentDelta {
                        index: index.parse().unwrap(),
                        fragment: fragment.to_owned(),
                    }
                }
                "end" => ProviderEvent::ToolCallEnded {
                    index: rest.parse().unwrap(),
                },
                "done" => ProviderEvent::Completed {
                    finish_reason: match rest {
                        "tool" => FinishReason::ToolCall,
                        _ => FinishReason::Stop,
                    },
                    usage: Some(Usage {
                        input_tokens: 3,
                        output_tokens: 5,
                    }),
                },
                other => panic!("bad script frame: {other}"),
            };
            Ok(vec![event])
        }
    }

    fn script(frames: &[&str]) -> FrameStream {
        let items: Vec<Result<RawFrame, AiError>> = frames
            .iter()
            .map(|data| {
                Ok(RawFrame {
                    event: None,
                    data: (*data).to_owned(),
                })
            })
            .collect();
        Box::pin(futures_util::stream::iter(items))
    }

    fn pipeline(frames: FrameStream, stops: Vec<String>) -> ChunkStream {
        generation_stream(frames, Box::new(ScriptAdapter), stops, CancellationToken::new())
    }

    async fn collect(stream: ChunkStream) -> Vec<Result<GenerationChunk, AiError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn text_concatenation_reconstructs_completion() {
        let chunks = collect(pipeline(
            script(&["text:Hello ", "text:world", "done:stop"]),
            Vec::new(),
        ))
        .await;

        let text: String = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().text.as_str())
            .collect();
        assert_eq!(text, "Hello world");

        let last = chunks.last().unwrap().as_ref().unwrap();
        assert_eq!(last.finish_reason, Some(FinishReason::Stop));
        assert_eq!(
            last.usage,
            Some(Usage {
                input_tokens: 3,
                output_tokens: 5,
            })
        );

        // Exactly one terminal chunk, and it is the last
        let finals = chunks
            .iter()
            .filter(|c| c.as_ref().unwrap().is_final())
            .count();
        assert_eq!(finals, 1);
    }

    #[tokio::test]
    async fn split_stop_sequence_is_trimmed_and_stream_halts() {
        // Stop "END" arrives split as "EN" + "D!"; the "!" must never leak
        let chunks = collect(pipeline(
            script(&[
                "text:Hello wo",
                "text:rld EN",
                "text:D!",
                "text:should never be read",
                "done:stop",
            ]),
            vec!["END".to_owned()],
        ))
        .await;

        let text: String = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().text.as_str())
            .collect();
        assert_eq!(text, "Hello world ");

        let last = chunks.last().unwrap().as_ref().unwrap();
        assert_eq!(last.finish_reason, Some(FinishReason::StopSequence));
    }

    #[tokio::test]
    async fn held_tail_is_flushed_at_completion() {
        // "EN" is withheld as a possible stop prefix, then released at end
        let chunks = collect(pipeline(
            script(&["text:value EN", "done:stop"]),
            vec!["END".to_owned()],
        ))
        .await;

        let text: String = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().text.as_str())
            .collect();
        assert_eq!(text, "value EN");
    }

    #[tokio::test]
    async fn multibyte_text_never_splits_char_boundaries() {
        let chunks = collect(pipeline(
            script(&["text:héllo wö", "text:rld — fin", "done:stop"]),
            vec!["ENDSTOP".to_owned()],
        ))
        .await;

        let text: String = chunks
            .iter()
            .map(|c| c.as_ref().unwrap().text.as_str())
            .collect();
        assert_eq!(text, "héllo wörld — fin");
    }

    #[tokio::test]
    async fn tool_calls_emit_individually_in_close_order() {
        let chunks = collect(pipeline(
            script(&[
                "start:0,w,get_weather",
                "start:1,t,get_time",
                r#"args:0,{"city""#,
                r#"args:1,{"tz""#,
                r#"args:0,:"Oslo"}"#,
                r#"args:1,:"UTC"}"#,
                "end:1",
                "end:0",
                "done:tool",
            ]),
            Vec::new(),
        ))
        .await;

        let calls: Vec<ToolCall> = chunks
            .iter()
            .filter_map(|c| c.as_ref().unwrap().tool_call.clone())
            .collect();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "get_time");
        assert_eq!(calls[0].arguments, r#"{"tz":"UTC"}"#);
        assert_eq!(calls[1].name, "get_weather");
        assert_eq!(calls[1].arguments, r#"{"city":"Oslo"}"#);

        let last = chunks.last().unwrap().as_ref().unwrap();
        assert_eq!(last.finish_reason, Some(FinishReason::ToolCall));
    }

    #[tokio::test]
    async fn open_calls_are_force_closed_at_completion() {
        let chunks = collect(pipeline(
            script(&["start:0,tc,lookup", r#"args:0,{"q":"x"}"#, "done:tool"]),
            Vec::new(),
        ))
        .await;

        let calls: Vec<ToolCall> = chunks
            .iter()
            .filter_map(|c| c.as_ref().unwrap().tool_call.clone())
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, r#"{"q":"x"}"#);
    }

    #[tokio::test]
    async fn cancellation_before_start_yields_single_cancelled_chunk() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        cancel.cancel(); // idempotent

        let stream = generation_stream(
            script(&["text:never", "done:stop"]),
            Box::new(ScriptAdapter),
            Vec::new(),
            cancel,
        );
        let chunks = collect(stream).await;

        assert_eq!(chunks.len(), 1);
        let only = chunks[0].as_ref().unwrap();
        assert_eq!(only.finish_reason, Some(FinishReason::Cancelled));
        assert!(only.text.is_empty());
    }

    #[tokio::test]
    async fn cancellation_mid_stream_stops_reading() {
        let cancel = CancellationToken::new();
        let head = script(&["text:partial"]);
        // After the scripted frames, the source hangs forever
        let frames: FrameStream = Box::pin(head.chain(futures_util::stream::pending()));

        let mut stream =
            generation_stream(frames, Box::new(ScriptAdapter), Vec::new(), cancel.clone());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.text, "partial");

        cancel.cancel();
        cancel.cancel();

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.finish_reason, Some(FinishReason::Cancelled));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_after_completion_adds_no_terminal_chunk() {
        let cancel = CancellationToken::new();
        let mut stream = generation_stream(
            script(&["text:done deal", "done:stop"]),
            Box::new(ScriptAdapter),
            Vec::new(),
            cancel.clone(),
        );

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.text, "done deal");
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.finish_reason, Some(FinishReason::Stop));

        // Cancelling a completed stream must not resurrect it
        cancel.cancel();
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn transport_error_mid_stream_surfaces_without_terminal_chunk() {
        let items: Vec<Result<RawFrame, AiError>> = vec![
            Ok(RawFrame {
                event: None,
                data: "text:kept".to_owned(),
            }),
            Err(AiError::Network("connection reset".to_owned())),
        ];
        let frames: FrameStream = Box::pin(futures_util::stream::iter(items));

        let chunks = collect(generation_stream(
            frames,
            Box::new(ScriptAdapter),
            Vec::new(),
            CancellationToken::new(),
        ))
        .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().text, "kept");
        assert!(matches!(chunks[1], Err(AiError::Network(_))));
    }

    #[tokio::test]
    async fn eof_without_completion_is_a_decode_error() {
        let chunks = collect(pipeline(script(&["text:dangling"]), Vec::new())).await;

        assert!(matches!(chunks.last(), Some(Err(AiError::Decode { .. }))));
    }

    #[test]
    fn holdback_releases_nothing_shorter_than_the_tail() {
        let mut holdback = Holdback::new(vec!["ENDSTOP".to_owned()]);
        assert_eq!(holdback.push("abc"), Scan::Released(String::new()));
        assert_eq!(holdback.flush(), "abc");
    }

    #[test]
    fn holdback_matches_earliest_of_multiple_stops() {
        let mut holdback = Holdback::new(vec!["STOP".to_owned(), "###".to_owned()]);
        match holdback.push("one ### two STOP") {
            Scan::StopHit { released } => assert_eq!(released, "one "),
            other => panic!("expected stop hit, got {other:?}"),
        }
    }
}
