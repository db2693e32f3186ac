//! End-to-end pipeline tests: raw wire bytes through framing, protocol
//! adaptation, assembly, and the chunk state machine.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use estuary_client::convert::EventAdapter;
use estuary_client::convert::anthropic::AnthropicAdapter;
use estuary_client::convert::openai::OpenAiAdapter;
use estuary_client::stream::generation_stream;
use estuary_client::{ByteSource, ChunkStream, Framing, frames};
use estuary_core::{FinishReason, GenerationChunk, GenerationResult, Usage};

fn byte_source(chunks: Vec<&[u8]>) -> ByteSource {
    let items: Vec<Result<Vec<u8>, estuary_client::AiError>> =
        chunks.into_iter().map(|c| Ok(c.to_vec())).collect();
    Box::pin(futures_util::stream::iter(items))
}

fn pipeline(
    bytes: Vec<&[u8]>,
    framing: Framing,
    adapter: Box<dyn EventAdapter>,
    stops: Vec<String>,
) -> ChunkStream {
    generation_stream(
        frames(byte_source(bytes), framing),
        adapter,
        stops,
        CancellationToken::new(),
    )
}

async fn collect_ok(stream: ChunkStream) -> Vec<GenerationChunk> {
    use futures_util::StreamExt;
    stream
        .map(|item| item.expect("pipeline error"))
        .collect()
        .await
}

#[tokio::test]
async fn block_oriented_sse_reduces_to_expected_result() {
    let transcript: Vec<&[u8]> = vec![
        b"event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":9}}}\n\n",
        b"event: ping\ndata: {\"type\":\"ping\"}\n\n",
        b"event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello \"}}\n\n",
        b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"world\"}}\n\n",
        b"event: content_block_stop\ndata: {\"type\":\"content_block_stop\",\"index\":0}\n\n",
        b"event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":12}}\n\n",
        b"event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
    ];

    let chunks = collect_ok(pipeline(
        transcript,
        Framing::Sse,
        Box::new(AnthropicAdapter::new()),
        Vec::new(),
    ))
    .await;

    let result = GenerationResult::from_chunks(chunks, Duration::from_secs(1));
    assert_eq!(result.text, "Hello world");
    assert_eq!(result.finish_reason, FinishReason::Stop);
    assert_eq!(
        result.usage,
        Some(Usage {
            input_tokens: 9,
            output_tokens: 12,
        })
    );
}

#[tokio::test]
async fn block_oriented_sse_trims_split_stop_sequence() {
    let transcript: Vec<&[u8]> = vec![
        b"event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n",
        b"event: content_block_start\ndata: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello wo\"}}\n\n",
        b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"rld EN\"}}\n\n",
        b"event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"D!\"}}\n\n",
    ];

    let chunks = collect_ok(pipeline(
        transcript,
        Framing::Sse,
        Box::new(AnthropicAdapter::new()),
        vec!["END".to_owned()],
    ))
    .await;

    let result = GenerationResult::from_chunks(chunks, Duration::from_secs(1));
    assert_eq!(result.text, "Hello world ");
    assert_eq!(result.finish_reason, FinishReason::StopSequence);
}

#[tokio::test]
async fn delta_array_sse_assembles_tool_call_and_usage() {
    let transcript: Vec<&[u8]> = vec![
        b"data: {\"choices\":[{\"delta\":{\"content\":\"Checking.\"}}]}\n\n",
        b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"get_weather\",\"arguments\":\"\"}}]}}]}\n\n",
        b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"city\\\"\"}}]}}]}\n\n",
        b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\":\\\"Oslo\\\"}\"}}]}}]}\n\n",
        b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
        b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":20,\"completion_tokens\":8}}\n\n",
        b"data: [DONE]\n\n",
    ];

    let chunks = collect_ok(pipeline(
        transcript,
        Framing::Sse,
        Box::new(OpenAiAdapter::new()),
        Vec::new(),
    ))
    .await;

    let result = GenerationResult::from_chunks(chunks, Duration::from_secs(1));
    assert_eq!(result.text, "Checking.");
    assert_eq!(result.finish_reason, FinishReason::ToolCall);
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].id, "call_1");
    assert_eq!(result.tool_calls[0].name, "get_weather");
    assert_eq!(result.tool_calls[0].arguments, r#"{"city":"Oslo"}"#);
    assert_eq!(
        result.usage,
        Some(Usage {
            input_tokens: 20,
            output_tokens: 8,
        })
    );
}

#[tokio::test]
async fn json_lines_stream_completes_without_sentinel() {
    // Local engines frame one JSON object per line and never send [DONE]
    let transcript: Vec<&[u8]> = vec![
        b"{\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
        b"{\"choices\":[{\"delta\":{\"content\":\"cal\"}}]}\n{\"choices\":[{\"delta\":{},",
        b"\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":2}}\n",
    ];

    let chunks = collect_ok(pipeline(
        transcript,
        Framing::JsonLines,
        Box::new(OpenAiAdapter::eager()),
        Vec::new(),
    ))
    .await;

    let result = GenerationResult::from_chunks(chunks, Duration::from_secs(1));
    assert_eq!(result.text, "local");
    assert_eq!(result.finish_reason, FinishReason::Stop);
    assert_eq!(
        result.usage,
        Some(Usage {
            input_tokens: 4,
            output_tokens: 2,
        })
    );
}

#[tokio::test]
async fn terminal_chunk_is_unique_and_last() {
    let transcript: Vec<&[u8]> = vec![
        b"data: {\"choices\":[{\"delta\":{\"content\":\"one\"}}]}\n\n",
        b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        b"data: [DONE]\n\n",
    ];

    let chunks = collect_ok(pipeline(
        transcript,
        Framing::Sse,
        Box::new(OpenAiAdapter::new()),
        Vec::new(),
    ))
    .await;

    let finals: Vec<usize> = chunks
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.is_final().then_some(i))
        .collect();
    assert_eq!(finals, vec![chunks.len() - 1]);
}
