//! SSE streaming support for OpenAI-compatible chat completions.

use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use serde::Deserialize;

use super::{ModelError, ModelResult, RawToolCall, StreamItem};
use crate::types::Usage;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<ChunkUsage>,
    #[serde(default)]
    pub error: Option<ChunkError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ChunkUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkError {
    #[serde(default)]
    pub message: String,
}

pin_project! {
    /// Splits an SSE byte stream into parsed chat completion chunks.
    pub struct SseParser<S> {
        #[pin]
        inner: S,
        buffer: Vec<u8>,
        pos: usize,
        done: bool,
    }
}

impl<S> SseParser<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>>,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(4096),
            pos: 0,
            done: false,
        }
    }

    /// Whether the `[DONE]` terminator has been received.
    pub fn saw_done(&self) -> bool {
        self.done
    }

    fn is_done_marker(event_block: &str) -> bool {
        event_block
            .lines()
            .filter_map(|line| line.trim().strip_prefix("data:"))
            .any(|data| data.trim() == "[DONE]")
    }

    #[inline]
    fn find_delimiter(buf: &[u8]) -> Option<usize> {
        buf.windows(2).position(|w| w == b"\n\n")
    }

    fn extract_json_data(event_block: &str) -> Option<&str> {
        for line in event_block.lines() {
            let line = line.trim();
            if let Some(json_str) = line.strip_prefix("data:") {
                let json_str = json_str.trim();
                if json_str == "[DONE]" {
                    return None;
                }
                if !json_str.is_empty() {
                    return Some(json_str);
                }
            }
        }
        None
    }

    fn parse_event(event_block: &str) -> Option<ModelResult<ChatChunk>> {
        let trimmed = event_block.trim();
        if trimmed.is_empty() || trimmed.starts_with(':') {
            return None;
        }
        let json_str = Self::extract_json_data(event_block)?;
        Some(serde_json::from_str::<ChatChunk>(json_str).map_err(|e| {
            tracing::warn!(error = %e, data = %json_str, "Failed to parse stream chunk");
            ModelError::Stream(format!("Malformed chunk: {}", e))
        }))
    }
}

impl<S> Stream for SseParser<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>>,
{
    type Item = ModelResult<ChatChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            let search_slice = &this.buffer[*this.pos..];
            if let Some(rel_pos) = Self::find_delimiter(search_slice) {
                let start_pos = *this.pos;
                let end_pos = start_pos + rel_pos;
                let event_block = match std::str::from_utf8(&this.buffer[start_pos..end_pos]) {
                    Ok(s) => s,
                    Err(e) => {
                        return Poll::Ready(Some(Err(ModelError::Stream(format!(
                            "Invalid UTF-8 in event: {}",
                            e
                        )))));
                    }
                };

                if Self::is_done_marker(event_block) {
                    *this.done = true;
                }
                let event = Self::parse_event(event_block);
                *this.pos = end_pos + 2;

                if this.buffer.len() > 8192 && *this.pos > this.buffer.len() / 2 {
                    this.buffer.drain(..*this.pos);
                    *this.pos = 0;
                }

                if let Some(event) = event {
                    return Poll::Ready(Some(event));
                }
                continue;
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    if *this.pos > 0 && this.buffer.len() + bytes.len() > 16384 {
                        this.buffer.drain(..*this.pos);
                        *this.pos = 0;
                    }
                    this.buffer.extend_from_slice(&bytes);
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ModelError::Http(e))));
                }
                Poll::Ready(None) => {
                    if *this.pos < this.buffer.len() {
                        let remaining = match std::str::from_utf8(&this.buffer[*this.pos..]) {
                            Ok(s) => s,
                            Err(_) => return Poll::Ready(None),
                        };
                        if Self::is_done_marker(remaining) {
                            *this.done = true;
                        }
                        let event = Self::parse_event(remaining);
                        *this.pos = this.buffer.len();
                        if let Some(event) = event {
                            return Poll::Ready(Some(event));
                        }
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

pin_project! {
    /// Turns chat completion chunks into text deltas and complete tool calls.
    ///
    /// Tool call fragments arrive keyed by index; they are emitted in index order once
    /// the underlying stream ends. A body that ends without `[DONE]` or a
    /// `finish_reason` was cut off, and yields an error instead of the partial calls.
    pub struct ToolCallAssembler<S> {
        #[pin]
        inner: SseParser<S>,
        pending: VecDeque<StreamItem>,
        calls: BTreeMap<usize, PartialCall>,
        completed: bool,
        finished: bool,
    }
}

impl<S> ToolCallAssembler<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>>,
{
    pub fn new(inner: S) -> Self {
        Self {
            inner: SseParser::new(inner),
            pending: VecDeque::new(),
            calls: BTreeMap::new(),
            completed: false,
            finished: false,
        }
    }
}

/// Folds one chunk into the pending items. Returns whether it carried a `finish_reason`.
fn absorb_chunk(
    chunk: ChatChunk,
    pending: &mut VecDeque<StreamItem>,
    calls: &mut BTreeMap<usize, PartialCall>,
) -> ModelResult<bool> {
    if let Some(error) = chunk.error {
        return Err(ModelError::Stream(error.message));
    }

    let mut finished = false;
    for choice in chunk.choices.into_iter().filter(|c| c.index == 0) {
        finished |= choice.finish_reason.is_some();
        if let Some(text) = choice.delta.content
            && !text.is_empty()
        {
            pending.push_back(StreamItem::Text(text));
        }
        for delta in choice.delta.tool_calls.unwrap_or_default() {
            let call = calls.entry(delta.index).or_default();
            if let Some(id) = delta.id {
                call.id.push_str(&id);
            }
            if let Some(function) = delta.function {
                if let Some(name) = function.name {
                    call.name.push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    call.arguments.push_str(&arguments);
                }
            }
        }
    }

    if let Some(usage) = chunk.usage {
        pending.push_back(StreamItem::Usage(Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }
    Ok(finished)
}

impl<S> Stream for ToolCallAssembler<S>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>>,
{
    type Item = ModelResult<StreamItem>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(item) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }
            if *this.finished {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    match absorb_chunk(chunk, &mut *this.pending, &mut *this.calls) {
                        Ok(finish) => *this.completed |= finish,
                        Err(e) => {
                            *this.finished = true;
                            return Poll::Ready(Some(Err(e)));
                        }
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    *this.finished = true;
                    if !*this.completed && !this.inner.as_ref().saw_done() {
                        this.calls.clear();
                        return Poll::Ready(Some(Err(ModelError::Stream(
                            "stream ended before completion".to_string(),
                        ))));
                    }
                    for (_, call) in std::mem::take(&mut *this.calls) {
                        this.pending.push_back(StreamItem::ToolCall(RawToolCall {
                            id: call.id,
                            name: call.name,
                            arguments: call.arguments,
                        }));
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, stream};

    type EmptyStream = futures::stream::Empty<std::result::Result<Bytes, reqwest::Error>>;

    fn byte_stream(
        parts: Vec<&'static str>,
    ) -> impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> {
        stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))))
    }

    #[test]
    fn test_parse_content_delta() {
        let data = r#"data: {"choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let chunk = SseParser::<EmptyStream>::parse_event(data).unwrap().unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_skip_done_marker() {
        assert!(SseParser::<EmptyStream>::parse_event("data: [DONE]").is_none());
    }

    #[test]
    fn test_skip_empty_block_and_comment() {
        assert!(SseParser::<EmptyStream>::parse_event("").is_none());
        assert!(SseParser::<EmptyStream>::parse_event("   \n  ").is_none());
        assert!(SseParser::<EmptyStream>::parse_event(": keep-alive").is_none());
    }

    #[test]
    fn test_malformed_chunk_is_error() {
        let result = SseParser::<EmptyStream>::parse_event("data: {not json").unwrap();
        assert!(matches!(result, Err(ModelError::Stream(_))));
    }

    #[test]
    fn test_extract_json_data() {
        let json = SseParser::<EmptyStream>::extract_json_data("event: x\ndata: {\"a\":1}");
        assert_eq!(json, Some("{\"a\":1}"));
        let json = SseParser::<EmptyStream>::extract_json_data("data:{\"a\":1}");
        assert_eq!(json, Some("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_text_split_across_byte_chunks() {
        let parts = vec![
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Bon\"}}]}\n",
            "\ndata: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"jour\"}}]}\n\n",
            "data: [DONE]\n\n",
        ];
        let items: Vec<_> = ToolCallAssembler::new(byte_stream(parts))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(
            items,
            vec![
                StreamItem::Text("Bon".into()),
                StreamItem::Text("jour".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_tool_call_fragments_assembled_in_index_order() {
        let parts = vec![
            concat!(
                "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[",
                "{\"index\":1,\"id\":\"call_b\",\"function\":{\"name\":\"summarize\",\"arguments\":\"\"}}",
                "]}}]}\n\n"
            ),
            concat!(
                "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[",
                "{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"translate\",\"arguments\":\"{\\\"text\\\":\"}}",
                "]}}]}\n\n"
            ),
            concat!(
                "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[",
                "{\"index\":0,\"function\":{\"arguments\":\"\\\"hello\\\"}\"}},",
                "{\"index\":1,\"function\":{\"arguments\":\"{}\"}}",
                "]},\"finish_reason\":\"tool_calls\"}]}\n\n"
            ),
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":7}}\n\n",
            "data: [DONE]\n\n",
        ];
        let items: Vec<_> = ToolCallAssembler::new(byte_stream(parts))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(
            items,
            vec![
                StreamItem::Usage(Usage {
                    input_tokens: 12,
                    output_tokens: 7
                }),
                StreamItem::ToolCall(RawToolCall {
                    id: "call_a".into(),
                    name: "translate".into(),
                    arguments: "{\"text\":\"hello\"}".into(),
                }),
                StreamItem::ToolCall(RawToolCall {
                    id: "call_b".into(),
                    name: "summarize".into(),
                    arguments: "{}".into(),
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_error_chunk_ends_stream() {
        let parts = vec![
            "data: {\"error\":{\"message\":\"server overloaded\"}}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"late\"}}]}\n\n",
        ];
        let mut stream = Box::pin(ToolCallAssembler::new(byte_stream(parts)));
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(ModelError::Stream(m)) if m == "server overloaded"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_truncated_body_is_error() {
        let parts = vec![concat!(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[",
            "{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"translate\",\"arguments\":\"{\\\"text\\\":\"}}",
            "]}}]}\n\n"
        )];
        let items: Vec<_> = ToolCallAssembler::new(byte_stream(parts)).collect().await;

        assert_eq!(items.len(), 1);
        assert!(
            matches!(&items[0], Err(ModelError::Stream(m)) if m == "stream ended before completion")
        );
    }

    #[tokio::test]
    async fn test_finish_reason_without_done_marker_completes() {
        let parts = vec![
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"},\"finish_reason\":\"stop\"}]}\n\n",
        ];
        let items: Vec<_> = ToolCallAssembler::new(byte_stream(parts))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![StreamItem::Text("Hi".into())]);
    }

    #[tokio::test]
    async fn test_done_marker_without_finish_reason_completes() {
        let parts = vec![
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: [DONE]",
        ];
        let items: Vec<_> = ToolCallAssembler::new(byte_stream(parts))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![StreamItem::Text("Hi".into())]);
    }
}
