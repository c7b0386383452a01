use super::{ChatCompletion, ChatRequest, ClientError, StackClient};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;

/// Stream of content deltas from a streaming chat completion
pub type DeltaStream = BoxStream<'static, Result<String, ClientError>>;

/// One server-sent event relevant to chat streaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence, so
/// lines are only decoded once their terminating newline has been seen.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = Self::parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a trailing line that was not newline-terminated
    pub fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        Self::parse_line(&line)
    }

    fn parse_line(line: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        let payload = line.strip_prefix("data:")?.trim_start();
        if payload.is_empty() {
            return None;
        }
        if payload == "[DONE]" {
            return Some(SseEvent::Done);
        }
        Some(SseEvent::Data(payload.to_string()))
    }
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

/// Extract the content delta from one `data:` payload
fn parse_delta(payload: &str) -> Result<Option<String>, ClientError> {
    let chunk: CompletionChunk = serde_json::from_str(payload)
        .map_err(|e| ClientError::Stream(format!("{}: {}", e, payload)))?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    url: String,
    finished: bool,
}

impl StreamState {
    /// Queue the deltas carried by decoded events. Returns an error for the
    /// first malformed payload.
    fn absorb(&mut self, events: Vec<SseEvent>) -> Result<(), ClientError> {
        for event in events {
            match event {
                SseEvent::Done => {
                    self.finished = true;
                    break;
                },
                SseEvent::Data(payload) => {
                    if let Some(delta) = parse_delta(&payload)? {
                        self.pending.push_back(delta);
                    }
                },
            }
        }
        Ok(())
    }
}

impl StackClient {
    /// Non-streaming chat completion
    pub async fn chat_completion(
        &self,
        request: &ChatRequest,
    ) -> Result<ChatCompletion, ClientError> {
        let mut request = request.clone();
        request.stream = false;
        self.post_json("chat/completions", &request).await
    }

    /// Streaming chat completion yielding content deltas in arrival order
    pub async fn chat_completion_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<DeltaStream, ClientError> {
        let mut request = request.clone();
        request.stream = true;
        let response = self.post_raw("chat/completions", &request).await?;
        let url = response.url().to_string();

        let state = StreamState {
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
                .boxed(),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            url,
            finished: false,
        };

        let deltas = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(delta) = state.pending.pop_front() {
                    return Some((Ok(delta), state));
                }
                if state.finished {
                    return None;
                }
                match state.body.next().await {
                    Some(Ok(bytes)) => {
                        let events = state.decoder.push(&bytes);
                        if let Err(e) = state.absorb(events) {
                            state.finished = true;
                            return Some((Err(e), state));
                        }
                    },
                    Some(Err(e)) => {
                        state.finished = true;
                        let err = ClientError::from_reqwest(&state.url, e);
                        return Some((Err(err), state));
                    },
                    None => {
                        let tail = state.decoder.finish().into_iter().collect();
                        let absorbed = state.absorb(tail);
                        state.finished = true;
                        if let Err(e) = absorbed {
                            return Some((Err(e), state));
                        }
                    },
                }
            }
        });

        Ok(deltas.boxed())
    }
}
