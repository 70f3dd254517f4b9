//! Streaming client for LM Studio's OpenAI-compatible chat API.

use std::fmt::Display;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::fragment_stream::{BoxFragmentStream, FragmentSource, TransportError};
use crate::model::message::ChatMessage;
use crate::settings::LlmSettings;

#[derive(Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Clone)]
pub struct LmStudioClient {
    client: Client,
    settings: LlmSettings,
}

impl LmStudioClient {
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.settings.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    pub async fn test_connection(&self) -> Result<String, TransportError> {
        let response = self
            .authorize(self.client.get(self.url("/v1/models")))
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        let resp: serde_json::Value = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::InvalidChunk(e.to_string()))?;

        Ok(format!(
            "Connected ({} models available)",
            resp["data"].as_array().map(|a| a.len()).unwrap_or(0)
        ))
    }
}

#[async_trait]
impl FragmentSource for LmStudioClient {
    async fn open(&self, messages: Vec<ChatMessage>) -> Result<BoxFragmentStream, TransportError> {
        let req = ChatCompletionRequest {
            model: &self.settings.model,
            messages: &messages,
            temperature: self.settings.temperature,
            stream: true,
        };

        debug!(model = %self.settings.model, messages = messages.len(), "Opening completion stream");

        let response = self
            .authorize(self.client.post(self.url("/v1/chat/completions")))
            .json(&req)
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        let response = ensure_success(response).await?;
        Ok(Box::pin(sse_fragments(Box::pin(response.bytes_stream()))))
    }

    async fn check_connection(&self) -> Result<String, TransportError> {
        self.test_connection().await
    }
}

async fn ensure_success(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Decodes a raw SSE body into content fragments. A last line the server
/// sent without a trailing newline is still decoded when the body ends.
pub fn sse_fragments<S, B, E>(body: S) -> impl Stream<Item = Result<String, TransportError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    stream::unfold(Some((body, SseDecoder::default())), |state| async move {
        let (mut body, mut decoder) = state?;
        match body.next().await {
            Some(Ok(bytes)) => {
                let items = decoder.feed(bytes.as_ref());
                Some((items, Some((body, decoder))))
            }
            Some(Err(e)) => {
                let items = vec![Err(TransportError::Interrupted(e.to_string()))];
                Some((items, Some((body, decoder))))
            }
            None => Some((decoder.finish(), None)),
        }
    })
    .flat_map(stream::iter)
}

/// Splits a server-sent-event byte stream into content deltas.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters and JSON payloads split across network chunks survive.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<String, TransportError>> {
        self.buffer.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if self.done {
                continue;
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(item) = self.decode_line(line.trim()) {
                out.push(item);
            }
        }
        out
    }

    /// Decodes whatever is left in the buffer once the body has ended.
    pub fn finish(&mut self) -> Vec<Result<String, TransportError>> {
        let rest = std::mem::take(&mut self.buffer);
        if self.done || rest.is_empty() {
            return Vec::new();
        }
        let line = String::from_utf8_lossy(&rest);
        self.decode_line(line.trim()).into_iter().collect()
    }

    fn decode_line(&mut self, line: &str) -> Option<Result<String, TransportError>> {
        let data = line.strip_prefix("data:")?.trim_start();

        if data == "[DONE]" {
            self.done = true;
            return None;
        }

        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .map(Ok),
            Err(e) => Some(Err(TransportError::InvalidChunk(e.to_string()))),
        }
    }
}
