//! OpenAI provider implementation
//!
//! Also compatible with OpenAI-compatible APIs, including the `/v1` endpoint
//! of a local Ollama runtime.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::utils::{status_error, StreamBuffer};
use crate::{
    ChatRequest, Embeddings, Error, HttpConfig, Message, Provider, Result, StreamingChoice,
    StreamingResponse,
};

/// Default embedding model for the hosted API
pub const TEXT_EMBEDDING_3_SMALL: &str = "text-embedding-3-small";

/// OpenAI API client
pub struct OpenAI {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
}

impl OpenAI {
    /// Create from API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, "https://api.openai.com/v1")
    }

    /// Create from environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::ProviderAuth("OPENAI_API_KEY not set".to_string()))?;
        Self::new(api_key)
    }

    /// Create with custom base URL (for compatible APIs)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, base_url, &HttpConfig::default())
    }

    /// Create with custom base URL and HTTP settings
    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        config: &HttpConfig,
    ) -> Result<Self> {
        let base_url: String = base_url.into();
        Ok(Self {
            client: config.build_client()?,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            embedding_model: TEXT_EMBEDDING_3_SMALL.to_string(),
        })
    }

    /// Use `model` for [`Embeddings::embed`]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Model used for embeddings
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !self.api_key.is_empty() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                    .map_err(|e| Error::Internal(e.to_string()))?,
            );
        }
        Ok(headers)
    }

    fn convert_messages(system_prompt: Option<&str>, messages: Vec<Message>) -> Vec<WireMessage> {
        let mut result = Vec::with_capacity(messages.len() + 1);

        if let Some(prompt) = system_prompt {
            result.push(WireMessage {
                role: "system",
                content: prompt.to_string(),
                name: None,
            });
        }

        result.extend(messages.into_iter().map(|msg| WireMessage {
            role: msg.role.as_str(),
            content: msg.content,
            name: msg.name,
        }));

        result
    }
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    stream: bool,
}

impl CompletionRequest {
    /// Streaming body for a chat request
    ///
    /// An explicit response format wins over `extra_params["response_format"]`.
    fn from_chat(request: ChatRequest) -> Self {
        let response_format = request.response_format.or_else(|| {
            request
                .extra_params
                .as_ref()
                .and_then(|params| params.get("response_format"))
                .cloned()
        });

        Self {
            model: request.model,
            messages: OpenAI::convert_messages(request.system_prompt.as_deref(), request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format,
            stream: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// Streaming chunk
#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[async_trait]
impl Provider for OpenAI {
    async fn stream_completion(&self, request: ChatRequest) -> Result<StreamingResponse> {
        let body = CompletionRequest::from_chat(request);
        debug!(model = %body.model, messages = body.messages.len(), "Sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error("openai", status, &text));
        }

        Ok(StreamingResponse::from_stream(parse_sse_stream(
            response.bytes_stream(),
        )))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

struct SseState<S> {
    stream: S,
    buffer: StreamBuffer,
    pending: VecDeque<Result<StreamingChoice>>,
    finished: bool,
}

/// Parse a Server-Sent Events body into streaming choices.
///
/// Yields `Done` on the `[DONE]` sentinel, or when the body ends without it.
fn parse_sse_stream<S, E>(stream: S) -> impl Stream<Item = Result<StreamingChoice>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: Into<Error>,
{
    let state = SseState {
        stream,
        buffer: StreamBuffer::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    let messages = state
                        .buffer
                        .extend_from_slice(&bytes)
                        .and_then(|_| state.buffer.extract_sse_messages());
                    match messages {
                        Ok(messages) => {
                            for message in messages {
                                if let Some(choice) = parse_sse_message(&message) {
                                    let done = choice.is_done();
                                    state.pending.push_back(Ok(choice));
                                    if done {
                                        state.finished = true;
                                        break;
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            state.finished = true;
                            state.pending.push_back(Err(e));
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state.pending.push_back(Err(e.into()));
                }
                None => {
                    state.finished = true;
                    if let Ok(Some(rest)) = state.buffer.take_remainder() {
                        if let Some(choice) = parse_sse_message(&rest) {
                            let done = choice.is_done();
                            state.pending.push_back(Ok(choice));
                            if done {
                                continue;
                            }
                        }
                    }
                    state.pending.push_back(Ok(StreamingChoice::Done));
                }
            }
        }
    })
}

/// Interpret one SSE message; `None` for comments, keep-alives and empty deltas
fn parse_sse_message(message: &str) -> Option<StreamingChoice> {
    let data: String = message
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect::<Vec<_>>()
        .join("\n");

    if data.is_empty() {
        return None;
    }
    if data.trim() == "[DONE]" {
        return Some(StreamingChoice::Done);
    }

    match serde_json::from_str::<StreamChunk>(&data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(StreamingChoice::Message),
        Err(e) => {
            warn!("Failed to parse SSE chunk: {}", e);
            None
        }
    }
}

// --- Embeddings Implementation ---

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embeddings for OpenAI {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            input: text,
            model: &self.embedding_model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .headers(self.build_headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error("openai embeddings", status, &text));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            Error::ProviderApi(format!("Failed to parse embedding response: {}", e))
        })?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::ProviderApi("No embedding returned".to_string()))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
