//! Ollama provider implementation
//!
//! Chat and embeddings go through the runtime's OpenAI-compatible `/v1` API.
//! Model management (`/api/pull`) uses the native API, which streams
//! newline-delimited JSON progress records.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use ragkit_core::config::RagConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::openai::OpenAI;
use crate::utils::{status_error, StreamBuffer};
use crate::{ChatRequest, Embeddings, Error, HttpConfig, Provider, Result, StreamingResponse};

/// Default Ollama root URL
pub const DEFAULT_URL: &str = "http://localhost:11434";

/// Stream of pull progress records
pub type PullStream = Pin<Box<dyn Stream<Item = Result<PullStatus>> + Send>>;

/// One progress record of a model pull
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PullStatus {
    /// Phase description, e.g. "pulling manifest" or "success"
    #[serde(default)]
    pub status: String,
    /// Layer digest being downloaded
    #[serde(default)]
    pub digest: Option<String>,
    /// Bytes downloaded so far
    #[serde(default)]
    pub completed: Option<u64>,
    /// Total bytes of the layer
    #[serde(default)]
    pub total: Option<u64>,
}

impl PullStatus {
    /// Download progress in percent, when sizes are known
    pub fn percent(&self) -> Option<f64> {
        match (self.completed, self.total) {
            (Some(completed), Some(total)) if total > 0 => {
                Some(completed as f64 / total as f64 * 100.0)
            }
            _ => None,
        }
    }

    /// Whether this is the final record of a successful pull
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Deserialize)]
struct PullLine {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    status: PullStatus,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

/// Ollama API client
///
/// Runs models locally. No API key is needed.
pub struct Ollama {
    inner: OpenAI,
    pull_client: reqwest::Client,
    root_url: String,
}

impl Ollama {
    /// Create for an Ollama server root URL (without `/v1`)
    ///
    /// # Example
    /// ```no_run
    /// use ragkit_providers::ollama::Ollama;
    ///
    /// let ollama = Ollama::new("http://localhost:11434").unwrap();
    /// let remote = Ollama::new("http://192.168.1.100:11434").unwrap();
    /// ```
    pub fn new(root_url: impl Into<String>) -> Result<Self> {
        let root_url = root_url.into().trim_end_matches('/').to_string();
        let inner = OpenAI::with_base_url("", format!("{}/v1", root_url))?;
        // Pulls stream for as long as the download takes
        let pull_client = HttpConfig {
            timeout_secs: 6 * 60 * 60,
            ..HttpConfig::default()
        }
        .build_client()?;

        Ok(Self {
            inner,
            pull_client,
            root_url,
        })
    }

    /// Create from `OLLAMA_BASE_URL`, falling back to [`DEFAULT_URL`]
    pub fn from_env() -> Result<Self> {
        let root_url = std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        Self::new(root_url)
    }

    /// Create from runtime configuration, embedding with its embedding model
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Ok(Self::new(&config.ollama_url)?.with_embedding_model(&config.embedding_model))
    }

    /// Use `model` for [`Embeddings::embed`]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.inner = self.inner.with_embedding_model(model);
        self
    }

    /// Root URL of the runtime
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Model used for embeddings
    pub fn embedding_model(&self) -> &str {
        self.inner.embedding_model()
    }

    /// Download `model`, streaming progress records
    pub async fn pull_model(&self, model: &str) -> Result<PullStream> {
        debug!(model, "Pulling model");
        let response = self
            .pull_client
            .post(format!("{}/api/pull", self.root_url))
            .json(&PullRequest {
                model,
                stream: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(status_error("ollama", status, &text));
        }

        Ok(Box::pin(parse_pull_stream(response.bytes_stream())))
    }

    /// Pull every model in turn, logging progress
    pub async fn ensure_models(&self, models: &[&str]) -> Result<()> {
        for model in models {
            info!(model, "Ensuring model is available");
            let mut progress = self.pull_model(model).await?;
            let mut last_status = String::new();
            while let Some(status) = progress.next().await {
                let status = status?;
                match status.percent() {
                    Some(percent) => debug!(model, status = %status.status, percent, "Pull progress"),
                    None if status.status != last_status => {
                        info!(model, status = %status.status, "Pull progress")
                    }
                    None => {}
                }
                last_status = status.status;
            }
            info!(model, "Model ready");
        }
        Ok(())
    }
}

struct PullState<S> {
    stream: S,
    buffer: StreamBuffer,
    pending: VecDeque<Result<PullStatus>>,
    finished: bool,
}

/// Parse an NDJSON pull body; an `error` record ends the stream with an error
fn parse_pull_stream<S, E>(stream: S) -> impl Stream<Item = Result<PullStatus>>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + Unpin + 'static,
    E: Into<Error>,
{
    let state = PullState {
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

            let lines = match state.stream.next().await {
                Some(Ok(bytes)) => state
                    .buffer
                    .extend_from_slice(&bytes)
                    .and_then(|_| state.buffer.extract_lines()),
                Some(Err(e)) => Err(e.into()),
                None => {
                    state.finished = true;
                    state
                        .buffer
                        .take_remainder()
                        .map(|rest| rest.into_iter().collect())
                }
            };

            match lines {
                Ok(lines) => {
                    for line in lines {
                        let item = parse_pull_line(&line);
                        let failed = item.is_err();
                        state.pending.push_back(item);
                        if failed {
                            state.finished = true;
                            break;
                        }
                    }
                }
                Err(e) => {
                    state.finished = true;
                    state.pending.push_back(Err(e));
                }
            }
        }
    })
}

fn parse_pull_line(line: &str) -> Result<PullStatus> {
    let parsed: PullLine = serde_json::from_str(line)?;
    match parsed.error {
        Some(error) => Err(Error::ProviderApi(format!("ollama pull failed: {}", error))),
        None => Ok(parsed.status),
    }
}

#[async_trait]
impl Provider for Ollama {
    async fn stream_completion(&self, request: ChatRequest) -> Result<StreamingResponse> {
        Provider::stream_completion(&self.inner, request).await
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

#[async_trait]
impl Embeddings for Ollama {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed(text).await
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

/// Llama 3.2 3B - Lightweight default
pub const LLAMA_3_2_3B: &str = "llama3.2:3b";
/// Llama 3.1 8B
pub const LLAMA_3_1_8B: &str = "llama3.1:8b";
/// Mistral 7B
pub const MISTRAL_7B: &str = "mistral:7b";
/// Nomic text embeddings (768 dimensions)
pub const NOMIC_EMBED_TEXT: &str = "nomic-embed-text";
/// MixedBread large embeddings (1024 dimensions)
pub const MXBAI_EMBED_LARGE: &str = "mxbai-embed-large";
