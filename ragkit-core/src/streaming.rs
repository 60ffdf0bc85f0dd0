//! Streaming response types
//!
//! A generation result arrives as a lazy, finite, non-restartable sequence
//! of text chunks. It can be consumed chunk by chunk or collected into the
//! full response, and cancelled early without an error.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// A chunk from a streaming response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamingChoice {
    /// Text content chunk
    Message(String),

    /// Stream finished
    Done,
}

impl StreamingChoice {
    /// Check if this is a message chunk
    pub fn is_message(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    /// Check if stream is done
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Get message text if this is a message chunk
    pub fn as_message(&self) -> Option<&str> {
        match self {
            Self::Message(s) => Some(s),
            _ => None,
        }
    }
}

/// Type alias for streaming result
pub type StreamingResult = Pin<Box<dyn Stream<Item = Result<StreamingChoice, Error>> + Send>>;

/// A wrapper for streaming responses with utility methods
pub struct StreamingResponse {
    inner: StreamingResult,
}

impl StreamingResponse {
    /// Create from a stream
    pub fn new(stream: StreamingResult) -> Self {
        Self { inner: stream }
    }

    /// Create from any stream that implements the right traits
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamingChoice, Error>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// End the stream as soon as `token` is cancelled.
    ///
    /// Cancellation ends iteration cleanly; chunks already yielded stay valid.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        let cancelled = async move { token.cancelled().await };
        Self::from_stream(self.inner.take_until(cancelled))
    }

    /// Collect all message chunks into a single string
    pub async fn collect_text(mut self) -> Result<String, Error> {
        let mut result = String::new();
        while let Some(chunk) = self.inner.next().await {
            match chunk? {
                StreamingChoice::Message(text) => result.push_str(&text),
                StreamingChoice::Done => break,
            }
        }
        Ok(result)
    }

    /// Get the inner stream
    pub fn into_inner(self) -> StreamingResult {
        self.inner
    }
}

impl Stream for StreamingResponse {
    type Item = Result<StreamingChoice, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Builder for creating mock streams (useful for testing)
pub struct MockStreamBuilder {
    chunks: Vec<Result<StreamingChoice, Error>>,
}

impl Default for MockStreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStreamBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self { chunks: Vec::new() }
    }

    /// Add a message chunk
    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.chunks.push(Ok(StreamingChoice::Message(text.into())));
        self
    }

    /// Add done marker
    pub fn done(mut self) -> Self {
        self.chunks.push(Ok(StreamingChoice::Done));
        self
    }

    /// Add an error
    pub fn error(mut self, error: Error) -> Self {
        self.chunks.push(Err(error));
        self
    }

    /// Build the stream
    pub fn build(self) -> StreamingResponse {
        StreamingResponse::from_stream(futures::stream::iter(self.chunks))
    }
}
