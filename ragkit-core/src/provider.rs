//! Provider trait for LLM integrations

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Message;
use crate::streaming::StreamingResponse;

/// Request for a chat completion
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// Model name to use
    pub model: String,
    /// Optional system prompt, sent before `messages`
    pub system_prompt: Option<String>,
    /// Conversation history
    pub messages: Vec<Message>,
    /// Optional temperature setting
    pub temperature: Option<f64>,
    /// Optional max tokens
    pub max_tokens: Option<u64>,
    /// Structured output format, e.g. a `json_schema` response format
    pub response_format: Option<serde_json::Value>,
    /// Optional provider-specific parameters
    pub extra_params: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Create a request for `model` with the given messages
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the token limit
    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Request structured output in the given format
    pub fn with_response_format(mut self, format: serde_json::Value) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Request JSON output conforming to `schema`
    ///
    /// Builds an OpenAI-style `json_schema` response format named `name`.
    pub fn with_json_schema(self, name: impl Into<String>, schema: serde_json::Value) -> Self {
        self.with_response_format(serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": name.into(),
                "strict": true,
                "schema": schema,
            }
        }))
    }
}

/// Trait for LLM text-generation providers
///
/// Implement this trait to add support for a new LLM provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stream a completion request
    async fn stream_completion(&self, request: ChatRequest) -> Result<StreamingResponse>;

    /// Get provider name (for logging/debugging)
    fn name(&self) -> &'static str;

    /// Run a completion and collect the full text
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.stream_completion(request).await?.collect_text().await
    }
}
