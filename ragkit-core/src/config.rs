//! Runtime configuration
//!
//! Defaults target a local Ollama runtime. Values can come from a YAML file
//! or from environment variables.
//!
//! # Example
//!
//! ```rust
//! use ragkit_core::config::RagConfig;
//!
//! let config = RagConfig::from_yaml_str("language_model: mistral:7b").unwrap();
//! assert_eq!(config.language_model, "mistral:7b");
//! assert_eq!(config.embedding_model, "nomic-embed-text");
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const LOCAL_HOSTNAME: &str = "localhost";
const DOCKER_HOSTNAME: &str = "host.docker.internal";
const OLLAMA_PORT: u16 = 11434;

/// Default generation model
pub const DEFAULT_LANGUAGE_MODEL: &str = "llama3.2:3b";
/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Configuration shared by providers and the search pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Root URL of the Ollama runtime (without `/v1`)
    pub ollama_url: String,
    /// Model used for answer generation
    pub language_model: String,
    /// Model used for embeddings
    pub embedding_model: String,
    /// Timeout for a single embedding request
    pub embed_timeout_secs: u64,
    /// Timeout for generating a whole answer
    pub generation_timeout_secs: u64,
    /// Concurrent embedding requests during ingest
    pub max_concurrent_embeddings: usize,
    /// Default log level
    pub log_level: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        let in_container = std::env::var("RUNNING_IN_CONTAINER").is_ok_and(|v| v == "true");
        Self {
            ollama_url: default_ollama_url(in_container),
            language_model: DEFAULT_LANGUAGE_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embed_timeout_secs: 30,
            generation_timeout_secs: 120,
            max_concurrent_embeddings: 8,
            log_level: "info".to_string(),
        }
    }
}

fn default_ollama_url(in_container: bool) -> String {
    let host = if in_container {
        DOCKER_HOSTNAME
    } else {
        LOCAL_HOSTNAME
    };
    format!("http://{}:{}", host, OLLAMA_PORT)
}

impl RagConfig {
    /// Defaults overridden by environment variables
    ///
    /// Reads `OLLAMA_BASE_URL`, `RAGKIT_LANGUAGE_MODEL`, `RAGKIT_EMBEDDING_MODEL`,
    /// `RAGKIT_EMBED_TIMEOUT_SECS`, `RAGKIT_GENERATION_TIMEOUT_SECS`,
    /// `RAGKIT_MAX_CONCURRENT_EMBEDDINGS` and `RAGKIT_LOG_LEVEL`.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    /// Parse YAML; missing fields keep their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Apply overrides from a variable lookup
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.ollama_url = url;
        }
        if let Some(model) = lookup("RAGKIT_LANGUAGE_MODEL") {
            self.language_model = model;
        }
        if let Some(model) = lookup("RAGKIT_EMBEDDING_MODEL") {
            self.embedding_model = model;
        }
        if let Some(v) = lookup("RAGKIT_EMBED_TIMEOUT_SECS") {
            self.embed_timeout_secs = parse_var("RAGKIT_EMBED_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("RAGKIT_GENERATION_TIMEOUT_SECS") {
            self.generation_timeout_secs = parse_var("RAGKIT_GENERATION_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("RAGKIT_MAX_CONCURRENT_EMBEDDINGS") {
            self.max_concurrent_embeddings = parse_var("RAGKIT_MAX_CONCURRENT_EMBEDDINGS", &v)?;
        }
        if let Some(level) = lookup("RAGKIT_LOG_LEVEL") {
            self.log_level = level;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.ollama_url.trim().is_empty() {
            return Err(Error::Config("ollama_url must not be empty".to_string()));
        }
        if self.embed_timeout_secs == 0 || self.generation_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    /// OpenAI-compatible endpoint of the runtime
    pub fn openai_compatible_url(&self) -> String {
        format!("{}/v1", self.ollama_url.trim_end_matches('/'))
    }

    /// Settings for [`SearchPipeline`](crate::pipeline::SearchPipeline)
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            embed_timeout: Duration::from_secs(self.embed_timeout_secs),
            generation_timeout: Duration::from_secs(self.generation_timeout_secs),
            max_concurrent_embeddings: self.max_concurrent_embeddings.max(1),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value: {:?}", name, value)))
}

/// Pipeline timeouts and worker-pool size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Timeout for one embedding request
    pub embed_timeout: Duration,
    /// Timeout for the whole answer generation
    pub generation_timeout: Duration,
    /// Semaphore permits for concurrent embeddings
    pub max_concurrent_embeddings: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        RagConfig::default().pipeline_config()
    }
}
