//! Mock providers for testing and offline demos

use std::collections::{HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use ragkit_core::streaming::MockStreamBuilder;

use crate::{ChatRequest, Embeddings, Error, Provider, Result, StreamingResponse};

/// A mock provider for testing
pub struct MockProvider {
    /// Response to return, or the error message to fail with
    response: std::result::Result<String, String>,
}

impl MockProvider {
    /// Create a new mock provider with predefined response
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: Ok(response.into()),
        }
    }

    /// A provider whose every request fails with [`Error::ProviderApi`]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: Err(message.into()),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream_completion(&self, _request: ChatRequest) -> Result<StreamingResponse> {
        let response = self
            .response
            .as_ref()
            .map_err(|message| Error::ProviderApi(message.clone()))?;

        // Split response into chunks for realistic streaming simulation
        let chunks: Vec<String> = response
            .chars()
            .collect::<Vec<_>>()
            .chunks(10)
            .map(|c| c.iter().collect())
            .collect();

        let mut builder = MockStreamBuilder::new();
        for chunk in chunks {
            builder = builder.message(chunk);
        }
        builder = builder.done();

        Ok(builder.build())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Deterministic embeddings without a model.
///
/// Texts registered with [`with_vector`](Self::with_vector) get that vector.
/// Any other text gets a unit vector derived from a hash of its words, so
/// texts sharing words land close together.
pub struct MockEmbeddings {
    dimensions: usize,
    vectors: HashMap<String, Vec<f32>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
}

impl MockEmbeddings {
    /// Create for vectors of `dimensions` components
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: HashMap::new(),
            failing: HashSet::new(),
            delay: None,
        }
    }

    /// Vector length produced for unregistered texts
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Return `vector` for `text`
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Fail with [`Error::ProviderApi`] when asked to embed `text`
    pub fn fail_on(mut self, text: impl Into<String>) -> Self {
        self.failing.insert(text.into());
        self
    }

    /// Sleep before every answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn hashed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        if self.dimensions == 0 {
            return vector;
        }
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let hash = hasher.finish();
            let slot = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embeddings for MockEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(text) {
            return Err(Error::ProviderApi(format!("mock embedding failure for {:?}", text)));
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.hashed(text)))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
