//! Retrieval pipeline
//!
//! Connects text to the [`RecordStore`] through an embedding step:
//!
//! 1. **Ingest**: text -> embedding -> upsert, once per corpus
//! 2. **Query**: text -> embedding -> top-k search -> optional generated answer
//!
//! Embedding requests run concurrently, bounded by a semaphore, and each one
//! is subject to a timeout. Ingestion is at-least-once and non-atomic: when
//! some items fail, the records of the others stay in the store and the
//! failures are reported together in an [`IngestError`].

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, IngestError, ItemFailure, Result};
use crate::prompt::PromptTemplate;
use crate::provider::{ChatRequest, Provider};
use crate::rag::Embeddings;
use crate::store::{FieldValue, Payload, Record, RecordKey, RecordStore, SearchHit, SearchOptions};
use crate::streaming::StreamingResponse;

/// A piece of text to embed and store
#[derive(Debug, Clone, PartialEq)]
pub struct IngestItem {
    /// Record key; generated when absent
    pub key: Option<RecordKey>,
    /// Text to embed
    pub text: String,
    /// Payload stored with the vector
    pub payload: Payload,
}

impl IngestItem {
    /// Create an item with a generated key and empty payload
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            key: None,
            text: text.into(),
            payload: Payload::new(),
        }
    }

    /// Use a caller-supplied key
    pub fn with_key(mut self, key: impl Into<RecordKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add a payload field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }
}

/// Result of a successful ingest
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    /// Target collection
    pub collection: String,
    /// Stored keys, in item order
    pub keys: Vec<RecordKey>,
}

/// Outcome of the generation step of a query
#[derive(Debug)]
pub enum AnswerOutcome {
    /// No generator configured, or nothing was found to ground an answer on
    Skipped,
    /// The generated answer
    Generated(String),
    /// Generation failed; the search hits are still valid
    Failed(Error),
}

impl AnswerOutcome {
    /// Generated text, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Generated(text) => Some(text),
            _ => None,
        }
    }

    /// Generation error, if any
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Ranked hits plus the generation outcome
#[derive(Debug)]
pub struct QueryOutcome {
    /// Hits ordered by descending similarity
    pub hits: Vec<SearchHit>,
    /// Generated answer grounded on the top hit
    pub answer: AnswerOutcome,
}

impl QueryOutcome {
    /// Best hit, if any
    pub fn top(&self) -> Option<&SearchHit> {
        self.hits.first()
    }
}

/// Ranked hits plus the answer as a stream of chunks
pub struct StreamedQuery {
    /// Hits ordered by descending similarity
    pub hits: Vec<SearchHit>,
    /// `None` when generation was skipped; `Some(Err)` when it could not start
    pub answer: Option<Result<StreamingResponse>>,
}

struct Generator {
    provider: Arc<dyn Provider>,
    model: String,
}

/// Embedding-backed ingest and query over a [`RecordStore`]
pub struct SearchPipeline {
    store: Arc<RecordStore>,
    embedder: Arc<dyn Embeddings>,
    generator: Option<Generator>,
    template: PromptTemplate,
    config: PipelineConfig,
    permits: Arc<Semaphore>,
}

impl SearchPipeline {
    /// Create a pipeline without answer generation
    pub fn new(
        store: Arc<RecordStore>,
        embedder: Arc<dyn Embeddings>,
        config: PipelineConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_embeddings.max(1)));
        Self {
            store,
            embedder,
            generator: None,
            template: PromptTemplate::default(),
            config,
            permits,
        }
    }

    /// Generate answers with `provider` using `model`
    pub fn with_generator(mut self, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        self.generator = Some(Generator {
            provider,
            model: model.into(),
        });
        self
    }

    /// Replace the prompt template
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Pipeline settings
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Embed and store every item.
    ///
    /// Fails upfront with [`Error::UnknownCollection`]. Otherwise every item
    /// is attempted; if any fails, returns [`Error::Ingest`] listing the
    /// failed items while the successful records remain stored.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn ingest(&self, collection: &str, items: Vec<IngestItem>) -> Result<IngestReport> {
        self.ensure_collection(collection)?;

        let tasks = items.into_iter().enumerate().map(|(index, item)| {
            let key = item.key.clone().unwrap_or_else(RecordKey::generate);
            async move {
                let outcome = self.ingest_one(collection, key.clone(), item).await;
                (index, key, outcome)
            }
        });
        let results = join_all(tasks).await;

        let mut stored = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (index, key, outcome) in results {
            match outcome {
                Ok(()) => stored.push(key),
                Err(error) => {
                    warn!(index, key = %key, error = %error, "Ingest item failed");
                    failures.push(ItemFailure { index, key, error });
                }
            }
        }

        if failures.is_empty() {
            info!(stored = stored.len(), "Ingest complete");
            Ok(IngestReport {
                collection: collection.to_string(),
                keys: stored,
            })
        } else {
            warn!(
                stored = stored.len(),
                failed = failures.len(),
                "Ingest finished with failures"
            );
            Err(IngestError {
                collection: collection.to_string(),
                failures,
                stored,
            }
            .into())
        }
    }

    async fn ingest_one(&self, collection: &str, key: RecordKey, item: IngestItem) -> Result<()> {
        let vector = self.embed(&item.text).await?;
        debug!(key = %key, dimensions = vector.len(), "Embedded item");
        self.store.upsert(
            collection,
            Record {
                key,
                vector,
                payload: item.payload,
            },
        )
    }

    /// Embed `text` and return the `top_k` most similar records
    pub async fn search(&self, collection: &str, text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        self.search_with(collection, text, &SearchOptions::top(top_k))
            .await
    }

    /// Embed `text` and search with explicit options
    pub async fn search_with(
        &self,
        collection: &str,
        text: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        self.ensure_collection(collection)?;
        let vector = self.embed(text).await?;
        self.store.search_with(collection, &vector, options)
    }

    /// Search, then generate an answer grounded on the top hit.
    ///
    /// An embedding failure aborts the query. A generation failure does not:
    /// it is reported in [`QueryOutcome::answer`] next to the hits.
    #[instrument(skip(self, text))]
    pub async fn query(&self, collection: &str, text: &str, top_k: usize) -> Result<QueryOutcome> {
        let hits = self.search(collection, text, top_k).await?;

        let answer = match (&self.generator, hits.first()) {
            (Some(generator), Some(top)) => match self.generate(generator, text, top).await {
                Ok(answer) => AnswerOutcome::Generated(answer),
                Err(e) => {
                    warn!(error = %e, "Answer generation failed");
                    AnswerOutcome::Failed(e)
                }
            },
            _ => AnswerOutcome::Skipped,
        };

        Ok(QueryOutcome { hits, answer })
    }

    /// Like [`query`](Self::query), but hands back the answer as a stream.
    ///
    /// Only starting the stream is bounded by the generation timeout.
    #[instrument(skip(self, text))]
    pub async fn query_stream(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
    ) -> Result<StreamedQuery> {
        let hits = self.search(collection, text, top_k).await?;

        let answer = match (&self.generator, hits.first()) {
            (Some(generator), Some(top)) => {
                let request = self.answer_request(generator, text, top);
                let timeout = self.config.generation_timeout;
                let started =
                    tokio::time::timeout(timeout, generator.provider.stream_completion(request))
                        .await
                        .unwrap_or_else(|_| Err(Error::provider_timeout("generate", timeout)));
                Some(started)
            }
            _ => None,
        };

        Ok(StreamedQuery { hits, answer })
    }

    async fn generate(&self, generator: &Generator, query: &str, top: &SearchHit) -> Result<String> {
        let request = self.answer_request(generator, query, top);
        let timeout = self.config.generation_timeout;
        let generation = async {
            generator
                .provider
                .stream_completion(request)
                .await?
                .collect_text()
                .await
        };
        match tokio::time::timeout(timeout, generation).await {
            Ok(result) => result,
            Err(_) => Err(Error::provider_timeout("generate", timeout)),
        }
    }

    fn answer_request(&self, generator: &Generator, query: &str, top: &SearchHit) -> ChatRequest {
        ChatRequest::new(generator.model.clone(), self.template.render(query, top))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("Embedding pool closed: {}", e)))?;

        let timeout = self.config.embed_timeout;
        match tokio::time::timeout(timeout, self.embedder.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(Error::provider_timeout("embed", timeout)),
        }
    }

    fn ensure_collection(&self, collection: &str) -> Result<()> {
        if self.store.collection_exists(collection) {
            Ok(())
        } else {
            Err(Error::UnknownCollection(collection.to_string()))
        }
    }
}
