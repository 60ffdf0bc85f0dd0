//! Search pipeline: partial ingest failures, timeouts, generation outcomes

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use ragkit_core::pipeline::StreamedQuery;
use ragkit_core::prelude::*;
use ragkit_core::streaming::MockStreamBuilder;

/// Embeddings with scripted vectors, failures and latency
#[derive(Default)]
struct ScriptedEmbeddings {
    vectors: HashMap<String, Vec<f32>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedEmbeddings {
    fn vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    fn fail_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Embeddings for ScriptedEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(text) {
            return Err(Error::ProviderApi(format!("cannot embed {:?}", text)));
        }
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![1.0, 1.0, 1.0]))
    }
}

enum Reply {
    Text(&'static str),
    Fail,
    Hang,
}

/// Provider that records the last request and answers as scripted
struct ScriptedProvider {
    reply: Reply,
    seen: parking_lot::Mutex<Option<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            seen: parking_lot::Mutex::new(None),
        })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn stream_completion(&self, request: ChatRequest) -> Result<StreamingResponse> {
        *self.seen.lock() = Some(request);
        match self.reply {
            Reply::Text(text) => {
                let (head, tail) = text.split_at(text.len() / 2);
                Ok(MockStreamBuilder::new()
                    .message(head)
                    .message(tail)
                    .done()
                    .build())
            }
            Reply::Fail => Err(Error::ProviderApi("model not loaded".to_string())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(MockStreamBuilder::new().done().build())
            }
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        embed_timeout: Duration::from_secs(5),
        generation_timeout: Duration::from_secs(5),
        max_concurrent_embeddings: 4,
    }
}

fn pipeline_with(embedder: ScriptedEmbeddings, config: PipelineConfig) -> SearchPipeline {
    let store = Arc::new(RecordStore::new());
    store
        .create_collection("terms", CollectionSchema::new(3))
        .unwrap();
    SearchPipeline::new(store, Arc::new(embedder), config)
}

fn glossary_embedder() -> ScriptedEmbeddings {
    ScriptedEmbeddings::default()
        .vector("alpha", vec![1.0, 0.0, 0.0])
        .vector("beta", vec![0.0, 1.0, 0.0])
        .vector("gamma", vec![0.0, 0.0, 1.0])
        .vector("about alpha", vec![0.9, 0.1, 0.0])
}

#[tokio::test]
async fn test_partial_ingest_failure_keeps_successes() {
    let pipeline = pipeline_with(glossary_embedder().fail_on("beta"), config());

    let err = pipeline
        .ingest(
            "terms",
            vec![
                IngestItem::new("alpha").with_key(1u64),
                IngestItem::new("beta").with_key(2u64),
                IngestItem::new("gamma").with_key(3u64),
            ],
        )
        .await
        .unwrap_err();

    let ingest = match err {
        Error::Ingest(ingest) => ingest,
        other => panic!("expected ingest error, got {other:?}"),
    };
    assert_eq!(ingest.failed_keys(), vec![&RecordKey::from(2u64)]);
    assert_eq!(ingest.failures[0].index, 1);
    assert!(matches!(ingest.failures[0].error, Error::ProviderApi(_)));
    assert_eq!(ingest.stored, vec![RecordKey::from(1u64), RecordKey::from(3u64)]);

    let store = pipeline.store();
    assert_eq!(store.len("terms").unwrap(), 2);
    assert!(store.get("terms", &RecordKey::from(2u64)).unwrap().is_none());

    let hits = pipeline.search("terms", "gamma", 1).await.unwrap();
    assert_eq!(hits[0].record.key, RecordKey::from(3u64));
}

#[tokio::test]
async fn test_embed_timeout_is_reported() {
    let config = PipelineConfig {
        embed_timeout: Duration::from_millis(20),
        ..config()
    };
    let pipeline = pipeline_with(
        glossary_embedder().delay(Duration::from_millis(500)),
        config,
    );

    let err = pipeline
        .ingest("terms", vec![IngestItem::new("alpha").with_key(1u64)])
        .await
        .unwrap_err();
    let ingest = match err {
        Error::Ingest(ingest) => ingest,
        other => panic!("expected ingest error, got {other:?}"),
    };
    assert!(matches!(
        &ingest.failures[0].error,
        Error::ProviderTimeout { operation, .. } if operation == "embed"
    ));
    assert_eq!(pipeline.store().len("terms").unwrap(), 0);

    // The query embedding is bounded too
    assert!(matches!(
        pipeline.query("terms", "alpha", 1).await,
        Err(Error::ProviderTimeout { .. })
    ));
}

#[tokio::test]
async fn test_ingest_concurrency_is_bounded() {
    let embedder = Arc::new(glossary_embedder().delay(Duration::from_millis(20)));
    let store = Arc::new(RecordStore::new());
    store
        .create_collection("terms", CollectionSchema::new(3))
        .unwrap();
    let config = PipelineConfig {
        max_concurrent_embeddings: 2,
        ..config()
    };
    let pipeline = SearchPipeline::new(store, embedder.clone(), config);

    let items = (0..10u64)
        .map(|i| IngestItem::new(format!("item {i}")).with_key(i))
        .collect();
    let report = pipeline.ingest("terms", items).await.unwrap();

    assert_eq!(report.keys.len(), 10);
    assert!(embedder.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(pipeline.store().len("terms").unwrap(), 10);
}

#[tokio::test]
async fn test_reingest_replaces_records() {
    let pipeline = pipeline_with(glossary_embedder(), config());
    pipeline
        .ingest("terms", vec![IngestItem::new("alpha").with_key("k")])
        .await
        .unwrap();
    pipeline
        .ingest(
            "terms",
            vec![IngestItem::new("beta").with_key("k").with_field("v", 2i64)],
        )
        .await
        .unwrap();

    assert_eq!(pipeline.store().len("terms").unwrap(), 1);
    let hits = pipeline.search("terms", "beta", 1).await.unwrap();
    assert_eq!(hits[0].record.field("v"), Some(&FieldValue::Integer(2)));
}

#[tokio::test]
async fn test_query_generates_answer_from_top_hit() {
    let provider = ScriptedProvider::new(Reply::Text("Alpha is the first letter."));
    let pipeline = pipeline_with(glossary_embedder(), config())
        .with_generator(provider.clone(), "llama3.2:3b")
        .with_template(PromptTemplate::new(
            "Answer using: {{definition}}",
            "{{query}}",
        ));
    pipeline
        .ingest(
            "terms",
            vec![
                IngestItem::new("alpha")
                    .with_key(1u64)
                    .with_field("definition", "the first letter"),
                IngestItem::new("beta")
                    .with_key(2u64)
                    .with_field("definition", "the second letter"),
            ],
        )
        .await
        .unwrap();

    let outcome = pipeline.query("terms", "about alpha", 2).await.unwrap();
    assert_eq!(outcome.hits.len(), 2);
    assert_eq!(outcome.top().unwrap().record.key, RecordKey::from(1u64));
    assert_eq!(outcome.answer.text(), Some("Alpha is the first letter."));

    let request = provider.seen.lock().clone().unwrap();
    assert_eq!(request.model, "llama3.2:3b");
    assert_eq!(request.messages[0].role, Role::System);
    assert_eq!(request.messages[0].content, "Answer using: the first letter");
    assert_eq!(request.messages[1].content, "about alpha");
}

#[tokio::test]
async fn test_generation_failure_keeps_hits() {
    let pipeline = pipeline_with(glossary_embedder(), config())
        .with_generator(ScriptedProvider::new(Reply::Fail), "llama3.2:3b");
    pipeline
        .ingest("terms", vec![IngestItem::new("alpha").with_key(1u64)])
        .await
        .unwrap();

    let outcome = pipeline.query("terms", "alpha", 1).await.unwrap();
    assert_eq!(outcome.hits.len(), 1);
    assert!(matches!(outcome.answer.error(), Some(Error::ProviderApi(_))));
}

#[tokio::test]
async fn test_generation_timeout_keeps_hits() {
    let config = PipelineConfig {
        generation_timeout: Duration::from_millis(50),
        ..config()
    };
    let pipeline = pipeline_with(glossary_embedder(), config)
        .with_generator(ScriptedProvider::new(Reply::Hang), "llama3.2:3b");
    pipeline
        .ingest("terms", vec![IngestItem::new("alpha").with_key(1u64)])
        .await
        .unwrap();

    let outcome = pipeline.query("terms", "alpha", 1).await.unwrap();
    assert_eq!(outcome.hits.len(), 1);
    assert!(matches!(
        outcome.answer.error(),
        Some(Error::ProviderTimeout { operation, .. }) if operation == "generate"
    ));
}

#[tokio::test]
async fn test_query_on_empty_collection_skips_generation() {
    let provider = ScriptedProvider::new(Reply::Text("unused"));
    let pipeline =
        pipeline_with(glossary_embedder(), config()).with_generator(provider.clone(), "m");

    let outcome = pipeline.query("terms", "alpha", 3).await.unwrap();
    assert!(outcome.hits.is_empty());
    assert!(matches!(outcome.answer, AnswerOutcome::Skipped));
    assert!(provider.seen.lock().is_none());
}

#[tokio::test]
async fn test_query_stream_yields_chunks() {
    let pipeline = pipeline_with(glossary_embedder(), config())
        .with_generator(ScriptedProvider::new(Reply::Text("streamed answer")), "m");
    pipeline
        .ingest("terms", vec![IngestItem::new("alpha").with_key(1u64)])
        .await
        .unwrap();

    let StreamedQuery { hits, answer } = pipeline.query_stream("terms", "alpha", 1).await.unwrap();
    assert_eq!(hits.len(), 1);

    let mut stream = answer.unwrap().unwrap();
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk.unwrap() {
            StreamingChoice::Message(text) => chunks.push(text),
            StreamingChoice::Done => break,
        }
    }
    assert_eq!(chunks.concat(), "streamed answer");
    assert!(chunks.len() > 1);
}

#[tokio::test]
async fn test_search_with_filter() {
    let pipeline = pipeline_with(glossary_embedder(), config());
    pipeline
        .ingest(
            "terms",
            vec![
                IngestItem::new("alpha").with_key(1u64).with_field("category", "greek"),
                IngestItem::new("beta").with_key(2u64).with_field("category", "latin"),
            ],
        )
        .await
        .unwrap();

    let options = SearchOptions::top(5).with_filter(Filter::new().eq("category", "latin"));
    let hits = pipeline.search_with("terms", "alpha", &options).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.key, RecordKey::from(2u64));
}
