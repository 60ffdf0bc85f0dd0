//! Provider construction and pipeline wiring (no running model needed)
//!
//! Run with: cargo test --package ragkit-providers --all-features

use std::sync::Arc;

use ragkit_core::config::PipelineConfig;
use ragkit_core::pipeline::{AnswerOutcome, IngestItem, SearchPipeline};
use ragkit_core::store::{CollectionSchema, RecordKey, RecordStore};

use crate::mock::{MockEmbeddings, MockProvider};
use crate::Provider;

#[test]
#[cfg(feature = "openai")]
fn test_openai_creation() {
    use crate::openai::OpenAI;
    use crate::Embeddings;
    let provider = OpenAI::new("test-key");
    assert!(provider.is_ok());
    let provider = provider.unwrap();
    assert_eq!(Provider::name(&provider), "openai");
    assert_eq!(Embeddings::name(&provider), "openai");
}

#[test]
#[cfg(feature = "ollama")]
fn test_ollama_creation() {
    use crate::ollama::Ollama;
    let provider = Ollama::new("http://localhost:11434");
    assert!(provider.is_ok());
    let provider = provider.unwrap();
    assert_eq!(Provider::name(&provider), "ollama");
}

#[test]
#[cfg(all(feature = "openai", feature = "ollama"))]
fn test_providers_unique_names() {
    use crate::ollama::Ollama;
    use crate::openai::OpenAI;

    let openai = OpenAI::new("test").unwrap();
    let ollama = Ollama::new("http://localhost:11434").unwrap();
    let mock = MockProvider::new("");

    assert_ne!(Provider::name(&openai), Provider::name(&ollama));
    assert_ne!(Provider::name(&openai), mock.name());
    assert_ne!(Provider::name(&ollama), mock.name());
}

#[tokio::test]
async fn test_pipeline_with_mock_providers() {
    let store = Arc::new(RecordStore::new());
    store
        .create_collection("glossary", CollectionSchema::new(32))
        .unwrap();

    let pipeline = SearchPipeline::new(
        store,
        Arc::new(MockEmbeddings::new(32)),
        PipelineConfig::default(),
    )
    .with_generator(
        Arc::new(MockProvider::new("An API is an application programming interface.")),
        "llama3.2:3b",
    );

    pipeline
        .ingest(
            "glossary",
            vec![
                IngestItem::new("API application programming interface").with_key(1u64),
                IngestItem::new("Connection string database credentials").with_key(2u64),
            ],
        )
        .await
        .unwrap();

    let outcome = pipeline
        .query("glossary", "application programming interface", 1)
        .await
        .unwrap();
    assert_eq!(outcome.top().unwrap().record.key, RecordKey::from(1u64));
    assert_eq!(
        outcome.answer.text(),
        Some("An API is an application programming interface.")
    );
}

#[tokio::test]
async fn test_pipeline_reports_failed_generation() {
    let store = Arc::new(RecordStore::new());
    store
        .create_collection("glossary", CollectionSchema::new(8))
        .unwrap();
    let pipeline = SearchPipeline::new(
        store,
        Arc::new(MockEmbeddings::new(8)),
        PipelineConfig::default(),
    )
    .with_generator(Arc::new(MockProvider::failing("model not loaded")), "m");

    pipeline
        .ingest("glossary", vec![IngestItem::new("term").with_key(1u64)])
        .await
        .unwrap();

    let outcome = pipeline.query("glossary", "term", 1).await.unwrap();
    assert_eq!(outcome.hits.len(), 1);
    assert!(matches!(outcome.answer, AnswerOutcome::Failed(_)));
}
