//! Semantic search over a small glossary
//!
//! Run with: cargo run --example semantic_search --features ollama
//!
//! Prerequisites:
//! 1. Install Ollama: https://ollama.ai
//! 2. Pull the embedding model: cargo run --example pull_models --features ollama

use std::sync::Arc;

use ragkit_core::logging::init_stdout_logging;
use ragkit_core::prelude::*;
use ragkit_providers::ollama::Ollama;

const COLLECTION: &str = "skglossary";

fn glossary() -> Vec<IngestItem> {
    [
        (
            1u64,
            "External Definitions",
            "API",
            "Application Programming Interface. A set of rules and specifications that allow software components to communicate and exchange data.",
        ),
        (
            2,
            "Core Definitions",
            "Connectors",
            "Connectors allow you to integrate with various services provide AI capabilities, including LLM, AudioToText, TextToAudio, Embedding generation, etc.",
        ),
        (
            3,
            "External Definitions",
            "RAG",
            "Retrieval Augmented Generation - a term that refers to the process of retrieving additional data to provide as context to an LLM to use when generating a response (completion) to a user's question (prompt).",
        ),
    ]
    .into_iter()
    .map(|(key, category, term, definition)| {
        IngestItem::new(definition)
            .with_key(key)
            .with_field("category", category)
            .with_field("term", term)
            .with_field("definition", definition)
    })
    .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = RagConfig::from_env()?;
    init_stdout_logging(&config.log_level)?;

    let embedder = Arc::new(Ollama::from_config(&config)?);
    let dimensions = embedder.embed("probe").await?.len();

    let store = Arc::new(RecordStore::new());
    store.create_collection(
        COLLECTION,
        CollectionSchema::new(dimensions)
            .key_field("Key")
            .vector_field("DefinitionEmbedding")
            .filterable_field("category", FieldKind::Text)
            .field("term", FieldKind::Text)
            .field("definition", FieldKind::Text),
    )?;

    let pipeline = SearchPipeline::new(store, embedder, config.pipeline_config());
    pipeline.ingest(COLLECTION, glossary()).await?;

    let question = "What is an api?";
    let hits = pipeline.search(COLLECTION, question, 1).await?;

    println!("Query: {}", question);
    match hits.first() {
        Some(hit) => {
            println!("  Term: {}", hit.record.text("term").unwrap_or_default());
            println!(
                "  Definition: {}",
                hit.record.text("definition").unwrap_or_default()
            );
            println!("  Score: {:.4}", hit.score);
        }
        None => println!("  No match"),
    }

    Ok(())
}
