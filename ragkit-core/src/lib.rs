//! # ragkit Core - Retrieval-Augmented Generation toolkit
//!
//! Core types, traits, and abstractions for the ragkit framework.
//!
//! This crate provides:
//! - Record store (`store`) - In-memory vector collections with cosine search
//! - Pipeline (`pipeline`) - Embedding-backed ingest and query
//! - Provider traits (`provider`, `rag`) - Text generation and embeddings
//! - Message types (`message`) - Conversation messages and chat history
//! - Streaming (`streaming`) - Stream response handling
//! - Prompt templates (`prompt`) - Grounding answers on search hits
//! - Corpus loading (`corpus`) - Markdown directories as ingest items
//! - Configuration (`config`) and logging (`logging`)
//!
//! ## Quick Start
//!
//! ```rust
//! use ragkit_core::store::{CollectionSchema, Record, RecordStore};
//!
//! # fn main() -> ragkit_core::error::Result<()> {
//! let store = RecordStore::new();
//! store.create_collection("terms", CollectionSchema::new(3))?;
//! store.upsert("terms", Record::new(1u64, vec![1.0, 0.0, 0.0]))?;
//! store.upsert("terms", Record::new(2u64, vec![0.0, 1.0, 0.0]))?;
//!
//! let hits = store.search("terms", &[1.0, 0.0, 0.0], 1)?;
//! assert_eq!(hits[0].record.key.as_str(), "1");
//! assert_eq!(hits[0].score, 1.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod logging;
pub mod message;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod rag;
pub mod store;
pub mod streaming;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::config::{PipelineConfig, RagConfig};
    pub use crate::error::{Error, IngestError, Result};
    pub use crate::message::{ChatHistory, Message, Role};
    pub use crate::pipeline::{AnswerOutcome, IngestItem, QueryOutcome, SearchPipeline};
    pub use crate::prompt::PromptTemplate;
    pub use crate::provider::{ChatRequest, Provider};
    pub use crate::rag::Embeddings;
    pub use crate::store::{
        CollectionSchema, FieldKind, FieldValue, Filter, Record, RecordKey, RecordStore,
        SearchHit, SearchOptions,
    };
    pub use crate::streaming::{StreamingChoice, StreamingResponse};
}
