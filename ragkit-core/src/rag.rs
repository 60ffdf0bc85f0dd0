//! RAG (Retrieval-Augmented Generation) interfaces
//!
//! The embedding step is an external collaborator: the pipeline only needs
//! text in, fixed-length vector out.

use async_trait::async_trait;

use crate::error::Result;

/// Interface for embeddings providers
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Generate embedding vector for text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get provider name (for logging/debugging)
    fn name(&self) -> &'static str {
        "embeddings"
    }
}
