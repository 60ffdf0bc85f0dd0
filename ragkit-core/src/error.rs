//! Error types for the ragkit framework

use std::fmt;

use thiserror::Error;

use crate::store::RecordKey;

/// Result type alias using ragkit's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ragkit framework
#[derive(Debug, Error)]
pub enum Error {
    // ============ Record Store Errors ============
    /// Collection was never created
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Vector length does not match the collection's dimensionality
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the collection
        expected: usize,
        /// Length of the offending vector
        actual: usize,
    },

    /// Vector contains NaN or infinite components
    #[error("Invalid vector: component {index} is not finite")]
    InvalidVector {
        /// Position of the first non-finite component
        index: usize,
    },

    /// Payload or filter does not match the declared collection schema
    #[error("Schema violation in collection {collection}: {message}")]
    SchemaViolation {
        /// Collection name
        collection: String,
        /// What was wrong
        message: String,
    },

    // ============ Provider Errors ============
    /// Provider API error (network or model failure)
    #[error("Provider API error: {0}")]
    ProviderApi(String),

    /// Provider authentication failed
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider did not answer within the caller's timeout
    #[error("Provider timeout: {operation} exceeded {timeout_ms}ms")]
    ProviderTimeout {
        /// Operation that timed out (e.g. "embed", "generate")
        operation: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    // ============ Pipeline Errors ============
    /// One or more items of an ingest batch failed
    #[error(transparent)]
    Ingest(#[from] IngestError),

    // ============ Streaming Errors ============
    /// Stream interrupted
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    // ============ Configuration Errors ============
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML configuration could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    // ============ Serialization Errors ============
    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ============ Network Errors ============
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // ============ System Errors ============
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============ Generic Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a new schema violation error
    pub fn schema_violation(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Create a new provider timeout error
    pub fn provider_timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::ProviderTimeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout { .. } | Self::StreamInterrupted(_) | Self::Http(_)
        )
    }
}

/// A single failed item of an ingest batch
#[derive(Debug)]
pub struct ItemFailure {
    /// Position of the item in the submitted batch
    pub index: usize,
    /// Key the record would have been stored under
    pub key: RecordKey,
    /// Underlying cause
    pub error: Error,
}

/// Aggregated failure of an ingest batch.
///
/// Ingestion is at-least-once and non-atomic: records of items that succeeded
/// stay in the store, their keys are listed in `stored`.
#[derive(Debug)]
pub struct IngestError {
    /// Name of the target collection
    pub collection: String,
    /// Items that failed, ordered by batch position
    pub failures: Vec<ItemFailure>,
    /// Keys of the records that were stored
    pub stored: Vec<RecordKey>,
}

impl IngestError {
    /// Keys of the failed items
    pub fn failed_keys(&self) -> Vec<&RecordKey> {
        self.failures.iter().map(|f| &f.key).collect()
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ingest into {} failed for {} item(s) ({} stored)",
            self.collection,
            self.failures.len(),
            self.stored.len()
        )?;
        for failure in &self.failures {
            write!(
                f,
                "; item {} (key {}): {}",
                failure.index, failure.key, failure.error
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for IngestError {}
