//! Error types for swallow-index.

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while building, loading or querying the index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading input or index files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The metadata file is not a JSON array of records.
    #[error("invalid metadata input: {0}")]
    InvalidInput(#[source] serde_json::Error),

    /// A record lacks a field the document template needs.
    #[error("record {index}: missing required field `{field}`")]
    MissingField { field: &'static str, index: usize },

    /// Invalid chunking parameters.
    #[error("invalid chunking configuration: {0}")]
    Config(String),

    /// Embedding provider failure.
    #[error("embedding failed: {0}")]
    Embedding(#[from] swallow_llm::LlmError),

    /// Embedding call exceeded its time budget.
    #[error("embedding timed out after {}s", .0.as_secs_f32())]
    EmbeddingTimeout(Duration),

    /// Vector length differs from the index dimension.
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    Dimension { expected: usize, got: usize },

    /// No persisted index at the given location.
    #[error("index not found at {}", .0.display())]
    IndexNotFound(PathBuf),

    /// Something other than a saved index already occupies the target path.
    #[error("refusing to replace {}: it exists and is not a saved index", .0.display())]
    NotAnIndex(PathBuf),

    /// Persisted index data cannot be turned back into vector/chunk pairs.
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    /// Persisted index was embedded with a different model.
    #[error("index was built with embedding model `{built}` but `{current}` is configured")]
    ModelMismatch { built: String, current: String },

    /// Search or build on zero vectors.
    #[error("index is empty")]
    EmptyIndex,
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
