//! Error type for the long-term memory store.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Embedding encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding has zero magnitude")]
    ZeroMagnitude,

    #[error("Embedding is empty")]
    EmptyEmbedding,

    #[error("Embedding contains a non-finite component")]
    NonFinite,
}

impl MemoryError {
    /// Whether the error comes from a structurally invalid vector rather than
    /// from storage. These are never worth retrying.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            MemoryError::DimensionMismatch { .. }
                | MemoryError::ZeroMagnitude
                | MemoryError::EmptyEmbedding
                | MemoryError::NonFinite
        )
    }
}
