//! Core types for long-term memory.

use serde::{Deserialize, Serialize};

/// Lowest significance a memory can carry.
pub const MIN_SIGNIFICANCE: f64 = 1.0;
/// Highest significance a memory can carry.
pub const MAX_SIGNIFICANCE: f64 = 10.0;

/// A persisted long-term memory. Never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Row id assigned by the store.
    pub id: i64,
    /// The remembered text (a generated post).
    pub content: String,
    /// Embedding of `content`; its length equals the store dimension.
    pub embedding: Vec<f32>,
    /// Significance in [1, 10].
    pub significance: f64,
    /// Unix timestamp of creation.
    pub created_at: i64,
}

/// A recalled memory with the similarity that selected it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedMemory {
    pub content: String,
    pub significance: f64,
    /// Cosine similarity to the query embedding, in [-1, 1].
    pub similarity: f32,
}

/// Clamp a significance score into [1, 10]. NaN maps to the minimum.
pub fn clamp_significance(score: f64) -> f64 {
    if score.is_nan() {
        return MIN_SIGNIFICANCE;
    }
    score.clamp(MIN_SIGNIFICANCE, MAX_SIGNIFICANCE)
}
