//! Cosine-similarity recall and prompt formatting for long-term memories.

use crate::error::MemoryError;
use crate::types::{MemoryRecord, RankedMemory};

/// Rendered in place of the memory block when nothing was recalled.
pub const NO_MEMORIES: &str = "No relevant memories found";

const MEMORY_HEADER: &str = "Past memories and thoughts:";

/// Euclidean norm of a vector, rejecting vectors that cannot take part in a
/// cosine similarity.
fn checked_norm(v: &[f32]) -> Result<f64, MemoryError> {
    if v.is_empty() {
        return Err(MemoryError::EmptyEmbedding);
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(MemoryError::NonFinite);
    }
    let norm = v
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 {
        return Err(MemoryError::ZeroMagnitude);
    }
    Ok(norm)
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum()
}

/// Check that a vector is usable as an embedding: non-empty, finite, non-zero.
pub fn validate_embedding(v: &[f32]) -> Result<(), MemoryError> {
    checked_norm(v).map(|_| ())
}

/// Cosine similarity between two embeddings.
///
/// A zero-magnitude vector means the embedding call upstream failed, so it is
/// rejected instead of producing a score.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, MemoryError> {
    if a.len() != b.len() {
        return Err(MemoryError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let norm_a = checked_norm(a)?;
    let norm_b = checked_norm(b)?;
    Ok((dot(a, b) / (norm_a * norm_b)) as f32)
}

/// Rank stored memories by cosine similarity to `query`, highest first, and
/// keep the top `k`.
///
/// Full O(n) scan. Exact ties keep the order in which `records` were given.
/// An empty record set yields an empty result, but the query itself is still
/// validated.
pub fn rank_memories(
    query: &[f32],
    records: &[MemoryRecord],
    k: usize,
) -> Result<Vec<RankedMemory>, MemoryError> {
    let query_norm = checked_norm(query)?;

    let mut scored = Vec::with_capacity(records.len());
    for record in records {
        if record.embedding.len() != query.len() {
            return Err(MemoryError::DimensionMismatch {
                expected: query.len(),
                actual: record.embedding.len(),
            });
        }
        let record_norm = checked_norm(&record.embedding)?;
        let similarity = (dot(query, &record.embedding) / (query_norm * record_norm)) as f32;
        scored.push(RankedMemory {
            content: record.content.clone(),
            significance: record.significance,
            similarity,
        });
    }

    // `sort_by` is stable, which gives the tie-break on equal similarity.
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);

    log::debug!(
        "ranked {} stored memories, kept {}",
        records.len(),
        scored.len()
    );
    Ok(scored)
}

/// Format recalled memories for prompt consumption.
///
/// Memories are listed most significant first. An empty recall, or one whose
/// entries are all blank, renders as [`NO_MEMORIES`].
pub fn format_memories(memories: &[RankedMemory]) -> String {
    let mut by_significance: Vec<&RankedMemory> = memories
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .collect();

    if by_significance.is_empty() {
        return NO_MEMORIES.to_string();
    }

    by_significance.sort_by(|a, b| {
        b.significance
            .partial_cmp(&a.significance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut lines = Vec::with_capacity(by_significance.len() + 1);
    lines.push(MEMORY_HEADER.to_string());
    for memory in by_significance {
        lines.push(format!("- {}", memory.content.trim()));
    }
    lines.join("\n")
}
