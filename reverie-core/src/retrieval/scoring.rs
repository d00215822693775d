//! Per-factor scoring functions for memory retrieval.
//!
//! Score = w₁·Recency(m) + w₂·Relevance(m) + w₃·Importance(m)
//!
//! Where:
//!   Recency(m)    = 0.995 ^ hours since last access
//!   Relevance(m)  = cosine_similarity(query_embedding, memory_embedding)
//!   Importance(m) = importance / 10

use chrono::{DateTime, Utc};

use crate::config::RetrievalWeights;
use crate::memory::MemoryRecord;
use crate::retrieval::ScoreBreakdown;
use crate::types::Embedding;

/// Recency multiplier per elapsed hour (about 0.5 % decay per hour).
pub const RECENCY_DECAY_PER_HOUR: f64 = 0.995;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Compute the full score breakdown for a single memory.
///
/// `query` is `None` when no query embedding exists; relevance is then 0.
#[must_use]
pub fn compute_breakdown(
    memory: &MemoryRecord,
    query: Option<&Embedding>,
    now: DateTime<Utc>,
    weights: &RetrievalWeights,
) -> ScoreBreakdown {
    let recency = weights.recency * recency(hours_between(memory.last_accessed, now));
    let relevance = weights.relevance * query.map_or(0.0, |q| relevance(memory, q));
    let importance = weights.importance * memory.importance.normalized();

    ScoreBreakdown {
        recency,
        relevance,
        importance,
    }
}

/// Recency for `hours` elapsed since last access. Negative input (clock
/// skew) counts as zero.
#[must_use]
pub fn recency(hours: f64) -> f64 {
    RECENCY_DECAY_PER_HOUR.powf(hours.max(0.0))
}

/// Fractional hours from `from` to `to`.
#[must_use]
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MS_PER_HOUR
}

/// Relevance: cosine similarity; 0 for records without an embedding.
#[must_use]
pub fn relevance(memory: &MemoryRecord, query: &Embedding) -> f64 {
    memory
        .embedding
        .as_ref()
        .map_or(0.0, |emb| f64::from(query.cosine_similarity(emb)))
}
