//! Memory Retrieval: weighted recency / relevance / importance ranking.
//!
//! [`rank`] is the pure part: given a partition snapshot, a query embedding
//! and options, it returns the top records with their score breakdowns.
//! Access-time refresh is the stream's job, not this module's.

pub mod scoring;

use chrono::{DateTime, Utc};

use crate::config::{RetrievalConfig, RetrievalWeights};
use crate::memory::{MemoryKind, MemoryRecord};
use crate::types::{Embedding, RetrievalScore};

/// Options for one retrieval query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    /// Maximum records returned.
    pub limit: usize,
    /// Factor weights.
    pub weights: RetrievalWeights,
    /// Restrict to these kinds; `None` means all kinds.
    pub filter_kinds: Option<Vec<MemoryKind>>,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            weights: RetrievalWeights::default(),
            filter_kinds: None,
        }
    }
}

impl RetrievalOptions {
    /// Defaults taken from configuration.
    #[must_use]
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            limit: config.default_limit,
            weights: config.weights,
            filter_kinds: None,
        }
    }

    /// Rank by recency only.
    #[must_use]
    pub fn recency_only(limit: usize) -> Self {
        Self::weighted(limit, 1.0, 0.0, 0.0)
    }

    /// Rank by relevance only.
    #[must_use]
    pub fn relevance_only(limit: usize) -> Self {
        Self::weighted(limit, 0.0, 1.0, 0.0)
    }

    /// Rank by importance only.
    #[must_use]
    pub fn importance_only(limit: usize) -> Self {
        Self::weighted(limit, 0.0, 0.0, 1.0)
    }

    /// Explicit weights.
    #[must_use]
    pub fn weighted(limit: usize, recency: f64, relevance: f64, importance: f64) -> Self {
        Self {
            limit,
            weights: RetrievalWeights { recency, relevance, importance },
            filter_kinds: None,
        }
    }

    /// Restrict to the given kinds.
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = MemoryKind>) -> Self {
        self.filter_kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Change the limit.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn admits(&self, kind: MemoryKind) -> bool {
        self.filter_kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }
}

/// A scored retrieval result.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    /// The retrieved memory.
    pub memory: MemoryRecord,
    /// Combined score.
    pub score: f64,
    /// Per-factor breakdown.
    pub breakdown: ScoreBreakdown,
}

/// Breakdown of a retrieval score into its weighted factors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    /// Weighted recency.
    pub recency: f64,
    /// Weighted relevance.
    pub relevance: f64,
    /// Weighted importance.
    pub importance: f64,
}

impl ScoreBreakdown {
    /// Sum of the weighted factors.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.recency + self.relevance + self.importance
    }
}

/// Score `memories` (in insertion order) and return the top `options.limit`
/// by descending score. Equal scores keep insertion order.
#[must_use]
pub fn rank(
    memories: &[MemoryRecord],
    query: Option<&Embedding>,
    now: DateTime<Utc>,
    options: &RetrievalOptions,
) -> Vec<ScoredMemory> {
    let mut results: Vec<ScoredMemory> = memories
        .iter()
        .filter(|m| options.admits(m.kind))
        .map(|memory| {
            let breakdown = scoring::compute_breakdown(memory, query, now, &options.weights);
            ScoredMemory {
                memory: memory.clone(),
                score: breakdown.total(),
                breakdown,
            }
        })
        .collect();

    // `sort_by` is stable, which is what keeps ties in insertion order.
    results.sort_by(|a, b| RetrievalScore::new(b.score).cmp(&RetrievalScore::new(a.score)));
    results.truncate(options.limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Importance;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 13, hour, 0, 0).unwrap()
    }

    fn record(content: &str, kind: MemoryKind, importance: i64, created: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord::new(content, kind, Importance::new(importance), created)
    }

    #[test]
    fn importance_only_ranks_by_importance() {
        let memories = vec![
            record("X", MemoryKind::Observation, 3, at(8)),
            record("Y", MemoryKind::Observation, 9, at(9)),
        ];
        let out = rank(&memories, None, at(10), &RetrievalOptions::importance_only(10));
        assert_eq!(out[0].memory.content, "Y");
        assert_eq!(out[1].memory.content, "X");
    }

    #[test]
    fn ties_keep_insertion_order() {
        let memories: Vec<_> = (0..5)
            .map(|i| record(&format!("m{i}"), MemoryKind::Observation, 5, at(8)))
            .collect();
        let out = rank(&memories, None, at(9), &RetrievalOptions::default());
        let order: Vec<_> = out.iter().map(|s| s.memory.content.as_str()).collect();
        assert_eq!(order, ["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn limit_and_kind_filter_apply() {
        let mut memories = Vec::new();
        for i in 0..10 {
            let kind = if i % 2 == 0 { MemoryKind::Observation } else { MemoryKind::Reflection };
            memories.push(record(&format!("m{i}"), kind, 5, at(8)));
        }
        let opts = RetrievalOptions::default().with_limit(3).with_kinds([MemoryKind::Reflection]);
        let out = rank(&memories, None, at(9), &opts);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|s| s.memory.kind == MemoryKind::Reflection));
    }

    #[test]
    fn recency_prefers_recently_accessed() {
        let old = record("old", MemoryKind::Observation, 5, at(1));
        let mut fresh = record("fresh", MemoryKind::Observation, 5, at(1));
        fresh.last_accessed = at(1) + Duration::hours(5);
        let out = rank(&[old, fresh], None, at(12), &RetrievalOptions::recency_only(2));
        assert_eq!(out[0].memory.content, "fresh");
    }
}
