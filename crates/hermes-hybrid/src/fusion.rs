//! Reciprocal Rank Fusion: score = Σ wᵢ / (c + rankᵢ)
//!
//! Dense distances and BM25 scores live on unrelated scales, so only the
//! 1-indexed rank of a chunk in each list contributes. A chunk found by one
//! path only still gets that path's contribution.

use std::cmp::Ordering;
use std::collections::HashMap;

use hermes_core::config::RetrievalSettings;
use hermes_core::types::{Candidate, FusedResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionSettings {
    /// Damping constant. Larger values flatten the gap between top ranks.
    pub c: f64,
    pub dense_weight: f64,
    pub lexical_weight: f64,
}

impl Default for FusionSettings {
    fn default() -> Self { Self { c: 60.0, dense_weight: 1.0, lexical_weight: 1.0 } }
}

impl From<&RetrievalSettings> for FusionSettings {
    fn from(r: &RetrievalSettings) -> Self {
        Self { c: r.rrf_k, dense_weight: r.dense_weight, lexical_weight: r.lexical_weight }
    }
}

/// Fuses a dense list (ascending distance) and a lexical list (descending
/// relevance) into at most `k` results, best first.
///
/// Equal fused scores are ordered by lower dense distance, then dense
/// position, then lexical position, then chunk id. A chunk repeated within
/// one list counts once, at its best rank.
pub fn fuse(dense: &[Candidate], lexical: &[Candidate], k: usize, settings: &FusionSettings) -> Vec<FusedResult> {
    let mut by_id: HashMap<&str, FusedResult> = HashMap::new();

    for (i, c) in dense.iter().enumerate() {
        let rank = i + 1;
        let entry = by_id.entry(c.chunk_id.as_str()).or_insert_with(|| empty(&c.chunk_id));
        if entry.dense_rank.is_some() { continue; }
        entry.dense_rank = Some(rank);
        entry.dense_distance = Some(c.score);
        entry.fused_score += settings.dense_weight / (settings.c + rank as f64);
    }
    for (i, c) in lexical.iter().enumerate() {
        let rank = i + 1;
        let entry = by_id.entry(c.chunk_id.as_str()).or_insert_with(|| empty(&c.chunk_id));
        if entry.lexical_rank.is_some() { continue; }
        entry.lexical_rank = Some(rank);
        entry.fused_score += settings.lexical_weight / (settings.c + rank as f64);
    }

    let mut fused: Vec<FusedResult> = by_id.into_values().collect();
    fused.sort_by(compare);
    fused.truncate(k);
    fused
}

fn empty(chunk_id: &str) -> FusedResult {
    FusedResult { chunk_id: chunk_id.to_string(), fused_score: 0.0, dense_rank: None, lexical_rank: None, dense_distance: None }
}

// Option<T> sorts None first; absent provenance must sort last.
fn present_first<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare(a: &FusedResult, b: &FusedResult) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| present_first(a.dense_distance, b.dense_distance))
        .then_with(|| present_first(a.dense_rank, b.dense_rank))
        .then_with(|| present_first(a.lexical_rank, b.lexical_rank))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}
