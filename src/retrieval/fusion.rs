//! Weighted Reciprocal Rank Fusion over any number of ranked lists

use super::types::{FusedResult, RankedList, SourceKind};
use crate::corpus::ChunkId;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Default RRF constant
pub const DEFAULT_RRF_K: f32 = 60.0;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid fusion constant {0}: must be finite and positive")]
    InvalidK(f32),

    #[error("Invalid weight {weight} for {kind} source: must be finite and positive")]
    InvalidWeight { kind: SourceKind, weight: f32 },
}

/// Configuration for fusion algorithm
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// RRF K constant (typically 60)
    pub rrf_k: f32,

    /// Per-source weights; a source without an entry weighs 1.0
    pub weights: BTreeMap<SourceKind, f32>,
}

impl FusionConfig {
    pub fn new(rrf_k: f32, weights: BTreeMap<SourceKind, f32>) -> Result<Self, FusionError> {
        if !rrf_k.is_finite() || rrf_k <= 0.0 {
            return Err(FusionError::InvalidK(rrf_k));
        }
        if let Some((&kind, &weight)) = weights.iter().find(|(_, w)| !w.is_finite() || **w <= 0.0) {
            return Err(FusionError::InvalidWeight { kind, weight });
        }

        Ok(Self { rrf_k, weights })
    }

    pub fn weight(&self, source: SourceKind) -> f32 {
        self.weights.get(&source).copied().unwrap_or(1.0)
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
            weights: BTreeMap::new(),
        }
    }
}

/// Apply Reciprocal Rank Fusion to N ranked lists
///
/// score(id) = Σ_r weight_r / (k + rank_r(id)), summed in source order so the
/// result is bit-identical however the input lists are permuted. Ties break on
/// the lowest rank across contributing sources, then on chunk id.
pub fn reciprocal_rank_fusion(lists: &[RankedList], config: &FusionConfig) -> Vec<FusedResult> {
    let mut merged: HashMap<ChunkId, FusedResult> = HashMap::new();

    for list in lists {
        for candidate in &list.results {
            let entry = merged
                .entry(candidate.chunk_id.clone())
                .or_insert_with(|| FusedResult {
                    chunk_id: candidate.chunk_id.clone(),
                    score: 0.0,
                    source_ranks: BTreeMap::new(),
                    source_scores: BTreeMap::new(),
                });

            // The same source listed twice keeps its best rank
            let better = entry
                .source_ranks
                .get(&list.source)
                .map_or(true, |&existing| candidate.rank < existing);
            if better {
                entry.source_ranks.insert(list.source, candidate.rank);
                entry.source_scores.insert(list.source, candidate.score);
            }
        }
    }

    let mut fused: Vec<FusedResult> = merged
        .into_values()
        .map(|mut result| {
            let score: f32 = result
                .source_ranks
                .iter()
                .map(|(&source, &rank)| config.weight(source) / (config.rrf_k + rank as f32))
                .sum();
            result.score = if score.is_finite() { score } else { 0.0 };
            result
        })
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.min_rank().cmp(&b.min_rank()))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    fused
}
