//! Late-interaction retrieval: token-level MaxSim
//!
//! Each query token is matched against every token of a chunk; the best
//! cosine similarity per query token is kept and the maxima are aggregated
//! into one chunk score. Cost grows with query tokens × chunk tokens, which
//! is why only the slower strategies enable this source.

use super::source::{rank_candidates, run_blocking, CandidateSource, SourceError};
use super::types::{CandidateResult, SourceKind};
use crate::embedding::{
    normalize_rows, EmbeddingError, EmbeddingProvider, TokenIndex, TokenIndexError,
};
use crate::text::tokenize;
use async_trait::async_trait;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How per-query-token maxima are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Sum,
    Mean,
}

pub struct LateInteractionSource {
    provider: Arc<dyn EmbeddingProvider>,
    tokens: Arc<dyn TokenIndex>,
    aggregation: Aggregation,
}

impl LateInteractionSource {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        tokens: Arc<dyn TokenIndex>,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            provider,
            tokens,
            aggregation,
        }
    }
}

#[async_trait]
impl CandidateSource for LateInteractionSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LateInteraction
    }

    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<CandidateResult>, SourceError> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let provider = Arc::clone(&self.provider);
        let index = Arc::clone(&self.tokens);
        let aggregation = self.aggregation;

        let scored = run_blocking(move |cancellation| {
            let dimension = index.dimension();
            let query_vectors = provider.embed_batch(&query_tokens)?;
            let query_matrix = normalized_matrix(&query_vectors, dimension)?;

            let mut scored = Vec::new();
            for chunk_id in index.chunk_ids()? {
                cancellation.check()?;
                let doc_matrix = match index.tokens(&chunk_id) {
                    Ok(matrix) => matrix,
                    Err(TokenIndexError::NotFound(_)) => continue,
                    Err(e) => return Err(e.into()),
                };
                if doc_matrix.nrows() == 0 {
                    continue;
                }
                if doc_matrix.ncols() != dimension {
                    return Err(SourceError::Embedding(EmbeddingError::DimensionMismatch {
                        expected: dimension,
                        actual: doc_matrix.ncols(),
                    }));
                }
                let score = max_sim(query_matrix.view(), doc_matrix.view(), aggregation);
                scored.push((chunk_id, score));
            }
            Ok(scored)
        })
        .await?;

        Ok(rank_candidates(scored, limit))
    }
}

/// Stack vectors into rows and L2-normalize each row
fn normalized_matrix(vectors: &[Vec<f32>], dimension: usize) -> Result<Array2<f32>, SourceError> {
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(SourceError::Embedding(EmbeddingError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        }));
    }

    let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
    let mut matrix = Array2::from_shape_vec((vectors.len(), dimension), flat)
        .map_err(|e| SourceError::Task(e.to_string()))?;
    normalize_rows(&mut matrix);
    Ok(matrix)
}

/// MaxSim between normalized query rows and document rows
pub fn max_sim(query: ArrayView2<f32>, doc: ArrayView2<f32>, aggregation: Aggregation) -> f32 {
    if query.nrows() == 0 || doc.nrows() == 0 {
        return 0.0;
    }

    let similarities = query.dot(&doc.t());
    let total: f32 = similarities
        .axis_iter(Axis(0))
        .map(|row| row.iter().copied().fold(f32::NEG_INFINITY, f32::max))
        .sum();

    match aggregation {
        Aggregation::Sum => total,
        Aggregation::Mean => total / query.nrows() as f32,
    }
}
