//! Weighted ensemble over the registered scoring models
//!
//! Every model scores the fused top-M candidates concurrently under its own
//! timeout. Models that are missing, unavailable, fail or time out are dropped
//! for the request and the remaining weights are renormalized to sum to 1.

use super::model::{ModelError, ModelKind};
use super::registry::ModelRegistry;
use crate::corpus::Chunk;
use crate::retrieval::{FusedResult, SourceKind};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// A fused candidate with its chunk text resolved
#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub fused: FusedResult,
    pub chunk: Arc<Chunk>,
}

/// A candidate after ensemble scoring
#[derive(Debug, Clone, Serialize)]
pub struct RerankedResult {
    pub chunk: Arc<Chunk>,

    /// Weighted ensemble score in [0, 1], or the fused score when no model ran
    pub score: f32,

    pub fused_score: f32,

    /// 1-based position in the fused ranking
    pub fused_rank: usize,

    pub source_ranks: BTreeMap<SourceKind, usize>,
    pub source_scores: BTreeMap<SourceKind, f32>,

    /// Normalized score from each model that took part
    pub model_scores: BTreeMap<ModelKind, f32>,

    /// 1-based final position
    pub rank: usize,
}

impl RerankedResult {
    pub fn chunk_id(&self) -> &str {
        &self.chunk.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnsembleOutcome {
    pub results: Vec<RerankedResult>,

    /// Models whose scores were combined, with their effective weights
    pub effective_weights: BTreeMap<ModelKind, f32>,

    /// Configured models excluded for this request
    pub degraded: Vec<ModelKind>,
}

/// Renormalize configured weights over the active models
///
/// Weights of inactive models are dropped and the rest are scaled to sum to 1.
/// Returns an empty map when no active model carries positive weight.
pub fn redistribute_weights(
    configured: &BTreeMap<ModelKind, f32>,
    active: &BTreeSet<ModelKind>,
) -> BTreeMap<ModelKind, f32> {
    let kept: BTreeMap<ModelKind, f32> = configured
        .iter()
        .filter(|(kind, weight)| active.contains(kind) && weight.is_finite() && **weight > 0.0)
        .map(|(&kind, &weight)| (kind, weight))
        .collect();

    let total: f32 = kept.values().sum();
    if total <= 0.0 || !total.is_finite() {
        return BTreeMap::new();
    }

    kept.into_iter().map(|(kind, weight)| (kind, weight / total)).collect()
}

pub struct RerankerEnsemble {
    registry: ModelRegistry,
}

impl RerankerEnsemble {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Score and reorder candidates (given in fused order)
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<RerankCandidate>,
        weights: &BTreeMap<ModelKind, f32>,
        model_timeout: Duration,
    ) -> EnsembleOutcome {
        let mut degraded: BTreeSet<ModelKind> = BTreeSet::new();
        let mut raw_scores: BTreeMap<ModelKind, Vec<f32>> = BTreeMap::new();

        if !candidates.is_empty() {
            let texts: Arc<Vec<String>> =
                Arc::new(candidates.iter().map(|c| c.chunk.text.clone()).collect());
            let expected = texts.len();

            let mut tasks = JoinSet::new();
            let mut attempted: BTreeSet<ModelKind> = BTreeSet::new();

            for (&kind, &weight) in weights {
                if !(weight.is_finite() && weight > 0.0) {
                    continue;
                }
                let model = match self.registry.get(kind) {
                    Some(model) if model.is_available() => Arc::clone(model),
                    _ => {
                        warn!("Reranker {} not loaded, excluding from ensemble", kind);
                        degraded.insert(kind);
                        continue;
                    }
                };

                attempted.insert(kind);
                let query = query.to_string();
                let texts = Arc::clone(&texts);
                tasks.spawn(async move {
                    let started = Instant::now();
                    let result = match tokio::time::timeout(model_timeout, model.score_batch(&query, &texts)).await {
                        Ok(result) => result,
                        Err(_) => Err(ModelError::Timeout {
                            kind,
                            after_ms: model_timeout.as_millis() as u64,
                        }),
                    };
                    (kind, result, started.elapsed())
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((kind, Ok(scores), elapsed)) if scores.len() == expected => {
                        debug!("Reranker {} scored {} candidates in {:?}", kind, expected, elapsed);
                        raw_scores.insert(kind, scores);
                    }
                    Ok((kind, Ok(scores), _)) => {
                        let err = ModelError::LengthMismatch {
                            expected,
                            actual: scores.len(),
                        };
                        warn!("Reranker {} excluded: {}", kind, err);
                    }
                    Ok((kind, Err(e), _)) => {
                        warn!("Reranker {} excluded: {}", kind, e);
                    }
                    Err(e) => {
                        warn!("Reranker task failed: {}", e);
                    }
                }
            }

            // Anything attempted without usable scores is degraded, including panicked tasks
            for kind in attempted {
                if !raw_scores.contains_key(&kind) {
                    degraded.insert(kind);
                }
            }
        }

        let active: BTreeSet<ModelKind> = raw_scores.keys().copied().collect();
        let effective_weights = redistribute_weights(weights, &active);

        let mut results: Vec<RerankedResult> = candidates
            .into_iter()
            .enumerate()
            .map(|(idx, candidate)| {
                let model_scores: BTreeMap<ModelKind, f32> = effective_weights
                    .keys()
                    .map(|&kind| {
                        let raw = raw_scores
                            .get(&kind)
                            .and_then(|scores| scores.get(idx))
                            .copied()
                            .unwrap_or(0.0);
                        let normalized = self
                            .registry
                            .get(kind)
                            .map(|model| model.normalization().apply(raw))
                            .unwrap_or(0.0);
                        (kind, normalized)
                    })
                    .collect();

                let score = if effective_weights.is_empty() {
                    candidate.fused.score
                } else {
                    effective_weights
                        .iter()
                        .map(|(kind, weight)| weight * model_scores.get(kind).copied().unwrap_or(0.0))
                        .sum()
                };

                RerankedResult {
                    chunk: candidate.chunk,
                    score: if score.is_finite() { score } else { 0.0 },
                    fused_score: candidate.fused.score,
                    fused_rank: idx + 1,
                    source_ranks: candidate.fused.source_ranks,
                    source_scores: candidate.fused.source_scores,
                    model_scores,
                    rank: 0,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.fused_rank.cmp(&b.fused_rank))
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        for (idx, result) in results.iter_mut().enumerate() {
            result.rank = idx + 1;
        }

        EnsembleOutcome {
            results,
            effective_weights,
            degraded: degraded.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rerank::{KeywordBooster, Normalization, ScoringModel};
    use async_trait::async_trait;

    /// Scores each text by a lookup table, in [0, 1]
    struct Table {
        kind: ModelKind,
        scores: BTreeMap<String, f32>,
    }

    #[async_trait]
    impl ScoringModel for Table {
        fn kind(&self) -> ModelKind {
            self.kind
        }

        fn normalization(&self) -> Normalization {
            Normalization::Clamp
        }

        async fn score(&self, _query: &str, text: &str) -> Result<f32, ModelError> {
            Ok(self.scores.get(text).copied().unwrap_or(0.0))
        }
    }

    struct Broken(ModelKind);

    #[async_trait]
    impl ScoringModel for Broken {
        fn kind(&self) -> ModelKind {
            self.0
        }

        async fn score(&self, _query: &str, _text: &str) -> Result<f32, ModelError> {
            Err(ModelError::RerankingError("onnx session lost".to_string()))
        }
    }

    fn candidate(id: &str, fused_score: f32) -> RerankCandidate {
        RerankCandidate {
            fused: FusedResult {
                chunk_id: id.to_string(),
                score: fused_score,
                source_ranks: BTreeMap::from([(SourceKind::Dense, 1)]),
                source_scores: BTreeMap::new(),
            },
            chunk: Arc::new(Chunk::new(id, id, "doc")),
        }
    }

    fn table(kind: ModelKind, entries: &[(&str, f32)]) -> Arc<dyn ScoringModel> {
        Arc::new(Table {
            kind,
            scores: entries.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        })
    }

    #[test]
    fn test_redistribute_weights() {
        let configured = BTreeMap::from([
            (ModelKind::Lightweight, 0.4),
            (ModelKind::CrossEncoder, 0.4),
            (ModelKind::KeywordBooster, 0.2),
        ]);
        let active = BTreeSet::from([ModelKind::Lightweight, ModelKind::KeywordBooster]);

        let weights = redistribute_weights(&configured, &active);
        assert_eq!(weights.len(), 2);
        assert!((weights[&ModelKind::Lightweight] - 2.0 / 3.0).abs() < 1e-6);
        assert!((weights[&ModelKind::KeywordBooster] - 1.0 / 3.0).abs() < 1e-6);
        assert!((weights.values().sum::<f32>() - 1.0).abs() < 1e-6);

        assert!(redistribute_weights(&configured, &BTreeSet::new()).is_empty());
    }

    #[tokio::test]
    async fn test_weighted_combination_reorders() {
        let registry = ModelRegistry::new()
            .with_model(table(ModelKind::Lightweight, &[("a", 0.1), ("b", 0.9)]))
            .with_model(table(ModelKind::CrossEncoder, &[("a", 0.2), ("b", 0.8)]));
        let ensemble = RerankerEnsemble::new(registry);
        let weights = BTreeMap::from([(ModelKind::Lightweight, 0.5), (ModelKind::CrossEncoder, 0.5)]);

        let outcome = ensemble
            .rerank(
                "q",
                vec![candidate("a", 0.03), candidate("b", 0.02)],
                &weights,
                Duration::from_secs(1),
            )
            .await;

        assert!(outcome.degraded.is_empty());
        assert_eq!(outcome.results[0].chunk_id(), "b");
        assert_eq!(outcome.results[0].rank, 1);
        assert_eq!(outcome.results[0].fused_rank, 2);
        assert!((outcome.results[0].score - 0.85).abs() < 1e-6);
        assert_eq!(outcome.results[0].model_scores.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_model_is_excluded_and_weight_redistributed() {
        let registry = ModelRegistry::new()
            .with_model(table(ModelKind::Lightweight, &[("a", 0.6), ("b", 0.3)]))
            .with_model(Arc::new(Broken(ModelKind::CrossEncoder)))
            .with_model(Arc::new(KeywordBooster::default()));
        let ensemble = RerankerEnsemble::new(registry);
        let weights = BTreeMap::from([
            (ModelKind::Lightweight, 0.4),
            (ModelKind::CrossEncoder, 0.4),
            (ModelKind::KeywordBooster, 0.2),
        ]);

        let outcome = ensemble
            .rerank(
                "zzz",
                vec![candidate("a", 0.02), candidate("b", 0.01)],
                &weights,
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(outcome.degraded, vec![ModelKind::CrossEncoder]);
        assert_eq!(outcome.results.len(), 2);
        assert!((outcome.effective_weights.values().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(!outcome.effective_weights.contains_key(&ModelKind::CrossEncoder));
        for result in &outcome.results {
            assert!(result.score.is_finite());
            assert!(!result.model_scores.contains_key(&ModelKind::CrossEncoder));
        }
        // lightweight carries 2/3 of the weight, booster contributes 0
        assert!((outcome.results[0].score - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unregistered_model_is_degraded() {
        let registry = ModelRegistry::new().with_model(table(ModelKind::Lightweight, &[("a", 0.5)]));
        let ensemble = RerankerEnsemble::new(registry);
        let weights = BTreeMap::from([(ModelKind::Lightweight, 0.5), (ModelKind::HighCapacity, 0.5)]);

        let outcome = ensemble
            .rerank("q", vec![candidate("a", 0.01)], &weights, Duration::from_secs(1))
            .await;

        assert_eq!(outcome.degraded, vec![ModelKind::HighCapacity]);
        assert!((outcome.results[0].score - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_no_active_model_keeps_fused_order() {
        let registry = ModelRegistry::new().with_model(Arc::new(Broken(ModelKind::Lightweight)));
        let ensemble = RerankerEnsemble::new(registry);
        let weights = BTreeMap::from([(ModelKind::Lightweight, 1.0)]);

        let outcome = ensemble
            .rerank(
                "q",
                vec![candidate("b", 0.03), candidate("a", 0.02)],
                &weights,
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(outcome.degraded, vec![ModelKind::Lightweight]);
        assert!(outcome.effective_weights.is_empty());
        let ids: Vec<&str> = outcome.results.iter().map(|r| r.chunk_id()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(outcome.results[0].score, 0.03);
    }

    #[tokio::test]
    async fn test_malformed_score_neutralized_per_item() {
        let registry = ModelRegistry::new()
            .with_model(table(ModelKind::Lightweight, &[("a", f32::NAN), ("b", 0.4)]));
        let ensemble = RerankerEnsemble::new(registry);
        let weights = BTreeMap::from([(ModelKind::Lightweight, 1.0)]);

        let outcome = ensemble
            .rerank(
                "q",
                vec![candidate("a", 0.03), candidate("b", 0.02)],
                &weights,
                Duration::from_secs(1),
            )
            .await;

        assert!(outcome.degraded.is_empty());
        assert_eq!(outcome.results[0].chunk_id(), "b");
        assert_eq!(outcome.results[1].score, 0.0);
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let ensemble = RerankerEnsemble::new(ModelRegistry::new());
        let outcome = ensemble
            .rerank("q", Vec::new(), &BTreeMap::new(), Duration::from_secs(1))
            .await;
        assert!(outcome.results.is_empty());
        assert!(outcome.degraded.is_empty());
    }
}
