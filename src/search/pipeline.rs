//! End-to-end search: strategy resolution, concurrent candidate generation,
//! rank fusion, ensemble reranking and truncation

use super::types::{PipelineStage, SearchHit, SearchRequest, SearchResponse, StageLatency};
use crate::config::SearchConfig;
use crate::corpus::ChunkStore;
use crate::error::{Result, TesseraError};
use crate::rerank::{RerankCandidate, RerankerEnsemble};
use crate::retrieval::{reciprocal_rank_fusion, CandidateSource, RankedList, SourceError, SourceKind};
use crate::strategy::{Strategy, StrategyController};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of the candidate stage
struct CandidateSet {
    lists: Vec<RankedList>,
    failed: BTreeSet<SourceKind>,
    enabled: usize,
}

impl CandidateSet {
    fn all_failed(&self) -> bool {
        self.enabled > 0 && self.failed.len() == self.enabled
    }
}

/// Stateless search orchestrator over a fixed corpus snapshot
///
/// Holds only shared read-only handles, so a single pipeline serves any
/// number of concurrent searches.
pub struct SearchPipeline {
    sources: BTreeMap<SourceKind, Arc<dyn CandidateSource>>,
    ensemble: RerankerEnsemble,
    controller: StrategyController,
    chunks: Arc<dyn ChunkStore>,
    settings: SearchConfig,
}

impl SearchPipeline {
    pub fn new(
        chunks: Arc<dyn ChunkStore>,
        controller: StrategyController,
        ensemble: RerankerEnsemble,
        settings: SearchConfig,
    ) -> Self {
        Self {
            sources: BTreeMap::new(),
            ensemble,
            controller,
            chunks,
            settings,
        }
    }

    /// Register a candidate source under its own kind
    pub fn with_source(mut self, source: Arc<dyn CandidateSource>) -> Self {
        self.sources.insert(source.kind(), source);
        self
    }

    pub fn controller(&self) -> &StrategyController {
        &self.controller
    }

    /// Run one search
    ///
    /// Only request and configuration problems are returned as errors.
    /// Source and model failures degrade the response instead.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let mut stage = PipelineStage::Received;
        debug!("[{}] {}", request_id, stage);

        let query = request.query.trim();
        if query.is_empty() {
            return Err(TesseraError::InvalidRequest("Query text cannot be empty".to_string()));
        }
        if request.top_k == 0 {
            return Err(TesseraError::InvalidRequest("top_k must be greater than 0".to_string()));
        }
        let top_k = if request.top_k > self.settings.max_top_k {
            debug!("Clamping top_k {} to {}", request.top_k, self.settings.max_top_k);
            self.settings.max_top_k
        } else {
            request.top_k
        };

        let strategy_name = request
            .strategy
            .as_deref()
            .unwrap_or_else(|| self.controller.default_name());
        let strategy = self.controller.resolve(strategy_name)?.with_overrides(&request.overrides)?;
        let fusion_config = strategy.fusion_config(self.settings.fusion_k)?;
        let candidate_count = strategy.candidate_count(top_k);

        info!(
            "[{}] Searching with strategy '{}' (top_k={}, M={})",
            request_id, strategy.name, top_k, candidate_count
        );

        let mut latency = StageLatency::default();
        let mut degraded_components = Vec::new();

        // Candidate generation
        let stage_start = Instant::now();
        let candidates = self.generate_candidates(query, &strategy, candidate_count).await;
        latency.candidates_ms = elapsed_ms(stage_start);
        degraded_components.extend(candidates.failed.iter().map(|kind| format!("source:{}", kind)));
        stage = PipelineStage::CandidatesGenerated;
        debug!("[{}] {}", request_id, stage);

        if candidates.all_failed() {
            stage = PipelineStage::Failed;
            warn!("[{}] Every enabled source failed", request_id);
            latency.total_ms = elapsed_ms(started);
            return Ok(SearchResponse {
                request_id,
                results: Vec::new(),
                strategy_used: strategy.name,
                latency,
                degraded_components,
                all_sources_failed: true,
                stage,
                completed_at: chrono::Utc::now(),
            });
        }

        // Fusion
        let stage_start = Instant::now();
        let fused = reciprocal_rank_fusion(&candidates.lists, &fusion_config);
        let fused_total = fused.len();
        let rerank_input: Vec<RerankCandidate> = fused
            .into_iter()
            .take(candidate_count)
            .filter_map(|fused| match self.chunks.get(&fused.chunk_id) {
                Some(chunk) => Some(RerankCandidate { fused, chunk }),
                None => {
                    warn!("Chunk {} missing from corpus snapshot, skipping", fused.chunk_id);
                    None
                }
            })
            .collect();
        latency.fusion_ms = elapsed_ms(stage_start);
        stage = PipelineStage::Fused;
        debug!(
            "[{}] {}: {} fused, {} sent to rerankers",
            request_id,
            stage,
            fused_total,
            rerank_input.len()
        );

        // Reranking
        let stage_start = Instant::now();
        let outcome = self
            .ensemble
            .rerank(query, rerank_input, &strategy.models, strategy.timeouts.model)
            .await;
        latency.rerank_ms = elapsed_ms(stage_start);
        degraded_components.extend(outcome.degraded.iter().map(|kind| format!("model:{}", kind)));
        stage = PipelineStage::Reranked;
        debug!("[{}] {}", request_id, stage);

        let results: Vec<SearchHit> = outcome
            .results
            .into_iter()
            .take(top_k)
            .map(SearchHit::from)
            .collect();

        stage = PipelineStage::Completed;
        latency.total_ms = elapsed_ms(started);
        info!(
            "[{}] {} with {} results in {:.1}ms ({} degraded)",
            request_id,
            stage,
            results.len(),
            latency.total_ms,
            degraded_components.len()
        );

        Ok(SearchResponse {
            request_id,
            results,
            strategy_used: strategy.name,
            latency,
            degraded_components,
            all_sources_failed: false,
            stage,
            completed_at: chrono::Utc::now(),
        })
    }

    /// Fan out to every enabled source, each under its own timeout
    async fn generate_candidates(&self, query: &str, strategy: &Strategy, limit: usize) -> CandidateSet {
        let mut failed = BTreeSet::new();
        let mut attempted = BTreeSet::new();
        let mut tasks = JoinSet::new();
        let budget = strategy.timeouts.source;

        for &kind in strategy.sources.keys() {
            let Some(source) = self.sources.get(&kind) else {
                warn!("Source {} is enabled but not configured", kind);
                failed.insert(kind);
                continue;
            };

            attempted.insert(kind);
            let source = Arc::clone(source);
            let query = query.to_string();
            tasks.spawn(async move {
                let started = Instant::now();
                let result = match tokio::time::timeout(budget, source.retrieve(&query, limit)).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout {
                        kind,
                        after_ms: budget.as_millis() as u64,
                    }),
                };
                (kind, result, started.elapsed())
            });
        }

        let mut lists = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((kind, Ok(results), elapsed)) => {
                    debug!("Source {} returned {} candidates in {:?}", kind, results.len(), elapsed);
                    lists.push(RankedList::new(kind, results));
                }
                Ok((kind, Err(e), _)) => {
                    warn!("Source {} degraded: {}", kind, e);
                    failed.insert(kind);
                }
                Err(e) => {
                    warn!("Source task failed: {}", e);
                }
            }
        }

        // Attempted sources that produced nothing, including panicked tasks
        for kind in attempted {
            if !lists.iter().any(|list| list.source == kind) {
                failed.insert(kind);
            }
        }

        lists.sort_by_key(|list| list.source);

        CandidateSet {
            lists,
            failed,
            enabled: strategy.sources.len(),
        }
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
