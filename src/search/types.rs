//! Search API request and response types

use crate::corpus::ChunkId;
use crate::rerank::{ModelKind, RerankedResult};
use crate::retrieval::SourceKind;
use crate::strategy::Overrides;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A search request from the chat/UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text
    pub query: String,

    /// Maximum number of results
    pub top_k: usize,

    /// Strategy name; the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Overrides::is_empty")]
    pub overrides: Overrides,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            strategy: None,
            overrides: Overrides::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    CandidatesGenerated,
    Fused,
    Reranked,
    Completed,
    /// Every enabled source failed
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "RECEIVED",
            Self::CandidatesGenerated => "CANDIDATES_GENERATED",
            Self::Fused => "FUSED",
            Self::Reranked => "RERANKED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    pub document_id: String,
    pub text: String,
    pub score: f32,
    pub rank: usize,
    pub fused_score: f32,
    /// Raw scores from the sources that returned this chunk
    pub per_source_scores: BTreeMap<SourceKind, f32>,
    pub per_source_ranks: BTreeMap<SourceKind, usize>,
    /// Normalized scores from the models that took part
    pub per_model_scores: BTreeMap<ModelKind, f32>,
}

impl From<RerankedResult> for SearchHit {
    fn from(result: RerankedResult) -> Self {
        Self {
            chunk_id: result.chunk.id.clone(),
            document_id: result.chunk.document_id.clone(),
            text: result.chunk.text.clone(),
            score: result.score,
            rank: result.rank,
            fused_score: result.fused_score,
            per_source_scores: result.source_scores,
            per_source_ranks: result.source_ranks,
            per_model_scores: result.model_scores,
        }
    }
}

/// Wall-clock time spent per stage, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageLatency {
    pub candidates_ms: f64,
    pub fusion_ms: f64,
    pub rerank_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub request_id: Uuid,
    pub results: Vec<SearchHit>,
    pub strategy_used: String,
    pub latency: StageLatency,
    /// `source:<name>` and `model:<name>` entries for excluded components
    pub degraded_components: Vec<String>,
    /// True only when every enabled source errored or timed out
    pub all_sources_failed: bool,
    pub stage: PipelineStage,
    pub completed_at: DateTime<Utc>,
}

impl SearchResponse {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_components.is_empty()
    }

    pub fn chunk_ids(&self) -> Vec<&str> {
        self.results.iter().map(|hit| hit.chunk_id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_json_shape() {
        let request: SearchRequest = serde_json::from_str(
            r#"{"query": "blood pressure", "top_k": 5, "strategy": "speed",
                "overrides": {"models": {"keyword_booster": true}}}"#,
        )
        .unwrap();

        assert_eq!(request.strategy.as_deref(), Some("speed"));
        assert_eq!(request.overrides.models.get("keyword_booster"), Some(&true));
        assert!(request.overrides.sources.is_empty());

        let minimal: SearchRequest = serde_json::from_str(r#"{"query": "q", "top_k": 1}"#).unwrap();
        assert!(minimal.strategy.is_none());
        assert!(minimal.overrides.is_empty());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::CandidatesGenerated.to_string(), "CANDIDATES_GENERATED");
        assert_eq!(
            serde_json::to_value(PipelineStage::Failed).unwrap(),
            serde_json::json!("failed")
        );
    }
}
