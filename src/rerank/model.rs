//! The scoring contract shared by every reranker in the ensemble

use crate::error::TesseraError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The reranker variants an ensemble can combine
///
/// Declaration order is the canonical order for weighted sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Small distilled cross-encoder, cheapest learned model
    Lightweight,
    /// General-purpose cross-encoder
    CrossEncoder,
    /// Large multilingual reranker
    HighCapacity,
    /// Domain term lookup, not a learned model
    KeywordBooster,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        Self::Lightweight,
        Self::CrossEncoder,
        Self::HighCapacity,
        Self::KeywordBooster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lightweight => "lightweight",
            Self::CrossEncoder => "cross_encoder",
            Self::HighCapacity => "high_capacity",
            Self::KeywordBooster => "keyword_booster",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TesseraError::UnknownComponent {
                kind: "model",
                key: s.to_string(),
            })
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Reranker initialization failed: {0}")]
    InitializationError(String),

    #[error("{kind} model is not loaded")]
    Unavailable { kind: ModelKind },

    #[error("Reranking failed: {0}")]
    RerankingError(String),

    #[error("{kind} model timed out after {after_ms}ms")]
    Timeout { kind: ModelKind, after_ms: u64 },

    #[error("Model returned {actual} scores for {expected} candidates")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Maps a model's raw output into [0, 1] before weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Logistic squashing for cross-encoder logits
    Sigmoid,
    /// Scores already in [0, 1]; clamped
    Clamp,
}

impl Normalization {
    /// Normalize a raw score; non-finite input yields 0
    pub fn apply(&self, raw: f32) -> f32 {
        if !raw.is_finite() {
            return 0.0;
        }
        let value = match self {
            Self::Sigmoid => 1.0 / (1.0 + (-raw).exp()),
            Self::Clamp => raw.clamp(0.0, 1.0),
        };
        if value.is_finite() {
            value
        } else {
            0.0
        }
    }
}

/// `score(query, chunk_text) -> float`
///
/// Models are loaded and unloaded outside this crate; `is_available` reports
/// the current state and an unavailable model is skipped for the request.
#[async_trait]
pub trait ScoringModel: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn is_available(&self) -> bool {
        true
    }

    fn normalization(&self) -> Normalization {
        Normalization::Sigmoid
    }

    async fn score(&self, query: &str, text: &str) -> Result<f32, ModelError>;

    /// Score every text against the query, one output per input in order
    async fn score_batch(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, ModelError> {
        let mut scores = Vec::with_capacity(texts.len());
        for text in texts {
            scores.push(self.score(query, text).await?);
        }
        Ok(scores)
    }
}
