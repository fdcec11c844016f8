//! Ranked-list structures produced by candidate sources and rank fusion

use crate::corpus::ChunkId;
use crate::error::TesseraError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The candidate-generation strategies
///
/// Declaration order is the canonical order used wherever per-source values
/// are combined, so results never depend on which source finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Whole-chunk embedding similarity
    Dense,
    /// BM25 lexical scoring
    Sparse,
    /// Token-level MaxSim
    LateInteraction,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [Self::Dense, Self::Sparse, Self::LateInteraction];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Sparse => "sparse",
            Self::LateInteraction => "late_interaction",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TesseraError::UnknownComponent {
                kind: "source",
                key: s.to_string(),
            })
    }
}

/// One entry of a single source's ranked list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub chunk_id: ChunkId,

    /// Source-specific score (similarity, BM25, MaxSim)
    pub score: f32,

    /// 1-based position within the source's list
    pub rank: usize,
}

/// A source's complete contribution to one search
#[derive(Debug, Clone)]
pub struct RankedList {
    pub source: SourceKind,
    pub results: Vec<CandidateResult>,
}

impl RankedList {
    pub fn new(source: SourceKind, results: Vec<CandidateResult>) -> Self {
        Self { source, results }
    }
}

/// A chunk after rank fusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub chunk_id: ChunkId,

    /// Sum of weighted reciprocal-rank contributions
    pub score: f32,

    /// Rank of this chunk in every source that returned it
    pub source_ranks: BTreeMap<SourceKind, usize>,

    /// Raw score of this chunk in every source that returned it
    pub source_scores: BTreeMap<SourceKind, f32>,
}

impl FusedResult {
    /// Best (lowest) rank across contributing sources
    pub fn min_rank(&self) -> usize {
        self.source_ranks.values().copied().min().unwrap_or(usize::MAX)
    }
}
