//! Candidate generation and rank fusion
//!
//! Three independent sources (dense, sparse, late-interaction) each produce a
//! ranked list for a query; weighted Reciprocal Rank Fusion merges them into
//! one ranking that the reranker ensemble consumes.

mod deduplication;
mod dense;
mod fusion;
mod late_interaction;
mod source;
mod sparse;
mod types;

pub use deduplication::deduplicate_chunks;
pub use dense::DenseSource;
pub use fusion::{reciprocal_rank_fusion, FusionConfig, FusionError, DEFAULT_RRF_K};
pub use late_interaction::{max_sim, Aggregation, LateInteractionSource};
pub use source::{rank_candidates, CandidateSource, SourceError};
pub use sparse::SparseSource;
pub use types::{CandidateResult, FusedResult, RankedList, SourceKind};
