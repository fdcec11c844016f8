//! The candidate-source contract shared by dense, sparse and late-interaction retrieval

use super::deduplication::deduplicate_chunks;
use super::types::{CandidateResult, SourceKind};
use crate::corpus::ChunkId;
use crate::embedding::{EmbeddingError, KeywordIndexError, TokenIndexError, VectorIndexError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{kind} source timed out after {after_ms}ms")]
    Timeout { kind: SourceKind, after_ms: u64 },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector index query failed: {0}")]
    VectorIndex(#[from] VectorIndexError),

    #[error("Lexical index query failed: {0}")]
    Lexical(#[from] KeywordIndexError),

    #[error("Token index query failed: {0}")]
    TokenIndex(#[from] TokenIndexError),

    #[error("Retrieval cancelled")]
    Cancelled,

    #[error("Retrieval task failed: {0}")]
    Task(String),
}

/// A retrieval strategy producing one ranked list per query
///
/// Implementations hold only read-only handles to external services, so one
/// instance serves any number of concurrent searches.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Up to `limit` candidates, best first, with 1-based ranks
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<CandidateResult>, SourceError>;
}

/// Cancellation signal shared with a blocking worker
#[derive(Debug, Clone, Default)]
pub(crate) struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once the awaiting side has gone away
    pub(crate) fn check(&self) -> Result<(), SourceError> {
        if self.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        Ok(())
    }

    fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Raises the signal when the awaiting future is dropped or finishes
struct CancelOnDrop(Cancellation);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Run blocking backend work off the async executor
///
/// `spawn_blocking` work cannot be aborted, so `work` receives a
/// [`Cancellation`] that is raised as soon as the caller stops waiting
/// (timeout, dropped search). Long loops must poll it.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, SourceError>
where
    T: Send + 'static,
    F: FnOnce(&Cancellation) -> Result<T, SourceError> + Send + 'static,
{
    let cancellation = Cancellation::default();
    let _guard = CancelOnDrop(cancellation.clone());

    tokio::task::spawn_blocking(move || work(&cancellation))
        .await
        .map_err(|e| SourceError::Task(e.to_string()))?
}

/// Turn backend (id, score) pairs into a ranked candidate list
///
/// Sorts by score descending with chunk id as tie-break, drops repeated ids,
/// truncates to `limit` and assigns ranks from 1. A non-finite score counts
/// as 0.
pub fn rank_candidates(scored: Vec<(ChunkId, f32)>, limit: usize) -> Vec<CandidateResult> {
    let mut scored: Vec<(ChunkId, f32)> = scored
        .into_iter()
        .map(|(id, score)| (id, if score.is_finite() { score } else { 0.0 }))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    deduplicate_chunks(scored)
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, (chunk_id, score))| CandidateResult {
            chunk_id,
            score,
            rank: idx + 1,
        })
        .collect()
}
