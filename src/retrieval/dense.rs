//! Dense retrieval: query embedding against the vector index

use super::source::{rank_candidates, run_blocking, CandidateSource, SourceError};
use super::types::{CandidateResult, SourceKind};
use crate::embedding::{EmbeddingProvider, VectorStore};
use async_trait::async_trait;
use std::sync::Arc;

pub struct DenseSource {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl DenseSource {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { provider, store }
    }
}

#[async_trait]
impl CandidateSource for DenseSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Dense
    }

    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<CandidateResult>, SourceError> {
        let provider = Arc::clone(&self.provider);
        let store = Arc::clone(&self.store);
        let query = query.to_string();

        let scored = run_blocking(move |cancellation| {
            let embedding = provider.embed(&query)?;
            cancellation.check()?;
            Ok(store.query(&embedding, limit)?)
        })
        .await?;

        Ok(rank_candidates(scored, limit))
    }
}
