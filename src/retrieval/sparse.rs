//! Sparse retrieval: BM25 over the lexical index

use super::source::{rank_candidates, run_blocking, CandidateSource, SourceError};
use super::types::{CandidateResult, SourceKind};
use crate::embedding::LexicalIndex;
use crate::text::tokenize;
use async_trait::async_trait;
use std::sync::Arc;

pub struct SparseSource {
    index: Arc<dyn LexicalIndex>,
}

impl SparseSource {
    pub fn new(index: Arc<dyn LexicalIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl CandidateSource for SparseSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Sparse
    }

    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<CandidateResult>, SourceError> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let index = Arc::clone(&self.index);
        let scored = run_blocking(move |_| Ok(index.query(&terms, limit)?)).await?;

        Ok(rank_candidates(scored, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Bm25Index;

    #[tokio::test]
    async fn test_exact_term_match() {
        let mut index = Bm25Index::default();
        index.insert("A", "Result: X145 value 12.4");
        index.insert("B", "The biomarker measured within the reference interval");
        index.insert("C", "Parking garage opening hours");

        let source = SparseSource::new(Arc::new(index));
        let results = source.retrieve("X145 value", 10).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "A");
        assert_eq!(results[0].rank, 1);
    }

    #[tokio::test]
    async fn test_punctuation_only_query() {
        let source = SparseSource::new(Arc::new(Bm25Index::default()));
        assert!(source.retrieve("?!", 10).await.unwrap().is_empty());
    }
}
