/// Per-chunk token embeddings for late-interaction scoring
use crate::corpus::ChunkId;
use ndarray::{Array2, Axis};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenIndexError {
    #[error("Chunk not indexed: {0}")]
    NotFound(ChunkId),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Token index unavailable: {0}")]
    Unavailable(String),
}

/// Token-level embeddings of indexed chunks
pub trait TokenIndex: Send + Sync {
    /// Ids of every chunk with token embeddings, in ascending order
    fn chunk_ids(&self) -> Result<Vec<ChunkId>, TokenIndexError>;

    /// Token embeddings of one chunk, one L2-normalized row per token
    fn tokens(&self, chunk_id: &str) -> Result<Arc<Array2<f32>>, TokenIndexError>;

    /// Dimension of every token vector
    fn dimension(&self) -> usize;
}

/// Token index held entirely in memory
pub struct InMemoryTokenIndex {
    dimension: usize,
    chunks: BTreeMap<ChunkId, Arc<Array2<f32>>>,
}

impl InMemoryTokenIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            chunks: BTreeMap::new(),
        }
    }

    /// Store (or replace) the token vectors of a chunk
    pub fn insert(&mut self, chunk_id: &str, tokens: Vec<Vec<f32>>) -> Result<(), TokenIndexError> {
        if let Some(bad) = tokens.iter().find(|t| t.len() != self.dimension) {
            return Err(TokenIndexError::InvalidDimension {
                expected: self.dimension,
                actual: bad.len(),
            });
        }
        let rows = tokens.len();
        let flat: Vec<f32> = tokens.into_iter().flatten().collect();
        let mut matrix = Array2::from_shape_vec((rows, self.dimension), flat)
            .map_err(|e| TokenIndexError::Unavailable(e.to_string()))?;
        normalize_rows(&mut matrix);

        self.chunks.insert(chunk_id.to_string(), Arc::new(matrix));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl TokenIndex for InMemoryTokenIndex {
    fn chunk_ids(&self) -> Result<Vec<ChunkId>, TokenIndexError> {
        Ok(self.chunks.keys().cloned().collect())
    }

    fn tokens(&self, chunk_id: &str) -> Result<Arc<Array2<f32>>, TokenIndexError> {
        self.chunks
            .get(chunk_id)
            .cloned()
            .ok_or_else(|| TokenIndexError::NotFound(chunk_id.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Scale every row to unit length; zero rows stay zero
pub fn normalize_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.axis_iter_mut(Axis(0)) {
        let norm = row.dot(&row).sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|x| x / norm);
        }
    }
}
