/// HNSW vector index for similarity search
use crate::corpus::ChunkId;
use hnsw_rs::prelude::*;
use std::collections::HashSet;
use std::sync::RwLock;
use thiserror::Error;

/// Upper bound on HNSW layers, as recommended by hnsw_rs
const MAX_LAYERS: usize = 16;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Duplicate chunk id: {0}")]
    DuplicateId(ChunkId),
}

/// Nearest-neighbour lookup over chunk embeddings
pub trait VectorStore: Send + Sync {
    /// Up to `k` chunks closest to `vector`, as (chunk id, similarity), most similar first
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>, VectorIndexError>;
}

#[derive(Default)]
struct IdTable {
    by_data_id: Vec<ChunkId>,
    known: HashSet<ChunkId>,
}

/// HNSW vector index wrapper
///
/// Uses cosine distance; reported similarity is `1 - distance`.
/// Chunk ids are mapped to the dense integer ids HNSW works with.
pub struct HnswVectorIndex {
    index: Hnsw<'static, f32, DistCosine>,
    ids: RwLock<IdTable>,
    dimension: usize,
    ef_search: usize,
}

impl HnswVectorIndex {
    /// Create a new vector index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `capacity` - Expected number of vectors
    /// * `m` - HNSW M parameter (connections per layer)
    /// * `ef_construction` - HNSW construction parameter (higher = better recall, slower build)
    /// * `ef_search` - HNSW search parameter (higher = better recall, slower search)
    pub fn new(
        dimension: usize,
        capacity: usize,
        m: usize,
        ef_construction: usize,
        ef_search: usize,
    ) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(
            m,
            capacity.max(1),
            MAX_LAYERS,
            ef_construction,
            DistCosine,
        );

        Self {
            index,
            ids: RwLock::new(IdTable::default()),
            dimension,
            ef_search,
        }
    }

    /// Insert a vector for a chunk
    pub fn insert(&self, id: &str, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut ids = self
            .ids
            .write()
            .map_err(|_| VectorIndexError::InsertError("id table lock poisoned".to_string()))?;

        if !ids.known.insert(id.to_string()) {
            return Err(VectorIndexError::DuplicateId(id.to_string()));
        }

        let data_id = ids.by_data_id.len();
        self.index.insert((vector, data_id));
        ids.by_data_id.push(id.to_string());

        Ok(())
    }

    /// Insert multiple vectors in batch
    pub fn insert_batch(&self, items: &[(ChunkId, Vec<f32>)]) -> Result<(), VectorIndexError> {
        for (id, vector) in items {
            self.insert(id, vector)?;
        }
        Ok(())
    }

    /// Get the number of indexed vectors
    pub fn len(&self) -> usize {
        self.ids.read().map(|ids| ids.by_data_id.len()).unwrap_or(0)
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl VectorStore for HnswVectorIndex {
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>, VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let ids = self
            .ids
            .read()
            .map_err(|_| VectorIndexError::SearchError("id table lock poisoned".to_string()))?;

        if ids.by_data_id.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let neighbours = self.index.search(vector, k, self.ef_search.max(k));

        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(neighbours.len());
        for neighbour in neighbours {
            let id = ids.by_data_id.get(neighbour.d_id).ok_or_else(|| {
                VectorIndexError::SearchError(format!("Unknown data id {}", neighbour.d_id))
            })?;
            if seen.insert(neighbour.d_id) {
                results.push((id.clone(), 1.0 - neighbour.distance));
            }
        }

        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(dim: usize, hot: &[(usize, f32)]) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        for (i, x) in hot {
            v[*i] = *x;
        }
        v
    }

    #[test]
    fn test_index_creation() {
        let index = HnswVectorIndex::new(384, 100, 16, 200, 64);
        assert_eq!(index.dimension(), 384);
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
        assert!(index.query(&vec![0.0; 384], 5).unwrap().is_empty());
    }

    #[test]
    fn test_insert_and_query() {
        let index = HnswVectorIndex::new(8, 10, 16, 200, 64);

        index.insert("a", &axis(8, &[(0, 1.0)])).unwrap();
        index.insert("b", &axis(8, &[(1, 1.0)])).unwrap();
        index.insert("c", &axis(8, &[(0, 0.9), (1, 0.1)])).unwrap();
        assert_eq!(index.len(), 3);

        let results = index.query(&axis(8, &[(0, 1.0)]), 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "a");
        assert!(results[0].1 > 0.99);
        assert_eq!(results[1].0, "c");
        assert!(results[0].1 >= results[1].1);
    }

    #[test]
    fn test_batch_insert() {
        let index = HnswVectorIndex::new(4, 10, 16, 200, 64);
        let items: Vec<(ChunkId, Vec<f32>)> = (0..10)
            .map(|i| (format!("c{}", i), vec![1.0, i as f32, 0.5, 0.25]))
            .collect();

        index.insert_batch(&items).unwrap();
        assert_eq!(index.len(), 10);
    }

    #[test]
    fn test_dimension_validation() {
        let index = HnswVectorIndex::new(384, 10, 16, 200, 64);
        assert!(matches!(
            index.insert("a", &vec![1.0; 128]),
            Err(VectorIndexError::InvalidDimension { expected: 384, actual: 128 })
        ));
        assert!(index.query(&vec![1.0; 12], 3).is_err());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let index = HnswVectorIndex::new(2, 10, 16, 200, 64);
        index.insert("a", &[1.0, 0.0]).unwrap();
        assert!(matches!(
            index.insert("a", &[0.0, 1.0]),
            Err(VectorIndexError::DuplicateId(_))
        ));
    }
}
