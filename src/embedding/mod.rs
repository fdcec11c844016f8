//! Embedding & Indexing
//!
//! Backends the candidate sources read from. Architecture:
//! - `EmbeddingProvider` trait, with `FastEmbedProvider` for local embedding
//! - `VectorStore` trait, with HNSW (`HnswVectorIndex`) for similarity search
//! - `LexicalIndex` trait, with Tantivy (`KeywordIndex`) and in-memory `Bm25Index`
//! - `TokenIndex` trait, with `InMemoryTokenIndex` for late interaction
//! - `BatchProcessor` to build all of the above from a corpus snapshot
//!
//! Every backend is read-only during a search.

mod batch;
mod bm25;
mod keyword_index;
mod provider;
mod token_index;
mod vector_index;

pub use batch::{BatchProcessor, BatchStats, IndexSnapshot};
pub use bm25::{Bm25Index, DEFAULT_B, DEFAULT_K1};
pub use keyword_index::{KeywordIndex, KeywordIndexError, LexicalIndex};
pub use provider::{model_dimension, EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use token_index::{normalize_rows, InMemoryTokenIndex, TokenIndex, TokenIndexError};
pub use vector_index::{HnswVectorIndex, VectorIndexError, VectorStore};
