//! Tessera - Hybrid Retrieval & Ensemble Reranking
//!
//! Retrieves chunks from a fixed corpus snapshot with three independent
//! candidate sources (dense, sparse, late-interaction), merges their rankings
//! with weighted Reciprocal Rank Fusion and reorders the top candidates with an
//! ensemble of rerankers. Named strategies trade latency against accuracy, and
//! failing components degrade a search instead of aborting it.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod rerank;
pub mod retrieval;
pub mod search;
pub mod strategy;
pub mod text;

pub use error::{Result, TesseraError};
pub use search::{SearchPipeline, SearchRequest, SearchResponse};
