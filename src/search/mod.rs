//! Search pipeline
//!
//! `RECEIVED → CANDIDATES_GENERATED → FUSED → RERANKED → COMPLETED`, or
//! `FAILED` when every enabled source fails.

mod pipeline;
mod types;

pub use pipeline::SearchPipeline;
pub use types::{PipelineStage, SearchHit, SearchRequest, SearchResponse, StageLatency};
