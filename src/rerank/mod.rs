//! Reranker ensemble
//!
//! Learned cross-encoders and a domain keyword booster share one scoring
//! contract; the ensemble combines whichever of them are active for a request.

mod cross_encoder;
mod ensemble;
mod keyword_booster;
mod model;
mod registry;

pub use cross_encoder::FastEmbedReranker;
pub use ensemble::{redistribute_weights, EnsembleOutcome, RerankCandidate, RerankedResult, RerankerEnsemble};
pub use keyword_booster::{KeywordBooster, DEFAULT_DOMAIN_TERMS, DEFAULT_OVERLAP_WEIGHT, DEFAULT_PHRASE_BOOST};
pub use model::{ModelError, ModelKind, Normalization, ScoringModel};
pub use registry::ModelRegistry;
