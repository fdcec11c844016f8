//! Built-in strategy presets, ordered fastest to most accurate

use crate::rerank::ModelKind;
use crate::retrieval::SourceKind;

/// Static description of a built-in strategy
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub sources: &'static [(SourceKind, f32)],
    pub models: &'static [(ModelKind, f32)],
    pub candidate_multiplier: usize,
    pub source_timeout_ms: u64,
    pub model_timeout_ms: u64,
}

pub const SPEED: Preset = Preset {
    name: "speed",
    description: "Dense retrieval with the lightweight reranker only",
    sources: &[(SourceKind::Dense, 1.0)],
    models: &[(ModelKind::Lightweight, 1.0)],
    candidate_multiplier: 2,
    source_timeout_ms: 1_000,
    model_timeout_ms: 1_000,
};

pub const BALANCED: Preset = Preset {
    name: "balanced",
    description: "Dense and sparse retrieval, lightweight and cross-encoder reranking with keyword boost",
    sources: &[(SourceKind::Dense, 0.6), (SourceKind::Sparse, 0.4)],
    models: &[
        (ModelKind::Lightweight, 0.4),
        (ModelKind::CrossEncoder, 0.4),
        (ModelKind::KeywordBooster, 0.2),
    ],
    candidate_multiplier: 3,
    source_timeout_ms: 2_000,
    model_timeout_ms: 3_000,
};

pub const ACCURATE: Preset = Preset {
    name: "accurate",
    description: "All sources, high-capacity reranker backed by cross-encoder and keyword boost",
    sources: &[
        (SourceKind::Dense, 0.4),
        (SourceKind::Sparse, 0.3),
        (SourceKind::LateInteraction, 0.3),
    ],
    models: &[
        (ModelKind::CrossEncoder, 0.25),
        (ModelKind::HighCapacity, 0.6),
        (ModelKind::KeywordBooster, 0.15),
    ],
    candidate_multiplier: 3,
    source_timeout_ms: 3_000,
    model_timeout_ms: 8_000,
};

pub const ENSEMBLE: Preset = Preset {
    name: "ensemble",
    description: "All sources and all rerankers",
    sources: &[
        (SourceKind::Dense, 0.4),
        (SourceKind::Sparse, 0.3),
        (SourceKind::LateInteraction, 0.3),
    ],
    models: &[
        (ModelKind::Lightweight, 0.25),
        (ModelKind::CrossEncoder, 0.25),
        (ModelKind::HighCapacity, 0.4),
        (ModelKind::KeywordBooster, 0.1),
    ],
    candidate_multiplier: 4,
    source_timeout_ms: 5_000,
    model_timeout_ms: 10_000,
};

pub const PRESETS: &[Preset] = &[SPEED, BALANCED, ACCURATE, ENSEMBLE];

pub const DEFAULT_STRATEGY: &str = "balanced";

/// Weight used when an override enables a source the strategy leaves out
pub fn default_source_weight(kind: SourceKind) -> f32 {
    ENSEMBLE
        .sources
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, w)| *w)
        .unwrap_or(1.0)
}

/// Weight used when an override enables a model the strategy leaves out
pub fn default_model_weight(kind: ModelKind) -> f32 {
    ENSEMBLE
        .models
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, w)| *w)
        .unwrap_or(1.0)
}
