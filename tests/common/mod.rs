//! Deterministic in-process doubles for the external services
#![allow(dead_code)]

use async_trait::async_trait;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tessera::config::SearchConfig;
use tessera::corpus::{Chunk, ChunkId, Corpus};
use tessera::embedding::{EmbeddingError, EmbeddingProvider, TokenIndex, TokenIndexError};
use tessera::rerank::{
    ModelError, ModelKind, ModelRegistry, Normalization, RerankerEnsemble, ScoringModel,
};
use tessera::retrieval::{rank_candidates, CandidateResult, CandidateSource, SourceError, SourceKind};
use tessera::search::SearchPipeline;
use tessera::strategy::StrategyController;
use tessera::text::tokenize;

pub const DIMENSION: usize = 16;

/// Bag-of-words embedder: each token bumps one hashed axis, plus a constant bias axis
pub struct HashEmbedder;

impl HashEmbedder {
    fn axis(token: &str) -> usize {
        let hash = token
            .bytes()
            .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        1 + hash % (DIMENSION - 1)
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut v = vec![0.0; DIMENSION];
        v[0] = 0.1;
        for token in tokenize(text) {
            v[Self::axis(&token)] += 1.0;
        }
        Ok(v)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

/// Source returning a fixed scored list
pub struct StaticSource {
    pub kind: SourceKind,
    pub scored: Vec<(ChunkId, f32)>,
}

impl StaticSource {
    pub fn new(kind: SourceKind, scored: &[(&str, f32)]) -> Self {
        Self {
            kind,
            scored: scored.iter().map(|(id, s)| (id.to_string(), *s)).collect(),
        }
    }

    /// `count` candidates named `<prefix>-NN` with descending scores
    pub fn numbered(kind: SourceKind, prefix: &str, count: usize) -> Self {
        Self {
            kind,
            scored: (0..count)
                .map(|i| (format!("{}-{:02}", prefix, i), 1.0 - i as f32 / count as f32))
                .collect(),
        }
    }
}

#[async_trait]
impl CandidateSource for StaticSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn retrieve(&self, _query: &str, limit: usize) -> Result<Vec<CandidateResult>, SourceError> {
        Ok(rank_candidates(self.scored.clone(), limit))
    }
}

/// Source whose backend is down
pub struct FailingSource(pub SourceKind);

#[async_trait]
impl CandidateSource for FailingSource {
    fn kind(&self) -> SourceKind {
        self.0
    }

    async fn retrieve(&self, _query: &str, _limit: usize) -> Result<Vec<CandidateResult>, SourceError> {
        Err(SourceError::Task("backend unreachable".to_string()))
    }
}

/// Source that answers only after `delay`
pub struct SlowSource {
    pub inner: StaticSource,
    pub delay: Duration,
}

#[async_trait]
impl CandidateSource for SlowSource {
    fn kind(&self) -> SourceKind {
        self.inner.kind
    }

    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<CandidateResult>, SourceError> {
        tokio::time::sleep(self.delay).await;
        self.inner.retrieve(query, limit).await
    }
}

/// Model scoring texts by lookup, 0.5 for unknown texts; records batch sizes
pub struct TableModel {
    pub kind: ModelKind,
    pub scores: BTreeMap<String, f32>,
    pub largest_batch: Arc<AtomicUsize>,
}

impl TableModel {
    pub fn new(kind: ModelKind, scores: &[(&str, f32)]) -> Self {
        Self {
            kind,
            scores: scores.iter().map(|(t, s)| (t.to_string(), *s)).collect(),
            largest_batch: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn uniform(kind: ModelKind) -> Self {
        Self::new(kind, &[])
    }
}

#[async_trait]
impl ScoringModel for TableModel {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn normalization(&self) -> Normalization {
        Normalization::Clamp
    }

    async fn score(&self, _query: &str, text: &str) -> Result<f32, ModelError> {
        Ok(self.scores.get(text).copied().unwrap_or(0.5))
    }

    async fn score_batch(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, ModelError> {
        self.largest_batch.fetch_max(texts.len(), Ordering::SeqCst);
        let mut scores = Vec::with_capacity(texts.len());
        for text in texts {
            scores.push(self.score(query, text).await?);
        }
        Ok(scores)
    }
}

/// Model that raises on every call
pub struct FailingModel(pub ModelKind);

#[async_trait]
impl ScoringModel for FailingModel {
    fn kind(&self) -> ModelKind {
        self.0
    }

    async fn score(&self, _query: &str, _text: &str) -> Result<f32, ModelError> {
        Err(ModelError::RerankingError("model crashed".to_string()))
    }
}

/// Model that answers only after `delay`
pub struct SlowModel {
    pub kind: ModelKind,
    pub delay: Duration,
}

#[async_trait]
impl ScoringModel for SlowModel {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    async fn score(&self, _query: &str, _text: &str) -> Result<f32, ModelError> {
        Ok(0.9)
    }

    async fn score_batch(&self, _query: &str, texts: &[String]) -> Result<Vec<f32>, ModelError> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![0.9; texts.len()])
    }
}

/// Token index of `chunks` single-token chunks whose lookups block for 2ms each
pub struct SlowTokenIndex {
    pub chunks: usize,
    pub lookups: Arc<AtomicUsize>,
}

impl SlowTokenIndex {
    pub fn new(chunks: usize) -> Self {
        Self {
            chunks,
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl TokenIndex for SlowTokenIndex {
    fn chunk_ids(&self) -> Result<Vec<ChunkId>, TokenIndexError> {
        Ok((0..self.chunks).map(|i| format!("t-{:05}", i)).collect())
    }

    fn tokens(&self, _chunk_id: &str) -> Result<Arc<Array2<f32>>, TokenIndexError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(2));
        let mut row: Array2<f32> = Array2::zeros((1, DIMENSION));
        row[[0, 0]] = 1.0;
        Ok(Arc::new(row))
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }
}

/// Model reporting itself unloaded
pub struct UnloadedModel(pub ModelKind);

#[async_trait]
impl ScoringModel for UnloadedModel {
    fn kind(&self) -> ModelKind {
        self.0
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn score(&self, _query: &str, _text: &str) -> Result<f32, ModelError> {
        Err(ModelError::Unavailable { kind: self.0 })
    }
}

/// Registry with a uniform double for every model kind
pub fn uniform_registry() -> ModelRegistry {
    ModelKind::ALL
        .into_iter()
        .fold(ModelRegistry::new(), |registry, kind| {
            registry.with_model(Arc::new(TableModel::uniform(kind)))
        })
}

/// Corpus where every chunk's text equals its id
pub fn id_corpus<I, S>(ids: I) -> Arc<Corpus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let chunks = ids
        .into_iter()
        .map(|id| Chunk::new(id.as_ref(), id.as_ref(), "doc"));
    Arc::new(Corpus::from_chunks(chunks).unwrap())
}

/// Corpus from (id, text) pairs, all in one document
pub fn corpus(chunks: &[(&str, &str)]) -> Arc<Corpus> {
    let chunks = chunks.iter().map(|(id, text)| Chunk::new(*id, *text, "doc"));
    Arc::new(Corpus::from_chunks(chunks).unwrap())
}

pub fn pipeline(corpus: Arc<Corpus>, controller: StrategyController, registry: ModelRegistry) -> SearchPipeline {
    SearchPipeline::new(
        corpus,
        controller,
        RerankerEnsemble::new(registry),
        SearchConfig::default(),
    )
}
