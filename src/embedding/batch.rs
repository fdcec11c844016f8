/// Batch construction of the read-only index snapshot searched by the pipeline
use super::{
    Bm25Index, EmbeddingProvider, HnswVectorIndex, InMemoryTokenIndex, KeywordIndex,
    LexicalIndex,
};
use crate::config::{IndexingConfig, LexicalBackend, LateInteractionConfig, SparseConfig};
use crate::corpus::{Chunk, Corpus};
use crate::text::tokenize;
use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Indexes built from one corpus snapshot
pub struct IndexSnapshot {
    pub vectors: Arc<HnswVectorIndex>,
    pub lexical: Arc<dyn LexicalIndex>,
    pub tokens: Arc<InMemoryTokenIndex>,
    pub stats: BatchStats,
}

/// Counters reported after a build
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub chunks: usize,
    /// Chunks left out of every index because their text is blank
    pub skipped: usize,
    pub token_vectors: usize,
    pub duration_ms: u64,
}

/// Embeds a corpus in batches and populates the vector, lexical and token indexes
pub struct BatchProcessor {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    indexing: IndexingConfig,
    sparse: SparseConfig,
    late_interaction: LateInteractionConfig,
}

impl BatchProcessor {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        indexing: IndexingConfig,
        sparse: SparseConfig,
        late_interaction: LateInteractionConfig,
    ) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            indexing,
            sparse,
            late_interaction,
        }
    }

    /// Build every index for `corpus`
    pub fn process(&self, corpus: &Corpus) -> Result<IndexSnapshot> {
        let start = Instant::now();
        let (chunks, blank): (Vec<&Arc<Chunk>>, Vec<&Arc<Chunk>>) =
            corpus.iter().partition(|c| !c.text.trim().is_empty());

        for chunk in &blank {
            warn!("Skipping chunk {} with blank text", chunk.id);
        }

        info!("Building index snapshot for {} chunks", chunks.len());

        let dimension = self.provider.dimension();
        let vectors = HnswVectorIndex::new(
            dimension,
            chunks.len(),
            self.indexing.hnsw_m,
            self.indexing.hnsw_ef_construction,
            self.indexing.hnsw_ef_search,
        );
        let mut tokens = InMemoryTokenIndex::new(dimension);
        let mut token_vectors = 0;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self
                .provider
                .embed_batch(&texts)
                .context("Failed to embed chunk batch")?;

            for (chunk, embedding) in batch.iter().zip(embeddings.iter()) {
                vectors
                    .insert(&chunk.id, embedding)
                    .with_context(|| format!("Failed to index vector for chunk {}", chunk.id))?;
            }

            token_vectors += self.index_tokens(batch, &mut tokens)?;
            debug!("Indexed batch of {} chunks", batch.len());
        }

        let lexical = self.build_lexical(&chunks)?;

        let stats = BatchStats {
            chunks: chunks.len(),
            skipped: blank.len(),
            token_vectors,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Index snapshot ready: {} chunks, {} token vectors, {}ms",
            stats.chunks, stats.token_vectors, stats.duration_ms
        );

        Ok(IndexSnapshot {
            vectors: Arc::new(vectors),
            lexical,
            tokens: Arc::new(tokens),
            stats,
        })
    }

    /// Embed the distinct tokens of a batch once and assemble per-chunk token matrices
    fn index_tokens(&self, batch: &[&Arc<Chunk>], tokens: &mut InMemoryTokenIndex) -> Result<usize> {
        let per_chunk: Vec<Vec<String>> = batch
            .iter()
            .map(|c| {
                let mut t = tokenize(&c.text);
                t.truncate(self.late_interaction.max_tokens_per_chunk);
                t
            })
            .collect();

        let vocabulary: Vec<String> = per_chunk
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if vocabulary.is_empty() {
            return Ok(0);
        }

        let embedded = self
            .provider
            .embed_batch(&vocabulary)
            .context("Failed to embed chunk tokens")?;
        let lookup: HashMap<&str, &Vec<f32>> = vocabulary
            .iter()
            .map(String::as_str)
            .zip(embedded.iter())
            .collect();

        let mut count = 0;
        for (chunk, words) in batch.iter().zip(per_chunk.iter()) {
            if words.is_empty() {
                continue;
            }
            let matrix: Vec<Vec<f32>> = words
                .iter()
                .filter_map(|w| lookup.get(w.as_str()).map(|v| (*v).clone()))
                .collect();
            count += matrix.len();
            tokens
                .insert(&chunk.id, matrix)
                .with_context(|| format!("Failed to index tokens for chunk {}", chunk.id))?;
        }

        Ok(count)
    }

    fn build_lexical(&self, chunks: &[&Arc<Chunk>]) -> Result<Arc<dyn LexicalIndex>> {
        match &self.sparse.backend {
            LexicalBackend::Bm25 => {
                let mut index = Bm25Index::new(self.sparse.k1, self.sparse.b);
                for chunk in chunks {
                    index.insert(&chunk.id, &chunk.text);
                }
                Ok(Arc::new(index))
            }
            LexicalBackend::Tantivy { index_dir } => {
                let mut index = KeywordIndex::new(index_dir.clone())
                    .context("Failed to open tantivy index")?;
                if !index.is_empty() {
                    debug!("Clearing {} documents from previous snapshot", index.len());
                }
                index.clear()?;
                for chunk in chunks {
                    index.insert(&chunk.id, &chunk.text)?;
                }
                index.commit()?;
                Ok(Arc::new(index))
            }
        }
    }
}
