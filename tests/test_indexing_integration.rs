//! Index snapshot construction feeding the real candidate sources

mod common;

use common::*;
use std::sync::Arc;
use tempfile::TempDir;
use tessera::config::{Config, IndexingConfig, LateInteractionConfig, LexicalBackend, SparseConfig};
use tessera::corpus::{Chunk, ChunkStore, Corpus};
use tessera::embedding::{
    BatchProcessor, EmbeddingProvider, FastEmbedProvider, IndexSnapshot, KeywordIndex,
    LexicalIndex,
};
use tessera::rerank::{FastEmbedReranker, KeywordBooster, ModelKind, ModelRegistry};
use tessera::retrieval::{Aggregation, DenseSource, LateInteractionSource, SourceKind, SparseSource};
use tessera::search::{PipelineStage, SearchPipeline, SearchRequest};
use tessera::strategy::StrategyController;

fn clinical_corpus() -> Corpus {
    Corpus::from_chunks(vec![
        Chunk::new("note-1", "Patient blood pressure recorded at 145/92 this morning", "visit-1"),
        Chunk::new("note-2", "Glucose tolerance test scheduled next week", "visit-1"),
        Chunk::new("note-3", "Cafeteria menu changes on Friday", "memo-7"),
        Chunk::new("note-4", "Hemoglobin within normal limits", "visit-2"),
        Chunk::new("note-5", "Parking lot closed for resurfacing", "memo-8"),
    ])
    .unwrap()
}

fn build(corpus: &Corpus, provider: Arc<dyn EmbeddingProvider>, sparse: SparseConfig) -> IndexSnapshot {
    BatchProcessor::new(
        provider,
        2,
        IndexingConfig {
            vector_dim: DIMENSION,
            ..IndexingConfig::default()
        },
        sparse,
        LateInteractionConfig::default(),
    )
    .process(corpus)
    .unwrap()
}

fn full_pipeline(corpus: Corpus, provider: Arc<dyn EmbeddingProvider>, snapshot: IndexSnapshot) -> SearchPipeline {
    let registry = ModelRegistry::new()
        .with_model(Arc::new(TableModel::uniform(ModelKind::CrossEncoder)))
        .with_model(Arc::new(TableModel::uniform(ModelKind::HighCapacity)))
        .with_model(Arc::new(KeywordBooster::default()));

    pipeline(Arc::new(corpus), StrategyController::builtin(), registry)
        .with_source(Arc::new(DenseSource::new(Arc::clone(&provider), snapshot.vectors)))
        .with_source(Arc::new(SparseSource::new(snapshot.lexical)))
        .with_source(Arc::new(LateInteractionSource::new(
            provider,
            snapshot.tokens,
            Aggregation::Sum,
        )))
}

#[tokio::test]
async fn test_snapshot_serves_all_three_sources() {
    let corpus = clinical_corpus();
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder);
    let snapshot = build(&corpus, Arc::clone(&provider), SparseConfig::default());

    assert_eq!(snapshot.stats.chunks, 5);
    assert!(snapshot.stats.token_vectors > 0);

    let pipeline = full_pipeline(corpus, provider, snapshot);
    let response = pipeline
        .search(&SearchRequest::new("blood pressure", 3).with_strategy("accurate"))
        .await
        .unwrap();

    assert_eq!(response.stage, PipelineStage::Completed);
    assert!(response.degraded_components.is_empty());
    assert_eq!(response.results.len(), 3);

    let top = &response.results[0];
    assert_eq!(top.chunk_id, "note-1");
    assert_eq!(top.document_id, "visit-1");
    assert_eq!(top.per_source_ranks.get(&SourceKind::Sparse), Some(&1));
    assert!(top.per_source_ranks.contains_key(&SourceKind::Dense));
    assert!(top.per_source_ranks.contains_key(&SourceKind::LateInteraction));
}

#[tokio::test]
async fn test_tantivy_backend() {
    let temp = TempDir::new().unwrap();
    let corpus = clinical_corpus();
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder);
    let sparse = SparseConfig {
        backend: LexicalBackend::Tantivy {
            index_dir: temp.path().join("lexical"),
        },
        ..SparseConfig::default()
    };
    let snapshot = build(&corpus, Arc::clone(&provider), sparse);

    assert!(temp.path().join("lexical").join("meta.json").exists());

    let pipeline = full_pipeline(corpus, provider, snapshot);
    let response = pipeline
        .search(&SearchRequest::new("hemoglobin", 2).with_strategy("accurate"))
        .await
        .unwrap();

    assert_eq!(response.results[0].chunk_id, "note-4");
    assert_eq!(
        response.results[0].per_source_ranks.get(&SourceKind::Sparse),
        Some(&1)
    );
}

#[tokio::test]
async fn test_tantivy_rebuild_replaces_previous_snapshot() {
    let temp = TempDir::new().unwrap();
    let index_dir = temp.path().join("lexical");
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder);
    let sparse = SparseConfig {
        backend: LexicalBackend::Tantivy {
            index_dir: index_dir.clone(),
        },
        ..SparseConfig::default()
    };

    let stale = Corpus::from_chunks(vec![Chunk::new("old-1", "Hemoglobin retired note", "memo-1")]).unwrap();
    drop(build(&stale, Arc::clone(&provider), sparse.clone()));

    let corpus = clinical_corpus();
    drop(build(&corpus, Arc::clone(&provider), sparse.clone()));
    let snapshot = build(&corpus, Arc::clone(&provider), sparse);

    let hits = snapshot.lexical.query(&["hemoglobin".to_string()], 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "note-4");
    drop(snapshot);

    let reopened = KeywordIndex::new(index_dir).unwrap();
    assert_eq!(reopened.len(), corpus.len() as u64);
}

#[tokio::test]
async fn test_corpus_file_round_trip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("chunks.jsonl");
    std::fs::write(
        &path,
        concat!(
            r#"{"id": "c1", "text": "heart rate 72", "document_id": "d1"}"#,
            "\n\n",
            r#"{"id": "c2", "text": "oxygen saturation 97%", "document_id": "d1", "metadata": {"section": "vitals"}}"#,
            "\n"
        ),
    )
    .unwrap();

    let corpus = Corpus::load_jsonl(&path).unwrap();
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedder);
    let snapshot = build(&corpus, Arc::clone(&provider), SparseConfig::default());
    assert_eq!(snapshot.stats.chunks, 2);

    let pipeline = pipeline(Arc::new(corpus), StrategyController::builtin(), uniform_registry())
        .with_source(Arc::new(DenseSource::new(Arc::clone(&provider), snapshot.vectors)))
        .with_source(Arc::new(SparseSource::new(snapshot.lexical)));

    let response = pipeline
        .search(&SearchRequest::new("oxygen saturation", 1).with_strategy("balanced"))
        .await
        .unwrap();
    assert_eq!(response.chunk_ids(), vec!["c2"]);
}

#[tokio::test]
#[ignore] // Requires model download
async fn test_fastembed_end_to_end() {
    println!("\n=== Tessera end-to-end with local models ===\n");

    let config = Config::default();
    let corpus = clinical_corpus();
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(
        FastEmbedProvider::new(&config.embedding.model).expect("Failed to initialize embedding provider"),
    );
    println!("✓ Embedding provider: {} ({}D)", provider.model_name(), provider.dimension());

    let snapshot = BatchProcessor::new(
        Arc::clone(&provider),
        config.embedding.batch_size,
        config.indexing.clone(),
        config.sparse.clone(),
        config.late_interaction.clone(),
    )
    .process(&corpus)
    .unwrap();
    println!("✓ Indexed {} chunks in {}ms", snapshot.stats.chunks, snapshot.stats.duration_ms);

    let registry = ModelRegistry::new()
        .with_model(Arc::new(
            FastEmbedReranker::new(ModelKind::Lightweight, &config.rerankers.lightweight).unwrap(),
        ))
        .with_model(Arc::new(
            FastEmbedReranker::new(ModelKind::CrossEncoder, &config.rerankers.cross_encoder).unwrap(),
        ))
        .with_model(Arc::new(KeywordBooster::default()));
    println!("✓ Rerankers loaded: {:?}", registry.kinds().collect::<Vec<_>>());

    let pipeline = pipeline(Arc::new(corpus), StrategyController::builtin(), registry)
        .with_source(Arc::new(DenseSource::new(Arc::clone(&provider), snapshot.vectors)))
        .with_source(Arc::new(SparseSource::new(snapshot.lexical)));

    let response = pipeline
        .search(&SearchRequest::new("What was the patient's blood pressure?", 3).with_strategy("balanced"))
        .await
        .unwrap();

    for hit in &response.results {
        println!("  {}. [{:.4}] {}", hit.rank, hit.score, hit.text);
    }

    assert_eq!(response.results[0].chunk_id, "note-1");
    assert!(response.degraded_components.is_empty());
}
