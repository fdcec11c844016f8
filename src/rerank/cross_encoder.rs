//! Cross-encoder reranking using FastEmbed

use super::model::{ModelError, ModelKind, ScoringModel};
use async_trait::async_trait;
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;

/// Cross-encoder reranker for improving result precision
///
/// One instance backs one ensemble slot (lightweight, cross-encoder or
/// high-capacity); the slot only decides which checkpoint is loaded.
pub struct FastEmbedReranker {
    kind: ModelKind,
    model: Arc<TextRerank>,
    model_name: String,
}

impl FastEmbedReranker {
    /// Create a new reranker with specified model
    ///
    /// # Arguments
    /// * `kind` - Ensemble slot this model fills
    /// * `model_name` - Model name (e.g., "BAAI/bge-reranker-base")
    pub fn new(kind: ModelKind, model_name: &str) -> Result<Self, ModelError> {
        tracing::info!("Initializing {} reranker model: {}", kind, model_name);

        let checkpoint = match model_name {
            "BAAI/bge-reranker-base" => RerankerModel::BGERerankerBase,
            "BAAI/bge-reranker-v2-m3" => RerankerModel::BGERerankerV2M3,
            "jinaai/jina-reranker-v1-turbo-en" => RerankerModel::JINARerankerV1TurboEn,
            _ => {
                return Err(ModelError::InitializationError(format!(
                    "Unsupported reranker model: {}",
                    model_name
                )))
            }
        };

        let init_options = RerankInitOptions::new(checkpoint).with_show_download_progress(true);

        let model = TextRerank::try_new(init_options)
            .map_err(|e| ModelError::InitializationError(e.to_string()))?;

        Ok(Self {
            kind,
            model: Arc::new(model),
            model_name: model_name.to_string(),
        })
    }

    /// Default checkpoint for an ensemble slot
    pub fn default_model_name(kind: ModelKind) -> Option<&'static str> {
        match kind {
            ModelKind::Lightweight => Some("jinaai/jina-reranker-v1-turbo-en"),
            ModelKind::CrossEncoder => Some("BAAI/bge-reranker-base"),
            ModelKind::HighCapacity => Some("BAAI/bge-reranker-v2-m3"),
            ModelKind::KeywordBooster => None,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl ScoringModel for FastEmbedReranker {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    async fn score(&self, query: &str, text: &str) -> Result<f32, ModelError> {
        let scores = self.score_batch(query, &[text.to_string()]).await?;
        scores.into_iter().next().ok_or(ModelError::LengthMismatch {
            expected: 1,
            actual: 0,
        })
    }

    async fn score_batch(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let query = query.to_string();
        let texts = texts.to_vec();
        let expected = texts.len();

        let results = tokio::task::spawn_blocking(move || {
            let documents: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
            model
                .rerank(query.as_str(), documents, false, None)
                .map_err(|e| ModelError::RerankingError(e.to_string()))
        })
        .await
        .map_err(|e| ModelError::RerankingError(e.to_string()))??;

        // FastEmbed returns results sorted by score; restore input order
        let mut scores: Vec<Option<f32>> = vec![None; expected];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = Some(result.score);
            }
        }

        let filled: Vec<f32> = scores.into_iter().flatten().collect();
        if filled.len() != expected {
            return Err(ModelError::LengthMismatch {
                expected,
                actual: filled.len(),
            });
        }
        Ok(filled)
    }
}
