use crate::config::{Config, StrategyConfig, SCHEMA_VERSION};
use crate::error::{Result, TesseraError, ValidationError};
use crate::rerank::ModelKind;
use crate::retrieval::SourceKind;
use crate::strategy::presets::PRESETS;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        // Validate schema version
        Self::validate_schema_version(config, &mut errors);

        // Validate search defaults and fusion constant
        Self::validate_search(config, &mut errors);

        // Validate embedding settings
        Self::validate_embedding(config, &mut errors);

        // Validate indexing settings
        Self::validate_indexing(config, &mut errors);

        // Validate BM25 and late-interaction settings
        Self::validate_scoring(config, &mut errors);

        // Validate reranker checkpoints and keyword booster
        Self::validate_rerankers(config, &mut errors);

        for (name, strategy) in &config.strategies {
            Self::validate_strategy(name, strategy, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TesseraError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_search(config: &Config, errors: &mut Vec<ValidationError>) {
        let search = &config.search;

        let known = PRESETS.iter().any(|p| p.name == search.default_strategy)
            || config.strategies.contains_key(&search.default_strategy);
        if !known {
            errors.push(ValidationError::new(
                "search.default_strategy",
                format!("Unknown strategy '{}'", search.default_strategy),
            ));
        }

        if search.default_top_k == 0 {
            errors.push(ValidationError::new(
                "search.default_top_k",
                "Default top_k must be greater than 0",
            ));
        }

        if search.max_top_k < search.default_top_k {
            errors.push(ValidationError::new(
                "search.max_top_k",
                format!(
                    "max_top_k ({}) must be at least default_top_k ({})",
                    search.max_top_k, search.default_top_k
                ),
            ));
        }

        if !search.fusion_k.is_finite() || search.fusion_k <= 0.0 {
            errors.push(ValidationError::new(
                "search.fusion_k",
                format!("Fusion constant must be positive, got {}", search.fusion_k),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        // Validate batch size
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        // Validate model name is not empty
        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
            return;
        }

        match crate::embedding::model_dimension(&config.embedding.model) {
            None => errors.push(ValidationError::new(
                "embedding.model",
                format!("Unsupported embedding model '{}'", config.embedding.model),
            )),
            Some(dimension) if dimension != config.indexing.vector_dim => {
                errors.push(ValidationError::new(
                    "indexing.vector_dim",
                    format!(
                        "Model '{}' produces {}-dimensional vectors, but vector_dim is {}",
                        config.embedding.model, dimension, config.indexing.vector_dim
                    ),
                ))
            }
            Some(_) => {}
        }
    }

    fn validate_indexing(config: &Config, errors: &mut Vec<ValidationError>) {
        // Validate vector_dim
        if config.indexing.vector_dim == 0 {
            errors.push(ValidationError::new(
                "indexing.vector_dim",
                "Vector dimension must be greater than 0",
            ));
        }

        // Validate HNSW parameters
        if config.indexing.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.indexing.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if config.indexing.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "indexing.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_scoring(config: &Config, errors: &mut Vec<ValidationError>) {
        let k1 = config.sparse.k1;
        if !k1.is_finite() || k1 < 0.0 {
            errors.push(ValidationError::new(
                "sparse.k1",
                format!("k1 must be non-negative, got {}", k1),
            ));
        }

        let b = config.sparse.b;
        if !(0.0..=1.0).contains(&b) {
            errors.push(ValidationError::new(
                "sparse.b",
                format!("b must be between 0.0 and 1.0, got {}", b),
            ));
        }

        if config.late_interaction.max_tokens_per_chunk == 0 {
            errors.push(ValidationError::new(
                "late_interaction.max_tokens_per_chunk",
                "Token limit must be greater than 0",
            ));
        }
    }

    fn validate_rerankers(config: &Config, errors: &mut Vec<ValidationError>) {
        let checkpoints = [
            ("rerankers.lightweight", &config.rerankers.lightweight),
            ("rerankers.cross_encoder", &config.rerankers.cross_encoder),
            ("rerankers.high_capacity", &config.rerankers.high_capacity),
        ];
        for (path, name) in checkpoints {
            if name.is_empty() {
                errors.push(ValidationError::new(path, "Model name cannot be empty"));
            }
        }

        let booster = &config.keyword_booster;
        for (path, value) in [
            ("keyword_booster.phrase_boost", booster.phrase_boost),
            ("keyword_booster.overlap_weight", booster.overlap_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(ValidationError::new(
                    path,
                    format!("Must be non-negative, got {}", value),
                ));
            }
        }
    }

    fn validate_strategy(name: &str, strategy: &StrategyConfig, errors: &mut Vec<ValidationError>) {
        let prefix = format!("strategies.{}", name);

        if strategy.sources.is_empty() {
            errors.push(ValidationError::new(
                format!("{}.sources", prefix),
                "At least one candidate source must be enabled",
            ));
        }

        for (key, weight) in &strategy.sources {
            let path = format!("{}.sources.{}", prefix, key);
            if key.parse::<SourceKind>().is_err() {
                errors.push(ValidationError::new(
                    path,
                    format!("Unknown source '{}'", key),
                ));
            } else if !Self::is_valid_weight(*weight) {
                errors.push(ValidationError::new(
                    path,
                    format!("Weight must be positive, got {}", weight),
                ));
            }
        }

        for (key, weight) in &strategy.models {
            let path = format!("{}.models.{}", prefix, key);
            if key.parse::<ModelKind>().is_err() {
                errors.push(ValidationError::new(path, format!("Unknown model '{}'", key)));
            } else if !Self::is_valid_weight(*weight) {
                errors.push(ValidationError::new(
                    path,
                    format!("Weight must be positive, got {}", weight),
                ));
            }
        }

        if strategy.candidate_multiplier == 0 {
            errors.push(ValidationError::new(
                format!("{}.candidate_multiplier", prefix),
                "Candidate multiplier must be greater than 0",
            ));
        }

        if strategy.source_timeout_ms == 0 {
            errors.push(ValidationError::new(
                format!("{}.source_timeout_ms", prefix),
                "Source timeout must be greater than 0",
            ));
        }

        if strategy.model_timeout_ms == 0 {
            errors.push(ValidationError::new(
                format!("{}.model_timeout_ms", prefix),
                "Model timeout must be greater than 0",
            ));
        }
    }

    fn is_valid_weight(weight: f32) -> bool {
        weight.is_finite() && weight > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn strategy(sources: &[(&str, f32)], models: &[(&str, f32)]) -> StrategyConfig {
        StrategyConfig {
            description: None,
            sources: sources.iter().map(|(k, w)| (k.to_string(), *w)).collect(),
            models: models.iter().map(|(k, w)| (k.to_string(), *w)).collect(),
            candidate_multiplier: 3,
            source_timeout_ms: 1000,
            model_timeout_ms: 1000,
        }
    }

    fn error_paths(config: &Config) -> Vec<String> {
        match ConfigValidator::validate(config) {
            Err(TesseraError::ConfigValidation { errors }) => errors.into_iter().map(|e| e.path).collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_unknown_default_strategy() {
        let mut config = Config::default();
        config.search.default_strategy = "turbo".to_string();
        assert_eq!(error_paths(&config), vec!["search.default_strategy"]);
    }

    #[test]
    fn test_collects_every_problem() {
        let mut config = Config::default();
        config.search.fusion_k = 0.0;
        config.sparse.b = 1.5;
        config.embedding.batch_size = 0;

        let paths = error_paths(&config);
        assert_eq!(paths.len(), 3);
        assert!(paths.contains(&"search.fusion_k".to_string()));
        assert!(paths.contains(&"sparse.b".to_string()));
    }

    #[test]
    fn test_embedding_model_must_match_dimension() {
        let mut config = Config::default();
        config.embedding.model = "bge-base-en-v1.5".to_string();
        assert_eq!(error_paths(&config), vec!["indexing.vector_dim"]);

        config.indexing.vector_dim = 768;
        assert!(ConfigValidator::validate(&config).is_ok());

        config.embedding.model = "word2vec".to_string();
        assert_eq!(error_paths(&config), vec!["embedding.model"]);
    }

    #[test]
    fn test_strategy_keys_and_weights() {
        let mut config = Config::default();
        config.strategies = BTreeMap::from([
            ("bad_key".to_string(), strategy(&[("colbert", 1.0)], &[])),
            ("bad_weight".to_string(), strategy(&[("dense", 1.0)], &[("lightweight", -1.0)])),
            ("no_sources".to_string(), strategy(&[], &[("keyword_booster", 1.0)])),
            ("ok".to_string(), strategy(&[("sparse", 1.0)], &[("cross_encoder", 1.0)])),
        ]);

        let paths = error_paths(&config);
        assert_eq!(
            paths,
            vec![
                "strategies.bad_key.sources.colbert",
                "strategies.bad_weight.models.lightweight",
                "strategies.no_sources.sources",
            ]
        );
    }

    #[test]
    fn test_configured_strategy_can_be_default() {
        let mut config = Config::default();
        config
            .strategies
            .insert("lexical".to_string(), strategy(&[("sparse", 1.0)], &[]));
        config.search.default_strategy = "lexical".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());
    }
}
