//! Configuration management for Tessera
//!
//! Configuration is a single TOML file. Every section has defaults matching
//! the built-in presets, environment variables can override common keys, and
//! the whole file is validated before use.

use crate::error::{Result, TesseraError};
use crate::rerank::{DEFAULT_DOMAIN_TERMS, DEFAULT_OVERLAP_WEIGHT, DEFAULT_PHRASE_BOOST};
use crate::retrieval::{Aggregation, DEFAULT_RRF_K};
use crate::strategy::presets::DEFAULT_STRATEGY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub search: SearchConfig,
    pub embedding: EmbeddingConfig,
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub sparse: SparseConfig,
    #[serde(default)]
    pub late_interaction: LateInteractionConfig,
    #[serde(default)]
    pub rerankers: RerankersConfig,
    #[serde(default)]
    pub keyword_booster: KeywordBoosterConfig,
    #[serde(default)]
    pub strategies: BTreeMap<String, StrategyConfig>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Request defaults and fusion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub default_strategy: String,
    pub default_top_k: usize,
    /// Larger requests are clamped to this
    pub max_top_k: usize,
    /// RRF constant k
    pub fusion_k: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_strategy: DEFAULT_STRATEGY.to_string(),
            default_top_k: 5,
            max_top_k: 100,
            fusion_k: DEFAULT_RRF_K,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
        }
    }
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub vector_dim: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_search: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            vector_dim: 384,
            hnsw_ef_construction: 200,
            hnsw_m: 16,
            hnsw_ef_search: 64,
        }
    }
}

/// Which lexical index backs the sparse source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LexicalBackend {
    /// In-memory Okapi BM25
    #[default]
    Bm25,
    /// On-disk tantivy index
    Tantivy { index_dir: PathBuf },
}

/// BM25 parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseConfig {
    pub k1: f32,
    pub b: f32,
    #[serde(default)]
    pub backend: LexicalBackend,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            k1: crate::embedding::DEFAULT_K1,
            b: crate::embedding::DEFAULT_B,
            backend: LexicalBackend::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LateInteractionConfig {
    #[serde(default)]
    pub aggregation: Aggregation,
    pub max_tokens_per_chunk: usize,
}

impl Default for LateInteractionConfig {
    fn default() -> Self {
        Self {
            aggregation: Aggregation::default(),
            max_tokens_per_chunk: 256,
        }
    }
}

/// Checkpoints for the learned rerankers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankersConfig {
    pub lightweight: String,
    pub cross_encoder: String,
    pub high_capacity: String,
}

impl Default for RerankersConfig {
    fn default() -> Self {
        Self {
            lightweight: "jinaai/jina-reranker-v1-turbo-en".to_string(),
            cross_encoder: "BAAI/bge-reranker-base".to_string(),
            high_capacity: "BAAI/bge-reranker-v2-m3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordBoosterConfig {
    pub terms: Vec<String>,
    pub phrase_boost: f32,
    pub overlap_weight: f32,
}

impl Default for KeywordBoosterConfig {
    fn default() -> Self {
        Self {
            terms: DEFAULT_DOMAIN_TERMS.iter().map(|t| t.to_string()).collect(),
            phrase_boost: DEFAULT_PHRASE_BOOST,
            overlap_weight: DEFAULT_OVERLAP_WEIGHT,
        }
    }
}

/// A user-defined strategy, or a replacement for a preset of the same name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Source name → fusion weight
    pub sources: BTreeMap<String, f32>,
    /// Model name → ensemble weight
    #[serde(default)]
    pub models: BTreeMap<String, f32>,
    pub candidate_multiplier: usize,
    pub source_timeout_ms: u64,
    pub model_timeout_ms: u64,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TesseraError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| TesseraError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load `path`, or the default location; a missing file yields defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        match Self::load(&path) {
            Err(TesseraError::ConfigNotFound { path }) => {
                tracing::warn!("No config at {:?}, using built-in defaults", path);
                let mut config = Self::default();
                config.apply_env_overrides();
                ConfigValidator::validate(&config)?;
                Ok(config)
            }
            other => other,
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TesseraError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| TesseraError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: TESSERA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("TESSERA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "SEARCH__DEFAULT_STRATEGY" => {
                self.search.default_strategy = value.to_string();
            }
            "SEARCH__DEFAULT_TOP_K" => {
                self.search.default_top_k = parse_env(path, value)?;
            }
            "SEARCH__MAX_TOP_K" => {
                self.search.max_top_k = parse_env(path, value)?;
            }
            "SEARCH__FUSION_K" => {
                self.search.fusion_k = parse_env(path, value)?;
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "EMBEDDING__BATCH_SIZE" => {
                self.embedding.batch_size = parse_env(path, value)?;
            }
            "SPARSE__K1" => {
                self.sparse.k1 = parse_env(path, value)?;
            }
            "SPARSE__B" => {
                self.sparse.b = parse_env(path, value)?;
            }
            "RERANKERS__LIGHTWEIGHT" => {
                self.rerankers.lightweight = value.to_string();
            }
            "RERANKERS__CROSS_ENCODER" => {
                self.rerankers.cross_encoder = value.to_string();
            }
            "RERANKERS__HIGH_CAPACITY" => {
                self.rerankers.high_capacity = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| TesseraError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("tessera").join("config.toml"))
    }
}

fn parse_env<T: FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| TesseraError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            search: SearchConfig::default(),
            embedding: EmbeddingConfig::default(),
            indexing: IndexingConfig::default(),
            sparse: SparseConfig::default(),
            late_interaction: LateInteractionConfig::default(),
            rerankers: RerankersConfig::default(),
            keyword_booster: KeywordBoosterConfig::default(),
            strategies: BTreeMap::new(),
        }
    }
}
