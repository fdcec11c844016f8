//! Strategy resolution
//!
//! A strategy bundles the enabled sources and their fusion weights, the
//! enabled rerankers and their ensemble weights, the candidate multiplier M
//! and the per-stage timeouts. Built-in presets can be overridden or extended
//! from the `[strategies]` config section.

pub mod presets;

use crate::config::{Config, StrategyConfig};
use crate::error::{Result, TesseraError};
use crate::rerank::ModelKind;
use crate::retrieval::{FusionConfig, SourceKind};
use presets::{Preset, PRESETS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Per-request component toggles, keyed by source or model name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default)]
    pub sources: BTreeMap<String, bool>,
    #[serde(default)]
    pub models: BTreeMap<String, bool>,
}

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.models.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTimeouts {
    /// Budget for each candidate source
    pub source: Duration,
    /// Budget for each reranker model
    pub model: Duration,
}

/// A resolved, typed strategy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strategy {
    pub name: String,
    pub description: String,
    pub sources: BTreeMap<SourceKind, f32>,
    pub models: BTreeMap<ModelKind, f32>,
    pub candidate_multiplier: usize,
    pub timeouts: StageTimeouts,
}

impl Strategy {
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            name: preset.name.to_string(),
            description: preset.description.to_string(),
            sources: preset.sources.iter().copied().collect(),
            models: preset.models.iter().copied().collect(),
            candidate_multiplier: preset.candidate_multiplier,
            timeouts: StageTimeouts {
                source: Duration::from_millis(preset.source_timeout_ms),
                model: Duration::from_millis(preset.model_timeout_ms),
            },
        }
    }

    /// Build from a config table; keys must name known sources and models
    pub fn from_config(name: &str, config: &StrategyConfig) -> Result<Self> {
        let sources = config
            .sources
            .iter()
            .map(|(key, &weight)| -> Result<(SourceKind, f32)> { Ok((key.parse()?, weight)) })
            .collect::<Result<BTreeMap<_, _>>>()?;
        let models = config
            .models
            .iter()
            .map(|(key, &weight)| -> Result<(ModelKind, f32)> { Ok((key.parse()?, weight)) })
            .collect::<Result<BTreeMap<_, _>>>()?;

        if sources.is_empty() {
            return Err(TesseraError::InvalidConfigValue {
                path: format!("strategies.{}.sources", name),
                message: "At least one candidate source must be enabled".to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            description: config.description.clone().unwrap_or_default(),
            sources,
            models,
            candidate_multiplier: config.candidate_multiplier,
            timeouts: StageTimeouts {
                source: Duration::from_millis(config.source_timeout_ms),
                model: Duration::from_millis(config.model_timeout_ms),
            },
        })
    }

    /// Enable or disable components for one request
    ///
    /// A component enabled here but absent from the strategy gets its default
    /// weight. Unknown names and override sets that leave no source are
    /// configuration errors.
    pub fn with_overrides(&self, overrides: &Overrides) -> Result<Self> {
        let mut strategy = self.clone();

        for (key, &enabled) in &overrides.sources {
            let kind: SourceKind = key.parse()?;
            if enabled {
                strategy
                    .sources
                    .entry(kind)
                    .or_insert_with(|| presets::default_source_weight(kind));
            } else {
                strategy.sources.remove(&kind);
            }
        }

        for (key, &enabled) in &overrides.models {
            let kind: ModelKind = key.parse()?;
            if enabled {
                strategy
                    .models
                    .entry(kind)
                    .or_insert_with(|| presets::default_model_weight(kind));
            } else {
                strategy.models.remove(&kind);
            }
        }

        if strategy.sources.is_empty() {
            return Err(TesseraError::Config(format!(
                "Overrides leave strategy '{}' without any candidate source",
                self.name
            )));
        }

        Ok(strategy)
    }

    pub fn fusion_config(&self, rrf_k: f32) -> Result<FusionConfig> {
        FusionConfig::new(rrf_k, self.sources.clone()).map_err(|e| TesseraError::InvalidConfigValue {
            path: format!("strategies.{}", self.name),
            message: e.to_string(),
        })
    }

    /// Number of fused candidates handed to the reranker ensemble
    pub fn candidate_count(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.candidate_multiplier.max(1))
    }
}

/// Resolves strategy names to strategies
#[derive(Debug, Clone)]
pub struct StrategyController {
    strategies: BTreeMap<String, Strategy>,
    default_strategy: String,
}

impl StrategyController {
    /// The four built-in presets only
    pub fn builtin() -> Self {
        Self {
            strategies: PRESETS
                .iter()
                .map(|preset| (preset.name.to_string(), Strategy::from_preset(preset)))
                .collect(),
            default_strategy: presets::DEFAULT_STRATEGY.to_string(),
        }
    }

    /// Presets plus `[strategies]` entries, which replace presets of the same name
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut controller = Self::builtin();

        for (name, table) in &config.strategies {
            let strategy = Strategy::from_config(name, table)?;
            debug!("Loaded strategy '{}' from config", name);
            controller.strategies.insert(name.clone(), strategy);
        }

        let default_strategy = config.search.default_strategy.clone();
        if !controller.strategies.contains_key(&default_strategy) {
            return Err(controller.unknown(&default_strategy));
        }
        controller.default_strategy = default_strategy;

        Ok(controller)
    }

    /// Look up a strategy by name; unknown names are never substituted
    pub fn resolve(&self, name: &str) -> Result<&Strategy> {
        self.strategies.get(name).ok_or_else(|| self.unknown(name))
    }

    pub fn default_strategy(&self) -> Result<&Strategy> {
        self.resolve(&self.default_strategy)
    }

    pub fn default_name(&self) -> &str {
        &self.default_strategy
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.keys().cloned().collect()
    }

    pub fn strategies(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.values()
    }

    fn unknown(&self, name: &str) -> TesseraError {
        TesseraError::UnknownStrategy {
            name: name.to_string(),
            available: self.names(),
        }
    }
}

impl Default for StrategyController {
    fn default() -> Self {
        Self::builtin()
    }
}
