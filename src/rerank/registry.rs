//! Registry of loaded scoring models, keyed by ensemble slot

use super::model::{ModelKind, ScoringModel};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable mapping from model slot to scoring capability
///
/// Built once at startup and shared across requests. Per-request weights
/// live in the strategy, never here.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<ModelKind, Arc<dyn ScoringModel>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under its own kind, replacing any previous one
    pub fn with_model(mut self, model: Arc<dyn ScoringModel>) -> Self {
        self.models.insert(model.kind(), model);
        self
    }

    pub fn get(&self, kind: ModelKind) -> Option<&Arc<dyn ScoringModel>> {
        self.models.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ModelKind> + '_ {
        self.models.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.models.keys()).finish()
    }
}
