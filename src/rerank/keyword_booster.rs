//! Domain keyword booster
//!
//! A lookup scorer, not a learned model: rewards chunks that share domain
//! phrases and plain query terms with the query.

use super::model::{ModelError, ModelKind, Normalization, ScoringModel};
use crate::text::tokenize;
use async_trait::async_trait;
use std::collections::BTreeSet;

pub const DEFAULT_PHRASE_BOOST: f32 = 0.1;
pub const DEFAULT_OVERLAP_WEIGHT: f32 = 0.5;

/// Clinical vocabulary used when no term list is configured
pub const DEFAULT_DOMAIN_TERMS: &[&str] = &[
    "blood pressure",
    "heart rate",
    "temperature",
    "oxygen saturation",
    "glucose",
    "hemoglobin",
    "cholesterol",
    "triglycerides",
    "diagnosis",
    "treatment",
    "medication",
    "prescription",
    "patient",
    "vital signs",
    "lab results",
    "symptoms",
];

pub struct KeywordBooster {
    /// Each domain term as a token sequence
    phrases: Vec<Vec<String>>,
    phrase_boost: f32,
    overlap_weight: f32,
}

impl KeywordBooster {
    pub fn new<I, S>(terms: I, phrase_boost: f32, overlap_weight: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases: BTreeSet<Vec<String>> = terms
            .into_iter()
            .map(|term| tokenize(term.as_ref()))
            .filter(|tokens| !tokens.is_empty())
            .collect();

        Self {
            phrases: phrases.into_iter().collect(),
            phrase_boost,
            overlap_weight,
        }
    }

    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }

    /// min(phrase_boost × shared phrases + overlap_weight × |q ∩ c| / |q|, 1)
    pub fn boost(&self, query: &str, text: &str) -> f32 {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return 0.0;
        }
        let text_tokens = tokenize(text);

        let shared_phrases = self
            .phrases
            .iter()
            .filter(|phrase| contains_phrase(&query_tokens, phrase) && contains_phrase(&text_tokens, phrase))
            .count();

        let query_terms: BTreeSet<&str> = query_tokens.iter().map(String::as_str).collect();
        let text_terms: BTreeSet<&str> = text_tokens.iter().map(String::as_str).collect();
        let overlap = query_terms.intersection(&text_terms).count() as f32 / query_terms.len() as f32;

        (self.phrase_boost * shared_phrases as f32 + self.overlap_weight * overlap).clamp(0.0, 1.0)
    }
}

impl Default for KeywordBooster {
    fn default() -> Self {
        Self::new(DEFAULT_DOMAIN_TERMS, DEFAULT_PHRASE_BOOST, DEFAULT_OVERLAP_WEIGHT)
    }
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    tokens.windows(phrase.len()).any(|window| window == phrase)
}

#[async_trait]
impl ScoringModel for KeywordBooster {
    fn kind(&self) -> ModelKind {
        ModelKind::KeywordBooster
    }

    fn normalization(&self) -> Normalization {
        Normalization::Clamp
    }

    async fn score(&self, query: &str, text: &str) -> Result<f32, ModelError> {
        Ok(self.boost(query, text))
    }

    async fn score_batch(&self, query: &str, texts: &[String]) -> Result<Vec<f32>, ModelError> {
        Ok(texts.iter().map(|text| self.boost(query, text)).collect())
    }
}
