//! In-memory Okapi BM25 index
//!
//! Deterministic for a fixed set of documents, which makes it the lexical
//! backend of choice for small snapshots and for tests. Scores match the
//! usual formulation:
//!
//! `idf(t) * tf * (k1 + 1) / (tf + k1 * (1 - b + b * len / avg_len))`
//! with `idf(t) = ln(1 + (N - df + 0.5) / (df + 0.5))`.

use super::keyword_index::{KeywordIndexError, LexicalIndex};
use crate::corpus::ChunkId;
use crate::text::tokenize;
use ahash::{HashMap, HashMapExt};
use std::collections::BTreeSet;

pub const DEFAULT_K1: f32 = 1.2;
pub const DEFAULT_B: f32 = 0.75;

struct Posting {
    doc: usize,
    tf: u32,
}

pub struct Bm25Index {
    ids: Vec<ChunkId>,
    lengths: Vec<u32>,
    postings: HashMap<String, Vec<Posting>>,
    total_length: u64,
    k1: f32,
    b: f32,
}

impl Bm25Index {
    pub fn new(k1: f32, b: f32) -> Self {
        Self {
            ids: Vec::new(),
            lengths: Vec::new(),
            postings: HashMap::new(),
            total_length: 0,
            k1,
            b,
        }
    }

    pub fn insert(&mut self, id: &str, text: &str) {
        let doc = self.ids.len();
        let terms = tokenize(text);

        let mut counts: HashMap<String, u32> = HashMap::new();
        for term in &terms {
            *counts.entry(term.clone()).or_insert(0) += 1;
        }
        for (term, tf) in counts {
            self.postings.entry(term).or_default().push(Posting { doc, tf });
        }

        self.ids.push(id.to_string());
        self.lengths.push(terms.len() as u32);
        self.total_length += terms.len() as u64;
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn avg_length(&self) -> f32 {
        if self.ids.is_empty() {
            return 0.0;
        }
        self.total_length as f32 / self.ids.len() as f32
    }

    fn idf(&self, df: usize) -> f32 {
        let n = self.ids.len() as f32;
        let df = df as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(DEFAULT_K1, DEFAULT_B)
    }
}

impl LexicalIndex for Bm25Index {
    fn query(&self, terms: &[String], k: usize) -> Result<Vec<(ChunkId, f32)>, KeywordIndexError> {
        let unique: BTreeSet<&str> = terms.iter().map(String::as_str).collect();
        if unique.is_empty() || k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let avg_length = self.avg_length().max(1.0);
        let mut scores: HashMap<usize, f32> = HashMap::new();

        // BTreeSet order keeps the per-document float sums reproducible.
        for term in unique {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let idf = self.idf(postings.len());
            for posting in postings {
                let tf = posting.tf as f32;
                let norm = self.lengths[posting.doc] as f32 / avg_length;
                let tf_component =
                    tf * (self.k1 + 1.0) / (tf + self.k1 * (1.0 - self.b + self.b * norm));
                *scores.entry(posting.doc).or_insert(0.0) += idf * tf_component;
            }
        }

        let mut results: Vec<(ChunkId, f32)> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(doc, score)| (self.ids[doc].clone(), score))
            .collect();
        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results.truncate(k);

        Ok(results)
    }
}
