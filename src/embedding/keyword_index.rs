/// Tantivy keyword index for full-text search
use crate::corpus::ChunkId;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),
}

/// Inverted lexical index scored with BM25
pub trait LexicalIndex: Send + Sync {
    /// Up to `k` chunks matching any of `terms`, as (chunk id, score), best first
    fn query(&self, terms: &[String], k: usize) -> Result<Vec<(ChunkId, f32)>, KeywordIndexError>;
}

/// Tantivy keyword index wrapper
///
/// Provides full-text search with BM25 ranking. Documents are keyed by
/// chunk id; query terms are OR-ed together.
pub struct KeywordIndex {
    reader: IndexReader,
    writer: IndexWriter,
    id_field: Field,
    text_field: Field,
}

impl KeywordIndex {
    /// Open the index at `index_path`, creating it if absent
    pub fn new(index_path: PathBuf) -> Result<Self, KeywordIndexError> {
        let index = if index_path.join("meta.json").exists() {
            Index::open_in_dir(&index_path)
                .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?
        } else {
            std::fs::create_dir_all(&index_path)?;
            Index::create_in_dir(&index_path, Self::schema())
                .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?
        };
        Self::from_index(index)
    }

    /// Create a throwaway in-memory index
    pub fn in_memory() -> Result<Self, KeywordIndexError> {
        Self::from_index(Index::create_in_ram(Self::schema()))
    }

    fn schema() -> Schema {
        let mut schema_builder = Schema::builder();
        schema_builder.add_text_field("chunk_id", STRING | STORED);
        schema_builder.add_text_field("text", TEXT);
        schema_builder.build()
    }

    fn from_index(index: Index) -> Result<Self, KeywordIndexError> {
        let schema = index.schema();

        let id_field = schema.get_field("chunk_id").map_err(|_| {
            KeywordIndexError::InitializationError("Missing 'chunk_id' field in schema".to_string())
        })?;
        let text_field = schema.get_field("text").map_err(|_| {
            KeywordIndexError::InitializationError("Missing 'text' field in schema".to_string())
        })?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            reader,
            writer,
            id_field,
            text_field,
        })
    }

    /// Add a chunk to the index; visible to queries after `commit`
    pub fn insert(&mut self, id: &str, text: &str) -> Result<(), KeywordIndexError> {
        self.writer
            .add_document(doc!(
                self.id_field => id,
                self.text_field => text,
            ))
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;
        Ok(())
    }

    /// Commit all pending changes and refresh the reader
    pub fn commit(&mut self) -> Result<(), KeywordIndexError> {
        self.writer
            .commit()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;
        self.reader
            .reload()
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;
        Ok(())
    }

    /// Drop every document, committed or pending; visible after `commit`
    pub fn clear(&mut self) -> Result<(), KeywordIndexError> {
        self.writer
            .delete_all_documents()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;
        Ok(())
    }

    /// Get the number of documents in the index
    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LexicalIndex for KeywordIndex {
    fn query(&self, terms: &[String], k: usize) -> Result<Vec<(ChunkId, f32)>, KeywordIndexError> {
        let unique: BTreeSet<&str> = terms.iter().map(String::as_str).collect();
        if unique.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let clauses: Vec<(Occur, Box<dyn Query>)> = unique
            .into_iter()
            .map(|term| {
                let query: Box<dyn Query> = Box::new(TermQuery::new(
                    Term::from_field_text(self.text_field, term),
                    IndexRecordOption::WithFreqs,
                ));
                (Occur::Should, query)
            })
            .collect();
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(k))
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved_doc: TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

            let id = retrieved_doc
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    KeywordIndexError::SearchError("Missing or invalid chunk_id field".to_string())
                })?;

            results.push((id.to_string(), score));
        }

        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(results)
    }
}
