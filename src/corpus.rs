//! Immutable corpus snapshot searched by the pipeline
//!
//! Chunks are produced by an ingestion process outside this crate. A `Corpus`
//! holds one fixed snapshot of them; the search path only ever reads it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Identifier of a chunk, unique within a corpus snapshot
pub type ChunkId = String;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Duplicate chunk id: {0}")]
    DuplicateChunkId(ChunkId),

    #[error("Invalid chunk on line {line}: {message}")]
    InvalidRecord { line: usize, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An indexed unit of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique id within the snapshot
    pub id: ChunkId,

    /// Text content
    pub text: String,

    /// Id of the document this chunk was cut from
    pub document_id: String,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    pub fn new(id: impl Into<ChunkId>, text: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            document_id: document_id.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Read access to chunk content by id
pub trait ChunkStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Arc<Chunk>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory corpus snapshot
#[derive(Debug, Default, Clone)]
pub struct Corpus {
    chunks: HashMap<ChunkId, Arc<Chunk>>,
    order: Vec<ChunkId>,
}

impl Corpus {
    /// Build a snapshot, rejecting duplicate ids
    pub fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Result<Self, CorpusError> {
        let mut corpus = Self::default();
        for chunk in chunks {
            if corpus.chunks.contains_key(&chunk.id) {
                return Err(CorpusError::DuplicateChunkId(chunk.id));
            }
            corpus.order.push(chunk.id.clone());
            corpus.chunks.insert(chunk.id.clone(), Arc::new(chunk));
        }
        Ok(corpus)
    }

    /// Load a snapshot from a JSON Lines file, one chunk per line
    pub fn load_jsonl(path: &Path) -> Result<Self, CorpusError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);

        let mut chunks = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk =
                serde_json::from_str(&line).map_err(|e| CorpusError::InvalidRecord {
                    line: idx + 1,
                    message: e.to_string(),
                })?;
            chunks.push(chunk);
        }

        tracing::info!("Loaded {} chunks from {}", chunks.len(), path.display());
        Self::from_chunks(chunks)
    }

    /// Chunks in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.order.iter().filter_map(|id| self.chunks.get(id))
    }
}

impl ChunkStore for Corpus {
    fn get(&self, id: &str) -> Option<Arc<Chunk>> {
        self.chunks.get(id).cloned()
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }
}
