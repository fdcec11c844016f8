//! Result deduplication by chunk ID

use crate::corpus::ChunkId;
use std::collections::HashSet;

/// Deduplicate scored ids, keeping the first occurrence
///
/// Callers sort best-first beforehand, so the kept instance is the
/// highest-scored one.
pub fn deduplicate_chunks(scored: Vec<(ChunkId, f32)>) -> Vec<(ChunkId, f32)> {
    let mut seen: HashSet<ChunkId> = HashSet::new();

    scored
        .into_iter()
        .filter(|(id, _)| seen.insert(id.clone()))
        .collect()
}
