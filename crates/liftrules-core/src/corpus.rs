use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId, CorpusEntry};

/// The immutable, ordered sequence of rule chunks a generation is built from.
///
/// Cloning is cheap; clones share the same chunks.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    chunks: Arc<[Chunk]>,
}

impl ChunkStore {
    /// Accepts the whole corpus or nothing. Chunk ids follow input order.
    pub fn load<I, T>(corpus: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<CorpusEntry>,
    {
        let mut seen_labels = HashSet::new();
        let mut chunks = Vec::new();
        for (id, entry) in corpus.into_iter().map(Into::into).enumerate() {
            if let Some(label) = &entry.id {
                if !seen_labels.insert(label.clone()) {
                    return Err(Error::InvalidArgument(format!("duplicate chunk id '{label}' at position {id}")));
                }
            }
            chunks.push(Chunk { id, label: entry.id, text: entry.text });
        }
        if chunks.is_empty() {
            return Err(Error::CorpusEmpty);
        }
        Ok(Self { chunks: chunks.into() })
    }

    /// Reads the ingestion output: a JSON array of `{ "text": ..., "id"?: ... }`.
    pub fn load_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Corpus(format!("{}: {e}", path.display())))?;
        Self::load_json_str(&raw).map_err(|e| match e {
            Error::Corpus(msg) => Error::Corpus(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn load_json_str(raw: &str) -> Result<Self> {
        let entries: Vec<CorpusEntry> = serde_json::from_str(raw).map_err(|e| Error::Corpus(e.to_string()))?;
        Self::load(entries)
    }

    pub fn len(&self) -> usize { self.chunks.len() }

    /// Always false for a successfully loaded store.
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn get(&self, id: ChunkId) -> Option<&Chunk> { self.chunks.get(id) }

    pub fn chunks(&self) -> &[Chunk] { &self.chunks }

    pub fn iter(&self) -> std::slice::Iter<'_, Chunk> { self.chunks.iter() }
}

impl<'a> IntoIterator for &'a ChunkStore {
    type Item = &'a Chunk;
    type IntoIter = std::slice::Iter<'a, Chunk>;

    fn into_iter(self) -> Self::IntoIter { self.iter() }
}
