use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};

use liftrules_core::config::RetrievalConfig;
use liftrules_core::corpus::ChunkStore;
use liftrules_core::error::{Error, Result};
use liftrules_core::traits::Embedder;
use liftrules_core::types::{ChunkId, CorpusEntry};
use liftrules_text::LexicalIndex;
use liftrules_vector::EmbeddingIndex;

use crate::merge::{HybridMerger, SearchMode};

/// A chunk store and both indexes built from it. Immutable once published.
pub struct IndexGeneration {
    generation: u64,
    store: ChunkStore,
    lexical: LexicalIndex,
    semantic: EmbeddingIndex,
}

impl IndexGeneration {
    pub fn generation(&self) -> u64 { self.generation }
    pub fn store(&self) -> &ChunkStore { &self.store }
    pub fn lexical(&self) -> &LexicalIndex { &self.lexical }
    pub fn semantic(&self) -> &EmbeddingIndex { &self.semantic }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleHit {
    pub chunk_id: ChunkId,
    pub label: Option<String>,
    pub text: String,
    pub score: f32,
    pub lexical_score: Option<f32>,
    pub semantic_score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSearch {
    pub hits: Vec<RuleHit>,
    pub mode: SearchMode,
    pub degraded_reason: Option<String>,
    /// The generation that answered the query.
    pub generation: u64,
}

/// Entry point for rules retrieval.
///
/// Builds run under `build_gate`, one at a time. The published generation
/// sits behind a lock held only long enough to clone or replace the `Arc`, so
/// queries run against a snapshot and never wait on a rebuild.
pub struct RulesRetriever {
    merger: HybridMerger,
    current: RwLock<Option<Arc<IndexGeneration>>>,
    build_gate: Mutex<()>,
}

impl RulesRetriever {
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        Ok(Self { merger: HybridMerger::new(config)?, current: RwLock::new(None), build_gate: Mutex::new(()) })
    }

    /// Builds a fresh generation from `corpus` and publishes it, returning its
    /// number. On error the previously published generation stays in service.
    pub fn initialize<I, T>(&self, corpus: I, embedder: Arc<dyn Embedder>) -> Result<u64>
    where
        I: IntoIterator<Item = T>,
        T: Into<CorpusEntry>,
    {
        let _gate = self.build_gate.lock();
        let started = Instant::now();

        let store = ChunkStore::load(corpus)?;
        let lexical = LexicalIndex::build(store.chunks())?;
        let semantic = EmbeddingIndex::build(store.chunks(), embedder)?;

        let generation = self.generation().map_or(1, |g| g + 1);
        let chunks = store.len();
        let next = Arc::new(IndexGeneration { generation, store, lexical, semantic });
        *self.current.write() = Some(next);
        info!(generation, chunks, elapsed_ms = started.elapsed().as_millis() as u64, "index generation published");
        Ok(generation)
    }

    pub fn snapshot(&self) -> Option<Arc<IndexGeneration>> {
        self.current.read().clone()
    }

    pub fn is_ready(&self) -> bool { self.current.read().is_some() }

    pub fn generation(&self) -> Option<u64> {
        self.current.read().as_ref().map(|g| g.generation)
    }

    pub fn config(&self) -> &RetrievalConfig { self.merger.config() }

    pub fn search(&self, query: &str, k: usize) -> Result<RuleSearch> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be a positive integer".to_string()));
        }
        let snapshot = self.snapshot().ok_or(Error::NotInitialized)?;
        let ranked = self.merger.search(&snapshot.lexical, &snapshot.semantic, query, k)?;

        let degraded = ranked.is_degraded();
        let mut hits = Vec::with_capacity(ranked.hits.len());
        for scored in ranked.hits {
            let chunk = snapshot
                .store
                .get(scored.chunk_id)
                .ok_or_else(|| Error::InvalidArgument(format!("index returned unknown chunk {}", scored.chunk_id)))?;
            hits.push(RuleHit {
                chunk_id: chunk.id,
                label: chunk.label.clone(),
                text: chunk.text.clone(),
                score: scored.score,
                lexical_score: scored.lexical,
                semantic_score: scored.semantic,
            });
        }
        debug!(query, k, hits = hits.len(), degraded, "rules search");
        Ok(RuleSearch { hits, mode: ranked.mode, degraded_reason: ranked.degraded_reason, generation: snapshot.generation })
    }

    /// `search` with the configured `default_k`.
    pub fn search_default(&self, query: &str) -> Result<RuleSearch> {
        self.search(query, self.config().default_k)
    }
}
