use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use liftrules_core::error::{Error, Result};
use liftrules_core::traits::{Embedder, RankedIndex};
use liftrules_core::types::{sort_hits, Chunk, ChunkId, SearchHit, SourceKind};

/// Chunks are embedded in batches of this size during a build.
pub const EMBED_BATCH_SIZE: usize = 32;

/// Flat cosine-similarity index: one unit-normalized vector per chunk, scanned
/// in full for every query. Rulebooks are small enough that exact search beats
/// any approximate layout.
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    vectors: Vec<Vec<f32>>,
    dim: usize,
}

impl EmbeddingIndex {
    /// Embeds every chunk once. Any failure aborts the build; nothing partial
    /// is ever returned.
    pub fn build(chunks: &[Chunk], embedder: Arc<dyn Embedder>) -> Result<Self> {
        let started = Instant::now();
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed_batch(&texts).map_err(Error::embedding_unavailable)?;
            if embedded.len() != batch.len() {
                return Err(Error::EmbeddingUnavailable(format!(
                    "embedder returned {} vectors for {} chunks",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }

        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        for (id, vector) in vectors.iter_mut().enumerate() {
            check_vector(vector, dim).map_err(|reason| Error::EmbeddingUnavailable(format!("chunk {id}: {reason}")))?;
            normalize(vector);
        }
        info!(
            chunks = chunks.len(),
            dim,
            embedder = embedder.embedder_id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "embedding index built"
        );
        Ok(Self { embedder, vectors, dim })
    }

    pub fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = self.embedder.embed(text).map_err(Error::embedding_unavailable)?;
        check_vector(&query, self.dim).map_err(|reason| Error::EmbeddingUnavailable(format!("query: {reason}")))?;
        normalize(&mut query);

        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, v)| SearchHit { id, score: dot(&query, v), source: SourceKind::Semantic })
            .collect();
        sort_hits(&mut hits);
        hits.truncate(k);
        debug!(hits = hits.len(), "semantic query");
        Ok(hits)
    }

    /// The cached, unit-normalized embedding of a chunk.
    pub fn embedding(&self, id: ChunkId) -> Option<&[f32]> {
        self.vectors.get(id).map(Vec::as_slice)
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn embedder_id(&self) -> &str { self.embedder.embedder_id() }

    pub fn len(&self) -> usize { self.vectors.len() }

    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }
}

impl RankedIndex for EmbeddingIndex {
    fn source(&self) -> SourceKind { SourceKind::Semantic }
    fn len(&self) -> usize { self.vectors.len() }
    fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>> { Self::query(self, text, k) }
}

fn check_vector(vector: &[f32], dim: usize) -> std::result::Result<(), String> {
    if vector.is_empty() {
        return Err("empty embedding".to_string());
    }
    if vector.len() != dim {
        return Err(format!("embedding has dimension {}, expected {dim}", vector.len()));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err("embedding contains non-finite values".to_string());
    }
    Ok(())
}

/// Scales to unit length; the zero vector stays zero and scores 0 against everything.
fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() { *x /= norm; }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>().clamp(-1.0, 1.0)
}
