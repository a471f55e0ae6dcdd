use std::sync::Arc;

use crate::error::Result;
use crate::types::{SearchHit, SourceKind};

/// The embedding capability the engine consumes: text in, fixed-length
/// vector out, or a failure.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model behind this embedder (e.g. `fake:d384`).
    /// Cached vectors are keyed by it.
    fn embedder_id(&self) -> &str;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embedder_id(&self) -> &str { (**self).embedder_id() }
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> { (**self).embed(text) }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}

impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    fn embedder_id(&self) -> &str { (**self).embedder_id() }
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> { (**self).embed(text) }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}

/// Adapts a plain function or closure into an [`Embedder`].
pub struct FnEmbedder<F> {
    id: String,
    f: F,
}

impl<F> FnEmbedder<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<f32>> + Send + Sync,
{
    pub fn new(id: impl Into<String>, f: F) -> Self {
        Self { id: id.into(), f }
    }
}

impl<F> Embedder for FnEmbedder<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<f32>> + Send + Sync,
{
    fn embedder_id(&self) -> &str { &self.id }
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> { (self.f)(text) }
}

/// A read-only relevance index over the chunk store.
///
/// `query` returns at most `k` hits ordered by descending raw score with ties
/// broken by lower chunk id. It must never mutate the index.
pub trait RankedIndex: Send + Sync {
    fn source(&self) -> SourceKind;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    fn query(&self, text: &str, k: usize) -> Result<Vec<SearchHit>>;
}
