//! Embedding side of the engine: an exact in-memory cosine index plus an
//! optional Lance-backed cache of chunk embeddings.

pub mod cache;
pub mod index;
pub mod schema;

pub use cache::{content_hash, warm_cache, CacheEntry, CachedEmbedder, EmbeddingCache};
pub use index::{EmbeddingIndex, EMBED_BATCH_SIZE};
