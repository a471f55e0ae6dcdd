//! Shared building blocks for the rulebook retrieval engine: chunk types,
//! the chunk store, the embedder capability, errors and configuration.

pub mod config;
pub mod corpus;
pub mod error;
pub mod traits;
pub mod types;

pub use corpus::ChunkStore;
pub use error::{Error, Result};
pub use traits::{Embedder, FnEmbedder, RankedIndex};
pub use types::{Chunk, ChunkId, CorpusEntry, SearchHit, SourceKind};
