//! Embedding backends for the rule chunks: a local BGE-M3 model on candle and
//! a deterministic fake for tests. Both implement `liftrules_core::Embedder`.

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use tracing::info;

use liftrules_core::config::{expand_path, EmbeddingBackend, EmbeddingConfig};
use liftrules_core::traits::Embedder;

pub mod device;
mod fake;
mod model;
mod pool;
mod tokenize;

pub use fake::FakeEmbedder;
pub use model::EmbeddingModel;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

/// `APP_USE_FAKE_EMBEDDINGS=1` (or `true`) overrides the configured backend.
pub fn fake_embeddings_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn get_default_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    if fake_embeddings_forced() || config.backend == EmbeddingBackend::Fake {
        info!(dim = config.fake_dim, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(config.fake_dim)));
    }
    let model_dir = resolve_model_dir(config.model_dir.as_deref())?;
    Ok(Box::new(EmbeddingModel::load(&model_dir, config.max_len)?))
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = expand_path(&dir); if p.exists() { info!(dir = %p.display(), "using APP_MODEL_DIR"); return Ok(p); } }
    if let Some(dir) = configured { let p = expand_path(dir); if p.exists() { info!(dir = %p.display(), "using embedding.model_dir"); return Ok(p); } }
    for candidate in ["models/bge-m3", "../models/bge-m3"] {
        let p = Path::new(candidate); if p.exists() { info!(dir = %p.display(), "using model dir"); return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory (set APP_MODEL_DIR or embedding.model_dir)"))
}
