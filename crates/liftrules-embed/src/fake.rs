use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use liftrules_core::traits::Embedder;

/// Hashed bag-of-words embedder: deterministic, L2-normalized, no model files.
///
/// Texts sharing words land close together, which is enough signal for tests
/// and offline development. Text without any word embeds to the zero vector.
pub struct FakeEmbedder { dim: usize, id: String }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1), id: format!("fake:d{}", dim.max(1)) } }

    pub fn dim(&self) -> usize { self.dim }
}

impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for (i, token) in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        Ok(v)
    }
}
