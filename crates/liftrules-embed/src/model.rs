use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use liftrules_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_on_device;

const SLOW_EMBED_MS: u128 = 100;

/// Local BGE-M3 (XLM-RoBERTa) sentence embedder.
pub struct EmbeddingModel { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, max_len: usize, id: String }

impl EmbeddingModel {
    /// Loads `tokenizer.json`, `config.json` and `pytorch_model.bin` from `model_dir`.
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading BGE-M3 model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw_config).with_context(|| format!("parsing {}", config_path.display()))?;
        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path).with_context(|| format!("reading {}", weights_path.display()))?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "bge-m3".to_string());
        let id = format!("local:{name}:len{max_len}");
        info!(embedder = %id, "embedding model loaded");
        Ok(Self { model, tokenizer, device, max_len, id })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden_states = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden_states, &attention_mask)?;
        let embedding = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        let elapsed = start.elapsed().as_millis();
        if elapsed > SLOW_EMBED_MS { warn!(elapsed_ms = elapsed as u64, "slow embedding"); } else { debug!(elapsed_ms = elapsed as u64, "embedded text"); }
        Ok(embedding)
    }
}

impl Embedder for EmbeddingModel {
    fn embedder_id(&self) -> &str { &self.id }
    fn embed(&self, text: &str) -> Result<Vec<f32>> { self.embed_text(text) }
}
