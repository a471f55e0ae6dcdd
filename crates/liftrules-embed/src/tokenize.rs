use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// XLM-RoBERTa `<pad>` token id.
const PAD_ID: u32 = 1;

/// Encodes `text` into `[1, max_len]` id and mask tensors, truncating or padding as needed.
pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let mut ids = enc.get_ids().to_vec();
    let mut mask = enc.get_attention_mask().to_vec();
    ids.resize(max_len, PAD_ID);
    mask.resize(max_len, 0);
    let input_ids = Tensor::from_vec(ids, (1, max_len), device)?;
    let attention_mask = Tensor::from_vec(mask, (1, max_len), device)?;
    Ok((input_ids, attention_mask))
}
