use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use std::path::Path;
use tokenizers::{EncodeInput, Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Token ids, attention mask and token type ids, each `[B, T]`.
pub struct BatchTensors {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

/// Loads `tokenizer.json` and configures truncation to `max_len` and
/// padding to the longest sequence of each batch.
pub fn load_tokenizer(model_dir: &Path, max_len: usize) -> Result<Tokenizer> {
    let path = model_dir.join("tokenizer.json");
    let mut tokenizer = Tokenizer::from_file(&path).map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
    let padding = match tokenizer.get_padding() {
        Some(p) => PaddingParams { strategy: PaddingStrategy::BatchLongest, ..p.clone() },
        None => {
            let (pad_token, pad_id) = ["<pad>", "[PAD]"]
                .iter()
                .find_map(|t| tokenizer.token_to_id(t).map(|id| (t.to_string(), id)))
                .ok_or_else(|| anyhow!("tokenizer at {} has no pad token", path.display()))?;
            PaddingParams { strategy: PaddingStrategy::BatchLongest, pad_id, pad_token, ..PaddingParams::default() }
        }
    };
    tokenizer.with_padding(Some(padding));
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..TruncationParams::default() }))
        .map_err(|e| anyhow!("Invalid truncation settings: {}", e))?;
    Ok(tokenizer)
}

/// Tokenizes single sequences or `(query, passage)` pairs into padded tensors.
pub fn encode_on_device<'s, E>(tokenizer: &Tokenizer, inputs: Vec<E>, device: &Device) -> Result<BatchTensors>
where
    E: Into<EncodeInput<'s>> + Send,
{
    let encodings = tokenizer.encode_batch(inputs, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let input_ids = stack(&encodings, Encoding::get_ids, device)?;
    let attention_mask = stack(&encodings, Encoding::get_attention_mask, device)?;
    let token_type_ids = stack(&encodings, Encoding::get_type_ids, device)?;
    Ok(BatchTensors { input_ids, attention_mask, token_type_ids })
}

fn stack(encodings: &[Encoding], field: fn(&Encoding) -> &[u32], device: &Device) -> Result<Tensor> {
    let rows = encodings
        .iter()
        .map(|e| Tensor::new(field(e), device))
        .collect::<candle_core::Result<Vec<_>>>()?;
    Ok(Tensor::stack(&rows, 0)?)
}
