use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use hermes_core::config::{expand_path, ModelSettings};
use hermes_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod rerank;
pub mod tokenize;

pub use pool::masked_mean_l2;
pub use rerank::{load_reranker, CrossEncoderReranker, LexicalOverlapReranker};

/// BGE-M3 dense embeddings: XLM-RoBERTa encoder, masked mean pooling and L2
/// normalisation.
pub struct BgeM3Embedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    batch_size: usize,
    model_id: String,
}

impl BgeM3Embedder {
    pub fn load(model_dir: &Path, max_len: usize, batch_size: usize) -> Result<Self> {
        let device = device::select_device();
        info!(dir = %model_dir.display(), "loading embedding model");
        let tokenizer = tokenize::load_tokenizer(model_dir, max_len)?;
        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).map_err(|e| anyhow!("read {}: {}", config_path.display(), e))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw)?;
        let dim = hidden_size(&raw)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        let model_id = format!("bge-m3/{dim}");
        info!(model = %model_id, "embedding model ready");
        Ok(Self { model, tokenizer, device, dim, batch_size: batch_size.max(1), model_id })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let batch = tokenize::encode_on_device(&self.tokenizer, texts.to_vec(), &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.attention_mask, &batch.token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        if let Some(v) = vectors.first() {
            if v.len() != self.dim { return Err(anyhow!("model produced {}-d vectors, expected {}", v.len(), self.dim)); }
        }
        debug!(batch = texts.len(), ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(vectors)
    }
}

impl Embedder for BgeM3Embedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> hermes_core::Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk).map_err(|e| hermes_core::Error::model(format!("{e:#}")))?);
        }
        Ok(out)
    }
}

/// Deterministic hash-based embedder for tests and offline development.
/// Texts sharing tokens land near each other, which is enough to exercise
/// the dense path without model weights.
pub struct FakeEmbedder {
    dim: usize,
    model_id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, model_id: format!("fake-hash/{dim}") } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } } else { v[0] = 1.0; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> hermes_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// `APP_USE_FAKE_EMBEDDINGS=1` forces the fake models regardless of settings.
pub fn fake_models_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Loads the configured embedder once at startup. Any failure is reported as
/// `ModelUnavailable`.
pub fn load_embedder(settings: &ModelSettings) -> hermes_core::Result<Arc<dyn Embedder>> {
    if settings.use_fake || fake_models_forced() {
        info!(dim = settings.embedding_dim, "using fake embedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.embedding_dim)));
    }
    let dir = resolve_model_dir(&settings.embedding_dir).map_err(hermes_core::Error::model)?;
    let embedder = BgeM3Embedder::load(&dir, settings.embedding_max_len, settings.embed_batch_size)
        .map_err(|e| hermes_core::Error::model(format!("{e:#}")))?;
    if embedder.dim() != settings.embedding_dim {
        return Err(hermes_core::Error::model(format!(
            "model at {} produces {}-d vectors but models.embedding_dim is {}",
            dir.display(),
            embedder.dim(),
            settings.embedding_dim
        )));
    }
    Ok(Arc::new(embedder))
}

/// Locates a model directory: the configured path as given, then relative to
/// the parent directory (running from inside a crate).
pub fn resolve_model_dir(configured: &str) -> Result<PathBuf> {
    let p = expand_path(configured);
    if p.exists() { return Ok(p); }
    if p.is_relative() {
        let parent = Path::new("..").join(&p);
        if parent.exists() { warn!(dir = %parent.display(), "using model dir relative to parent"); return Ok(parent); }
    }
    Err(anyhow!("Could not locate model directory {}", p.display()))
}

/// Weights from `model.safetensors` when present, `pytorch_model.bin` otherwise.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let tensors: HashMap<String, Tensor> = if safetensors.exists() {
        candle_core::safetensors::load(&safetensors, &Device::Cpu)?
    } else {
        let bin = model_dir.join("pytorch_model.bin");
        candle_core::pickle::read_all(&bin).map_err(|e| anyhow!("read {}: {}", bin.display(), e))?.into_iter().collect()
    };
    Ok(VarBuilder::from_tensors(tensors, DType::F32, device))
}

pub(crate) fn hidden_size(config_json: &str) -> Result<usize> {
    let value: serde_json::Value = serde_json::from_str(config_json)?;
    value
        .get("hidden_size")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| anyhow!("config.json has no hidden_size"))
}
