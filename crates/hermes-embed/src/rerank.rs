//! Query/passage relevance scoring.
//!
//! `CrossEncoderReranker` runs an ms-marco style BERT cross-encoder: the pair
//! is encoded jointly, the `[CLS]` state goes through the pooler and a
//! single-logit classifier head. `LexicalOverlapReranker` is a deterministic
//! stand-in that needs no weights.

use anyhow::{anyhow, Result};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{linear, Linear, Module};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use hermes_core::config::ModelSettings;
use hermes_core::traits::Reranker;

use crate::{device, fake_models_forced, hidden_size, load_weights, resolve_model_dir, tokenize};

pub struct CrossEncoderReranker {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
}

impl CrossEncoderReranker {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        info!(dir = %model_dir.display(), "loading reranker model");
        let tokenizer = tokenize::load_tokenizer(model_dir, max_len)?;
        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).map_err(|e| anyhow!("read {}: {}", config_path.display(), e))?;
        let config: BertConfig = serde_json::from_str(&raw)?;
        let hidden = hidden_size(&raw)?;
        let vb = load_weights(model_dir, &device)?;
        let bert = BertModel::load(vb.clone(), &config)?;
        let pooler = linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
        let classifier = linear(hidden, 1, vb.pp("classifier"))?;
        let model_id = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cross-encoder".to_string());
        Ok(Self { bert, pooler, classifier, tokenizer, device, model_id })
    }

    fn logits(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>> {
        let start = Instant::now();
        let pairs: Vec<(String, String)> = texts.iter().map(|t| (query.to_string(), t.to_string())).collect();
        let batch = tokenize::encode_on_device(&self.tokenizer, pairs, &self.device)?;
        let hidden = self.bert.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let cls: Tensor = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?.squeeze(1)?;
        let scores: Vec<f32> = logits.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec1()?;
        debug!(pairs = texts.len(), ms = start.elapsed().as_millis() as u64, "reranked");
        Ok(scores)
    }
}

impl Reranker for CrossEncoderReranker {
    fn model_id(&self) -> &str { &self.model_id }

    fn score(&self, query: &str, texts: &[&str]) -> hermes_core::Result<Vec<f32>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        self.logits(query, texts).map_err(|e| hermes_core::Error::model(format!("{e:#}")))
    }
}

/// Scores a passage by how many distinct query terms it contains, with term
/// density as a fractional tie-breaker.
#[derive(Debug, Default, Clone)]
pub struct LexicalOverlapReranker;

impl LexicalOverlapReranker {
    fn terms(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(|t| t.to_lowercase()).collect()
    }
}

impl Reranker for LexicalOverlapReranker {
    fn model_id(&self) -> &str { "lexical-overlap" }

    fn score(&self, query: &str, texts: &[&str]) -> hermes_core::Result<Vec<f32>> {
        let query_terms: HashSet<String> = Self::terms(query).into_iter().collect();
        Ok(texts
            .iter()
            .map(|t| {
                let tokens = Self::terms(t);
                let distinct: HashSet<&String> = tokens.iter().filter(|tok| query_terms.contains(*tok)).collect();
                let hits = tokens.iter().filter(|tok| query_terms.contains(*tok)).count();
                distinct.len() as f32 + hits as f32 / (tokens.len() as f32 + 1.0)
            })
            .collect())
    }
}

pub fn load_reranker(settings: &ModelSettings) -> hermes_core::Result<Arc<dyn Reranker>> {
    if settings.use_fake || fake_models_forced() {
        info!("using lexical-overlap reranker");
        return Ok(Arc::new(LexicalOverlapReranker));
    }
    let dir = resolve_model_dir(&settings.reranker_dir).map_err(hermes_core::Error::model)?;
    let reranker = CrossEncoderReranker::load(&dir, settings.reranker_max_len).map_err(|e| hermes_core::Error::model(format!("{e:#}")))?;
    Ok(Arc::new(reranker))
}
