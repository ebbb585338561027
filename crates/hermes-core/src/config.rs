//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_RETRIEVAL__FETCH_K=30`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub cache: CacheSettings,
    pub models: ModelSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub data_dir: String,
    /// Relative to `data_dir` unless absolute.
    pub lancedb_dir: String,
    /// Relative to `data_dir` unless absolute.
    pub tantivy_dir: String,
    pub documents_table: String,
    pub chunks_table: String,
    pub writer_memory_bytes: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.hermes".to_string(),
            lancedb_dir: "lancedb".to_string(),
            tantivy_dir: "tantivy".to_string(),
            documents_table: "documents".to_string(),
            chunks_table: "chunks".to_string(),
            writer_memory_bytes: 50_000_000,
        }
    }
}

impl StorageSettings {
    pub fn data_dir(&self) -> PathBuf { expand_path(&self.data_dir) }
    pub fn lancedb_path(&self) -> PathBuf { resolve_with_base(&self.data_dir(), &self.lancedb_dir) }
    pub fn tantivy_path(&self) -> PathBuf { resolve_with_base(&self.data_dir(), &self.tantivy_dir) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_chunk_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { max_chunk_tokens: 512, overlap_tokens: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Width of each candidate list and of the reranked window.
    pub fetch_k: usize,
    pub default_top_k: usize,
    pub max_top_k: usize,
    /// RRF damping constant `c` in `1 / (c + rank)`.
    pub rrf_k: f64,
    pub dense_weight: f64,
    pub lexical_weight: f64,
    /// IVF partitions probed per dense query (ignored by flat search).
    pub nprobes: usize,
    pub refine_factor: Option<u32>,
    pub use_reranker: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            fetch_k: 20,
            default_top_k: 5,
            max_top_k: 100,
            rrf_k: 60.0,
            dense_weight: 1.0,
            lexical_weight: 1.0,
            nprobes: 20,
            refine_factor: None,
            use_reranker: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true, capacity: 1024, ttl_secs: 3600 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub embedding_dir: String,
    pub reranker_dir: String,
    pub embedding_dim: usize,
    pub embedding_max_len: usize,
    pub reranker_max_len: usize,
    pub embed_batch_size: usize,
    /// Replace both models with deterministic fakes (tests, offline dev).
    pub use_fake: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            embedding_dir: "models/bge-m3".to_string(),
            reranker_dir: "models/ms-marco-MiniLM-L-6-v2".to_string(),
            embedding_dim: 1024,
            embedding_max_len: 512,
            reranker_max_len: 512,
            embed_batch_size: 32,
            use_fake: false,
        }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Wrap an already-assembled figment (tests, embedding in other apps).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    /// Typed, validated settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.max_chunk_tokens == 0 {
            return Err(Error::InvalidConfig("chunking.max_chunk_tokens must be positive".into()));
        }
        if c.overlap_tokens >= c.max_chunk_tokens {
            return Err(Error::InvalidConfig(format!(
                "chunking.overlap_tokens ({}) must be smaller than max_chunk_tokens ({})",
                c.overlap_tokens, c.max_chunk_tokens
            )));
        }
        let r = &self.retrieval;
        if r.fetch_k == 0 || r.default_top_k == 0 || r.max_top_k == 0 {
            return Err(Error::InvalidConfig("retrieval widths must be positive".into()));
        }
        if r.default_top_k > r.max_top_k {
            return Err(Error::InvalidConfig("retrieval.default_top_k exceeds max_top_k".into()));
        }
        if !(r.rrf_k.is_finite() && r.rrf_k >= 0.0) {
            return Err(Error::InvalidConfig("retrieval.rrf_k must be a non-negative number".into()));
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(Error::InvalidConfig("cache.capacity must be positive when the cache is enabled".into()));
        }
        if self.models.embedding_dim == 0 || self.models.embed_batch_size == 0 {
            return Err(Error::InvalidConfig("models.embedding_dim and embed_batch_size must be positive".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
