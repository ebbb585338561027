use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use hermes_core::config::RetrievalSettings;
use hermes_core::traits::{DenseIndex, DocumentStore, Embedder, LexicalIndex, Reranker};
use hermes_core::types::{
    Candidate, DocumentSummary, Filters, FusedResult, RankedResult, RerankCandidate, SourceKind, StoredChunk,
};
use hermes_core::{Error, Result};

use crate::cache::{CachedSearch, Fingerprint, ResultCache};
use crate::fusion::{fuse, FusionSettings};

/// One query. Unset fields fall back to the retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: Option<usize>,
    #[serde(default)]
    pub filters: Filters,
    /// `false` skips both the cache lookup and the cache write.
    pub use_cache: bool,
    pub use_reranker: Option<bool>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), top_k: None, filters: Filters::default(), use_cache: true, use_reranker: None }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn reranker(mut self, enabled: bool) -> Self {
        self.use_reranker = Some(enabled);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
    /// Distinct chunks produced by fusion before hydration and reranking.
    pub total_candidates: usize,
    pub elapsed_ms: u64,
    pub cached: bool,
    /// The search path that failed, when results come from the other one only.
    pub degraded: Option<SourceKind>,
}

impl SearchResponse {
    fn empty(start: Instant, degraded: Option<SourceKind>) -> Self {
        Self { results: Vec::new(), total_candidates: 0, elapsed_ms: start.elapsed().as_millis() as u64, cached: false, degraded }
    }
}

pub struct RetrievalOrchestrator {
    embedder: Arc<dyn Embedder>,
    dense: Arc<dyn DenseIndex>,
    lexical: Arc<dyn LexicalIndex>,
    store: Arc<dyn DocumentStore>,
    reranker: Arc<dyn Reranker>,
    cache: Option<Arc<dyn ResultCache>>,
    settings: RetrievalSettings,
    cache_ttl: Duration,
}

struct Hydrated {
    fused: FusedResult,
    chunk: StoredChunk,
    document: DocumentSummary,
}

impl RetrievalOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        dense: Arc<dyn DenseIndex>,
        lexical: Arc<dyn LexicalIndex>,
        store: Arc<dyn DocumentStore>,
        reranker: Arc<dyn Reranker>,
        cache: Option<Arc<dyn ResultCache>>,
        settings: RetrievalSettings,
        cache_ttl: Duration,
    ) -> Self {
        Self { embedder, dense, lexical, store, reranker, cache, settings, cache_ttl }
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        let query = request.query.trim();
        if query.is_empty() { return Err(Error::Validation("query must not be empty".into())); }
        let top_k = request.top_k.unwrap_or(self.settings.default_top_k);
        if top_k == 0 || top_k > self.settings.max_top_k {
            return Err(Error::Validation(format!("top_k must be between 1 and {}", self.settings.max_top_k)));
        }
        let use_reranker = request.use_reranker.unwrap_or(self.settings.use_reranker);
        let fingerprint = Fingerprint::new(query, top_k, &request.filters, use_reranker);

        let cache = if request.use_cache { self.cache.as_ref() } else { None };
        if let Some(cache) = cache {
            match cache.get(&fingerprint) {
                Ok(Some(CachedSearch { results, total_candidates })) => {
                    debug!(key = fingerprint.as_str(), "cache hit");
                    return Ok(SearchResponse { results, total_candidates, elapsed_ms: start.elapsed().as_millis() as u64, cached: true, degraded: None });
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "cache lookup failed"),
            }
        }

        let width = self.settings.fetch_k.max(top_k);
        let (dense, lexical) = tokio::join!(
            self.dense_candidates(query, width, &request.filters),
            self.lexical.search_lexical(query, width, &request.filters),
        );
        let (dense, lexical, degraded) = match (dense, lexical) {
            (Ok(d), Ok(l)) => (d, l, None),
            (Err(e), Ok(l)) => {
                warn!(error = %e, "dense search failed; using lexical results only");
                (Vec::new(), l, Some(SourceKind::Dense))
            }
            (Ok(d), Err(e)) => {
                warn!(error = %e, "lexical search failed; using dense results only");
                (d, Vec::new(), Some(SourceKind::Lexical))
            }
            (Err(de), Err(le)) => {
                return Err(Error::StoreUnavailable(format!("both search paths failed: dense: {de}; lexical: {le}")));
            }
        };
        debug!(dense = dense.len(), lexical = lexical.len(), "candidates");
        if dense.is_empty() && lexical.is_empty() {
            return Ok(SearchResponse::empty(start, degraded));
        }

        let fused = fuse(&dense, &lexical, width, &FusionSettings::from(&self.settings));
        let total_candidates = fused.len();
        let hydrated = self.hydrate(fused).await?;
        let (results, rerank_fell_back) = self.rank(query, hydrated, top_k, use_reranker).await;

        // partial answers are served once, never memoized
        let complete = degraded.is_none() && !rerank_fell_back;
        if let Some(cache) = cache {
            if complete && !results.is_empty() {
                let entry = CachedSearch { results: results.clone(), total_candidates };
                if let Err(e) = cache.put(&fingerprint, &entry, self.cache_ttl) {
                    warn!(error = %e, "cache write failed");
                }
            }
        }
        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(results = results.len(), total_candidates, elapsed_ms, "search done");
        Ok(SearchResponse { results, total_candidates, elapsed_ms, cached: false, degraded })
    }

    async fn dense_candidates(&self, query: &str, k: usize, filters: &Filters) -> Result<Vec<Candidate>> {
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();
        let vector = tokio::task::spawn_blocking(move || embedder.embed(&text)).await.map_err(Error::model)??;
        self.dense.search_dense(&vector, k, filters).await
    }

    /// Attaches chunk text and document fields; candidates whose chunk or
    /// document no longer exists (concurrent delete) are dropped.
    async fn hydrate(&self, fused: Vec<FusedResult>) -> Result<Vec<Hydrated>> {
        let ids: Vec<String> = fused.iter().map(|f| f.chunk_id.clone()).collect();
        let mut chunks: HashMap<String, StoredChunk> = self.store.fetch_chunks(&ids).await?.into_iter().map(|c| (c.id.clone(), c)).collect();
        let mut doc_ids: Vec<String> = chunks.values().map(|c| c.document_id.clone()).collect();
        doc_ids.sort();
        doc_ids.dedup();
        let documents: HashMap<String, DocumentSummary> =
            self.store.get_documents(&doc_ids).await?.iter().map(|d| (d.id.clone(), DocumentSummary::from(d))).collect();

        let mut out = Vec::with_capacity(fused.len());
        for f in fused {
            let Some(chunk) = chunks.remove(&f.chunk_id) else { continue };
            let Some(document) = documents.get(&chunk.document_id).cloned() else { continue };
            out.push(Hydrated { fused: f, chunk, document });
        }
        if out.len() < ids.len() { debug!(dropped = ids.len() - out.len(), "candidates without stored chunk or document"); }
        Ok(out)
    }

    /// Reranks against the raw query, or keeps fused order when reranking is
    /// off or the model fails. The flag is set only in the failure case.
    async fn rank(&self, query: &str, mut hydrated: Vec<Hydrated>, top_k: usize, use_reranker: bool) -> (Vec<RankedResult>, bool) {
        let mut fell_back = false;
        if use_reranker && !hydrated.is_empty() {
            let candidates: Vec<RerankCandidate> = hydrated.iter().map(|h| RerankCandidate { chunk_id: h.chunk.id.clone(), text: h.chunk.text.clone() }).collect();
            let reranker = Arc::clone(&self.reranker);
            let q = query.to_string();
            let scored = tokio::task::spawn_blocking(move || reranker.rerank(&q, &candidates, top_k)).await.map_err(Error::model);
            match scored.and_then(|r| r) {
                Ok(scores) => {
                    let mut by_id: HashMap<String, Hydrated> = hydrated.drain(..).map(|h| (h.chunk.id.clone(), h)).collect();
                    let ranked = scores
                        .into_iter()
                        .filter_map(|s| by_id.remove(&s.chunk_id).map(|h| to_ranked(h, Some(s.score))))
                        .collect();
                    return (ranked, false);
                }
                Err(e) => {
                    warn!(error = %e, "reranking failed; keeping fused order");
                    fell_back = true;
                }
            }
        }
        hydrated.truncate(top_k);
        (hydrated.into_iter().map(|h| to_ranked(h, None)).collect(), fell_back)
    }
}

fn to_ranked(h: Hydrated, rerank_score: Option<f32>) -> RankedResult {
    RankedResult {
        chunk_id: h.chunk.id,
        chunk_index: h.chunk.chunk_index,
        text: h.chunk.text,
        document: h.document,
        rerank_score,
        fused_score: h.fused.fused_score,
        sources: h.fused.sources(),
    }
}
