//! hermes-hybrid
//!
//! Ingestion and hybrid retrieval over the dense (LanceDB) and lexical
//! (Tantivy) indexes: rank fusion, cross-encoder reranking, a result cache,
//! and the `RagService` facade that ties them together.
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use hermes_core::chunker::Chunker;
use hermes_core::config::Settings;
use hermes_core::traits::{DenseIndex, DocumentStore, Embedder, LexicalIndex, Reranker};
use hermes_core::types::{Document, DocumentId, DocumentPage, Filters, NewDocument, RankedResult, RerankCandidate, Stats};
use hermes_core::{Error, Result};

pub mod cache;
pub mod fusion;
pub mod ingest;
pub mod retrieve;

pub use cache::{CachedSearch, Fingerprint, LruResultCache, ResultCache};
pub use ingest::{IngestReport, IngestStage, IngestionOrchestrator};
pub use retrieve::{RetrievalOrchestrator, SearchRequest, SearchResponse};

/// Models and stores the service is assembled from. Tests swap in fakes.
pub struct Components {
    pub embedder: Arc<dyn Embedder>,
    pub reranker: Arc<dyn Reranker>,
    pub store: Arc<dyn DocumentStore>,
    pub dense: Arc<dyn DenseIndex>,
    pub lexical: Arc<dyn LexicalIndex>,
}

pub struct RagService {
    ingestion: IngestionOrchestrator,
    retrieval: RetrievalOrchestrator,
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    cache: Option<Arc<LruResultCache>>,
    settings: Settings,
}

impl RagService {
    pub fn new(settings: Settings, components: Components) -> Result<Self> {
        settings.validate()?;
        let Components { embedder, reranker, store, dense, lexical } = components;
        let chunker = Chunker::new(settings.chunking)?;
        let cache = settings.cache.enabled.then(|| Arc::new(LruResultCache::new(settings.cache.capacity)));
        let ingestion = IngestionOrchestrator::new(
            chunker,
            Arc::clone(&embedder),
            Arc::clone(&store),
            Arc::clone(&lexical),
            settings.models.embed_batch_size,
        );
        let retrieval = RetrievalOrchestrator::new(
            Arc::clone(&embedder),
            dense,
            lexical,
            Arc::clone(&store),
            Arc::clone(&reranker),
            cache.clone().map(|c| c as Arc<dyn ResultCache>),
            settings.retrieval.clone(),
            Duration::from_secs(settings.cache.ttl_secs),
        );
        Ok(Self { ingestion, retrieval, store, embedder, reranker, cache, settings })
    }

    /// Loads both models and opens the on-disk stores under `storage.data_dir`.
    pub async fn open(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = hermes_embed::load_embedder(&settings.models)?;
        let reranker = hermes_embed::load_reranker(&settings.models)?;
        let lance_path = settings.storage.lancedb_path();
        let lance = hermes_vector::LanceStore::open(
            &lance_path.to_string_lossy(),
            hermes_vector::StoreOptions::from_settings(settings),
        )
        .await
        .map_err(|e| Error::store(format!("{e:#}")))?;
        let tantivy_path = settings.storage.tantivy_path();
        let lexical = hermes_text::TantivyLexicalIndex::open(&tantivy_path, settings.storage.writer_memory_bytes)
            .map_err(|e| Error::lexical(format!("{e:#}")))?;
        info!(lancedb = %lance_path.display(), tantivy = %tantivy_path.display(), "stores opened");
        let lance = Arc::new(lance);
        Self::new(
            settings.clone(),
            Components {
                embedder,
                reranker,
                store: lance.clone(),
                dense: lance,
                lexical: Arc::new(lexical),
            },
        )
    }

    pub fn settings(&self) -> &Settings { &self.settings }
    pub fn cache(&self) -> Option<&LruResultCache> { self.cache.as_deref() }

    pub async fn ingest(&self, document: NewDocument) -> Result<DocumentId> {
        Ok(self.ingestion.ingest(document).await?.document_id)
    }

    pub async fn ingest_document(&self, document: NewDocument) -> Result<IngestReport> {
        self.ingestion.ingest(document).await
    }

    pub async fn search(&self, query: &str, top_k: usize, filters: Filters) -> Result<Vec<RankedResult>> {
        let request = SearchRequest::new(query).top_k(top_k).filters(filters);
        Ok(self.retrieval.search(&request).await?.results)
    }

    pub async fn search_with(&self, request: SearchRequest) -> Result<SearchResponse> {
        self.retrieval.search(&request).await
    }

    pub async fn get_document(&self, id: &str) -> Result<Document> {
        self.store.get_document(id).await?.ok_or_else(|| Error::NotFound(format!("document {id}")))
    }

    pub async fn list_documents(&self, offset: usize, limit: usize, filters: Filters) -> Result<DocumentPage> {
        if limit == 0 { return Err(Error::Validation("limit must be positive".into())); }
        self.store.list_documents(offset, limit, &filters).await
    }

    pub async fn delete_document(&self, id: &str) -> Result<()> {
        self.ingestion.delete(id).await
    }

    pub async fn get_stats(&self) -> Result<Stats> {
        self.store.stats().await
    }

    /// Newest document ingested from `source`, for callers that want to
    /// skip re-ingesting the same file.
    pub async fn find_by_source(&self, source: &str) -> Result<Option<Document>> {
        self.store.find_by_source(source).await
    }

    pub fn clear_cache(&self) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.clear(),
            None => Ok(()),
        }
    }

    /// Runs one embedding and one rerank so first-query latency does not
    /// include lazy kernel setup.
    pub async fn warmup(&self) -> Result<Duration> {
        let start = std::time::Instant::now();
        let embedder = Arc::clone(&self.embedder);
        let reranker = Arc::clone(&self.reranker);
        tokio::task::spawn_blocking(move || -> Result<()> {
            embedder.embed("warmup")?;
            let candidate = RerankCandidate { chunk_id: "warmup".into(), text: "warmup passage".into() };
            reranker.rerank("warmup", &[candidate], 1)?;
            Ok(())
        })
        .await
        .map_err(Error::model)??;
        let elapsed = start.elapsed();
        info!(ms = elapsed.as_millis() as u64, embedder = self.embedder.model_id(), reranker = self.reranker.model_id(), "models warm");
        Ok(elapsed)
    }
}
