use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hermes_core::chunker::Chunker;
use hermes_core::traits::{DocumentStore, Embedder, LexicalIndex};
use hermes_core::types::{chunk_id, Chunk, Document, DocumentId, NewDocument};
use hermes_core::{Error, Result};

/// Progress of one document through ingestion. Only `Indexed` is terminal
/// and visible to search; a failure at any stage leaves nothing behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Chunked,
    Embedded,
    Persisted,
    Indexed,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IngestStage::Received => "received",
            IngestStage::Chunked => "chunked",
            IngestStage::Embedded => "embedded",
            IngestStage::Persisted => "persisted",
            IngestStage::Indexed => "indexed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub chunk_count: usize,
    pub total_tokens: usize,
    pub elapsed_ms: u64,
}

/// Prefix carrying document context into the embedded text, e.g.
/// `[Document: Penal Code | Type: law | Chunk 3] ...`. Chunk numbers are 1-based.
pub fn enrich_chunk(text: &str, title: &str, chunk_index: usize, doc_type: Option<&str>) -> String {
    let mut parts = vec![format!("Document: {title}")];
    if let Some(t) = doc_type { parts.push(format!("Type: {t}")); }
    parts.push(format!("Chunk {}", chunk_index + 1));
    format!("[{}] {}", parts.join(" | "), text)
}

pub struct IngestionOrchestrator {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    lexical: Arc<dyn LexicalIndex>,
    embed_batch_size: usize,
}

impl IngestionOrchestrator {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        lexical: Arc<dyn LexicalIndex>,
        embed_batch_size: usize,
    ) -> Self {
        Self { chunker, embedder, store, lexical, embed_batch_size: embed_batch_size.max(1) }
    }

    pub async fn ingest(&self, input: NewDocument) -> Result<IngestReport> {
        let start = Instant::now();
        let title = input.title.trim();
        if title.is_empty() { return Err(Error::Validation("title must not be empty".into())); }
        if input.text.trim().is_empty() { return Err(Error::Validation("text must not be empty".into())); }

        let now = Utc::now();
        let mut document = Document {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            source: input.source.clone(),
            doc_type: input.doc_type.clone(),
            metadata: input.metadata.clone(),
            chunk_count: 0,
            created_at: now,
            updated_at: now,
        };
        let doc_id = document.id.clone();
        debug!(document_id = %doc_id, stage = %IngestStage::Received, chars = input.text.len());

        let mut chunks: Vec<Chunk> = self
            .chunker
            .chunks(&input.text)?
            .map(|seg| Chunk {
                id: chunk_id(&doc_id, seg.index),
                document_id: doc_id.clone(),
                chunk_index: seg.index,
                text: seg.text.to_string(),
                enriched_text: Some(enrich_chunk(seg.text, &document.title, seg.index, document.doc_type.as_deref())),
                token_count: seg.token_count,
                embedding: Vec::new(),
                created_at: now,
            })
            .collect();
        document.chunk_count = chunks.len();
        debug!(document_id = %doc_id, stage = %IngestStage::Chunked, chunks = chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.enriched_text.clone().unwrap_or_else(|| c.text.clone())).collect();
        let vectors = self.embed_all(texts).await?;
        for (chunk, vector) in chunks.iter_mut().zip(vectors) { chunk.embedding = vector; }
        debug!(document_id = %doc_id, stage = %IngestStage::Embedded, model = self.embedder.model_id());

        self.store.insert_document(&document, &chunks).await?;
        debug!(document_id = %doc_id, stage = %IngestStage::Persisted);

        if let Err(e) = self.lexical.index_chunks(&document, &chunks).await {
            warn!(document_id = %doc_id, error = %e, "lexical indexing failed; rolling back");
            self.compensate(&doc_id).await;
            return Err(e);
        }

        let total_tokens = chunks.iter().map(|c| c.token_count).sum();
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(document_id = %doc_id, stage = %IngestStage::Indexed, chunks = chunks.len(), tokens = total_tokens, elapsed_ms, "document ingested");
        Ok(IngestReport { document_id: doc_id, chunk_count: chunks.len(), total_tokens, elapsed_ms })
    }

    /// Removes the document row, then its chunks, then its lexical postings.
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        if !self.store.delete_document(document_id).await? {
            return Err(Error::NotFound(format!("document {document_id}")));
        }
        self.lexical.delete_document(document_id).await?;
        info!(document_id, "document deleted");
        Ok(())
    }

    async fn embed_all(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let dim = self.embedder.dim();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embed_batch_size) {
            let embedder = Arc::clone(&self.embedder);
            let batch = batch.to_vec();
            let expected = batch.len();
            let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&batch)).await.map_err(Error::model)??;
            if vectors.len() != expected {
                return Err(Error::model(format!("embedder returned {} vectors for {expected} texts", vectors.len())));
            }
            if let Some(v) = vectors.iter().find(|v| v.len() != dim) {
                return Err(Error::model(format!("embedder returned a {}-d vector, expected {dim}", v.len())));
            }
            out.extend(vectors);
        }
        Ok(out)
    }

    async fn compensate(&self, document_id: &str) {
        if let Err(e) = self.store.delete_document(document_id).await {
            warn!(document_id, error = %e, "rollback of stored document failed");
        }
        if let Err(e) = self.lexical.delete_document(document_id).await {
            warn!(document_id, error = %e, "rollback of lexical postings failed");
        }
    }
}
