use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    Candidate, Chunk, Document, DocumentId, DocumentPage, Filters, RerankCandidate, RerankScore, Stats,
    StoredChunk,
};

/// Maps text to fixed-dimension dense vectors. Synchronous and CPU-bound;
/// callers on an async runtime run it on a blocking thread.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model and its dimension.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Vectors come back in input order. Batching never changes the result.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| crate::Error::model("embedder returned no vector"))
    }
}

/// Pairwise query/document relevance model.
pub trait Reranker: Send + Sync {
    fn model_id(&self) -> &str;

    /// One score per text, in input order, from a single model invocation.
    fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>>;

    /// Scores all candidates in one batch and returns the best `top_n`,
    /// highest score first. Equal scores keep their input order.
    fn rerank(&self, query: &str, candidates: &[RerankCandidate], top_n: usize) -> Result<Vec<RerankScore>> {
        if candidates.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }
        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let scores = self.score(query, &texts)?;
        if scores.len() != candidates.len() {
            return Err(crate::Error::model(format!(
                "reranker returned {} scores for {} candidates",
                scores.len(),
                candidates.len()
            )));
        }
        let mut ranked: Vec<RerankScore> = candidates
            .iter()
            .zip(scores)
            .map(|(c, score)| RerankScore { chunk_id: c.chunk_id.clone(), score })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(top_n);
        Ok(ranked)
    }
}

/// Approximate nearest-neighbour search over chunk embeddings.
#[async_trait]
pub trait DenseIndex: Send + Sync {
    /// Ascending cosine distance, at most `k` hits. An empty index yields an
    /// empty list, never an error.
    async fn search_dense(&self, query: &[f32], k: usize, filters: &Filters) -> Result<Vec<Candidate>>;
}

/// Token-level relevance search over chunk text.
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    async fn index_chunks(&self, document: &Document, chunks: &[Chunk]) -> Result<()>;
    async fn delete_document(&self, document_id: &str) -> Result<()>;
    /// Descending relevance, at most `k` hits. Any user text is accepted.
    async fn search_lexical(&self, query: &str, k: usize, filters: &Filters) -> Result<Vec<Candidate>>;
}

/// Transactional CRUD over documents and chunks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes the document and all of its chunks so that readers see either
    /// all of them or none.
    async fn insert_document(&self, document: &Document, chunks: &[Chunk]) -> Result<()>;
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;
    async fn get_documents(&self, ids: &[DocumentId]) -> Result<Vec<Document>>;
    async fn find_by_source(&self, source: &str) -> Result<Option<Document>>;
    async fn list_documents(&self, offset: usize, limit: usize, filters: &Filters) -> Result<DocumentPage>;
    /// Removes the document and its chunks. `Ok(false)` when it did not exist.
    async fn delete_document(&self, id: &str) -> Result<bool>;
    async fn fetch_chunks(&self, ids: &[String]) -> Result<Vec<StoredChunk>>;
    async fn stats(&self) -> Result<Stats>;
}
