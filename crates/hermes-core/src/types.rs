//! Domain types shared by the store, the two search adapters and the
//! orchestrators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type DocumentId = String;
pub type ChunkId = String;
pub type Meta = BTreeMap<String, String>;

/// Chunk ids are derived from their owner and position so that
/// `(document_id, chunk_index)` uniqueness carries over to the id.
pub fn chunk_id(document_id: &str, chunk_index: usize) -> ChunkId {
    format!("{document_id}:{chunk_index}")
}

/// A stored document. Owns its chunks; deleting it removes all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub source: Option<String>,
    pub doc_type: Option<String>,
    pub metadata: Meta,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bounded unit of document text, the atomic unit of embedding and retrieval.
///
/// - `text`: the raw segment produced by the chunker
/// - `enriched_text`: contextualized variant that was fed to the embedder
/// - `embedding`: fixed-dimension dense vector, identical dimension across a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub text: String,
    pub enriched_text: Option<String>,
    pub token_count: usize,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Chunk row as read back for hydration; the embedding is never loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub chunk_index: usize,
    pub text: String,
    pub enriched_text: Option<String>,
    pub token_count: usize,
}

/// Caller input for ingestion.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub text: String,
    pub title: String,
    pub source: Option<String>,
    pub doc_type: Option<String>,
    pub metadata: Meta,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self { title: title.into(), text: text.into(), ..Self::default() }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Restricts search candidates and document listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filters {
    pub doc_type: Option<String>,
    pub source: Option<String>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.doc_type.is_none() && self.source.is_none()
    }

    pub fn doc_type(doc_type: impl Into<String>) -> Self {
        Self { doc_type: Some(doc_type.into()), ..Self::default() }
    }
}

/// Indicates which retrieval path produced a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Dense,
    Lexical,
}

/// Output of one retrieval path before fusion.
///
/// For `Dense` the score is a cosine distance (0 identical, 2 opposite,
/// lower is better). For `Lexical` it is a BM25 relevance (higher is better).
/// The two are not comparable, which is why fusion only looks at ranks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub source: SourceKind,
}

/// A chunk after rank fusion, with provenance from both paths.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    pub chunk_id: ChunkId,
    pub fused_score: f64,
    /// 1-indexed rank in the dense list.
    pub dense_rank: Option<usize>,
    /// 1-indexed rank in the lexical list.
    pub lexical_rank: Option<usize>,
    pub dense_distance: Option<f32>,
}

impl FusedResult {
    pub fn sources(&self) -> Vec<SourceKind> {
        let mut out = Vec::with_capacity(2);
        if self.dense_rank.is_some() { out.push(SourceKind::Dense); }
        if self.lexical_rank.is_some() { out.push(SourceKind::Lexical); }
        out
    }
}

/// Reranker input: a candidate chunk and the text scored against the query.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankCandidate {
    pub chunk_id: ChunkId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RerankScore {
    pub chunk_id: ChunkId,
    /// Unbounded relevance logit. Only comparable within one rerank call.
    pub score: f32,
}

/// Document fields carried on every ranked result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: String,
    pub source: Option<String>,
    pub doc_type: Option<String>,
    pub metadata: Meta,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            source: doc.source.clone(),
            doc_type: doc.doc_type.clone(),
            metadata: doc.metadata.clone(),
        }
    }
}

/// Final result returned to the caller and memoized by the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub chunk_id: ChunkId,
    pub chunk_index: usize,
    pub text: String,
    pub document: DocumentSummary,
    /// `None` when reranking was skipped for this query.
    pub rerank_score: Option<f32>,
    pub fused_score: f64,
    pub sources: Vec<SourceKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPage {
    pub items: Vec<Document>,
    pub total: usize,
    pub offset: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub total_tokens: u64,
    /// Documents without a type are counted under `"unknown"`.
    pub counts_by_type: BTreeMap<String, usize>,
}
