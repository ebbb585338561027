use anyhow::{anyhow, Result};
use arrow_array::{Int32Array, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use lancedb::Table;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use hermes_core::config::Settings;
use hermes_core::traits::DocumentStore;
use hermes_core::types::{Chunk, Document, DocumentId, DocumentPage, Filters, Stats, StoredChunk};
use hermes_core::Error;

use crate::schema::{build_chunks_schema, build_documents_schema, vector_dim};
use crate::table::{ensure_table, eq, filter_predicate, in_list, open_db, scan};
use crate::writer::{chunks_to_record_batch, column, document_to_record_batch, documents_from_batch, stored_chunks_from_batch};

const CHUNK_COLUMNS: [&str; 6] = ["id", "document_id", "chunk_index", "chunk_text", "enriched_text", "token_count"];

#[derive(Debug, Clone)]
pub struct StoreOptions {
	pub documents_table: String,
	pub chunks_table: String,
	pub dim: usize,
	pub nprobes: usize,
	pub refine_factor: Option<u32>,
}

impl StoreOptions {
	pub fn from_settings(settings: &Settings) -> Self {
		Self {
			documents_table: settings.storage.documents_table.clone(),
			chunks_table: settings.storage.chunks_table.clone(),
			dim: settings.models.embedding_dim,
			nprobes: settings.retrieval.nprobes,
			refine_factor: settings.retrieval.refine_factor,
		}
	}
}

/// Documents and chunks in two LanceDB tables. Serves both as the
/// `DocumentStore` and, through the chunk vectors, as the `DenseIndex`.
///
/// A document is visible once its row exists in the documents table. Chunks
/// are appended first, so readers that start from documents never observe
/// a document with missing chunks.
#[derive(Clone)]
pub struct LanceStore {
	pub(crate) documents: Table,
	pub(crate) chunks: Table,
	pub(crate) options: StoreOptions,
}

impl LanceStore {
	pub async fn open(uri: &str, options: StoreOptions) -> Result<Self> {
		let conn = open_db(uri).await?;
		let documents = ensure_table(&conn, &options.documents_table, build_documents_schema()).await?;
		let chunks = ensure_table(&conn, &options.chunks_table, build_chunks_schema(options.dim)).await?;
		let existing = vector_dim(&*chunks.schema().await?);
		if existing != Some(options.dim) {
			return Err(anyhow!(
				"table '{}' stores {:?}-d vectors but the embedder produces {}-d",
				options.chunks_table, existing, options.dim
			));
		}
		debug!(uri, "lance store ready");
		Ok(Self { documents, chunks, options })
	}

	pub fn dim(&self) -> usize { self.options.dim }

	pub async fn chunk_count(&self) -> Result<usize> {
		Ok(self.chunks.count_rows(None).await?)
	}

	async fn remove_chunks(&self, document_id: &str) -> Result<()> {
		self.chunks.delete(&eq("document_id", document_id)).await?;
		Ok(())
	}

	async fn insert(&self, document: &Document, chunks: &[Chunk]) -> Result<()> {
		if !chunks.is_empty() {
			let batch = chunks_to_record_batch(document, chunks, self.options.dim)?;
			let schema = batch.schema();
			let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
			self.chunks.add(reader).execute().await?;
		}
		let batch = document_to_record_batch(document)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		if let Err(e) = self.documents.add(reader).execute().await {
			if let Err(undo) = self.remove_chunks(&document.id).await {
				warn!(document_id = %document.id, error = %undo, "could not remove chunks after failed document write");
			}
			return Err(e.into());
		}
		Ok(())
	}

	async fn read_documents(&self, predicate: Option<&str>) -> Result<Vec<Document>> {
		let mut docs = Vec::new();
		for batch in scan(&self.documents, predicate, None).await? {
			docs.extend(documents_from_batch(&batch)?);
		}
		Ok(docs)
	}

	async fn delete(&self, id: &str) -> Result<bool> {
		let pred = eq("id", id);
		let existed = self.documents.count_rows(Some(pred.clone())).await? > 0;
		self.documents.delete(&pred).await?;
		// also clears chunks orphaned by an interrupted ingestion
		self.remove_chunks(id).await?;
		Ok(existed)
	}

	async fn compute_stats(&self) -> Result<Stats> {
		let document_count = self.documents.count_rows(None).await?;
		let chunk_count = self.chunks.count_rows(None).await?;
		let mut total_tokens = 0u64;
		for batch in scan(&self.chunks, None, Some(&["token_count"])).await? {
			let tokens = column::<Int32Array>(&batch, "token_count")?;
			total_tokens += tokens.iter().flatten().map(|t| t.max(0) as u64).sum::<u64>();
		}
		let mut counts_by_type: BTreeMap<String, usize> = BTreeMap::new();
		for batch in scan(&self.documents, None, Some(&["doc_type"])).await? {
			let types = column::<StringArray>(&batch, "doc_type")?;
			for t in types.iter() {
				*counts_by_type.entry(t.unwrap_or("unknown").to_string()).or_default() += 1;
			}
		}
		Ok(Stats { document_count, chunk_count, total_tokens, counts_by_type })
	}
}

fn newest_first(docs: &mut [Document]) {
	docs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[async_trait]
impl DocumentStore for LanceStore {
	async fn insert_document(&self, document: &Document, chunks: &[Chunk]) -> hermes_core::Result<()> {
		if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != self.options.dim) {
			return Err(Error::Validation(format!(
				"chunk {} has a {}-d embedding, store expects {}",
				bad.id,
				bad.embedding.len(),
				self.options.dim
			)));
		}
		self.insert(document, chunks).await.map_err(Error::store)
	}

	async fn get_document(&self, id: &str) -> hermes_core::Result<Option<Document>> {
		let docs = self.read_documents(Some(&eq("id", id))).await.map_err(Error::store)?;
		Ok(docs.into_iter().next())
	}

	async fn get_documents(&self, ids: &[DocumentId]) -> hermes_core::Result<Vec<Document>> {
		if ids.is_empty() { return Ok(Vec::new()); }
		self.read_documents(Some(&in_list("id", ids))).await.map_err(Error::store)
	}

	async fn find_by_source(&self, source: &str) -> hermes_core::Result<Option<Document>> {
		let mut docs = self.read_documents(Some(&eq("source", source))).await.map_err(Error::store)?;
		newest_first(&mut docs);
		Ok(docs.into_iter().next())
	}

	async fn list_documents(&self, offset: usize, limit: usize, filters: &Filters) -> hermes_core::Result<DocumentPage> {
		let predicate = filter_predicate(filters);
		let mut docs = self.read_documents(predicate.as_deref()).await.map_err(Error::store)?;
		newest_first(&mut docs);
		let total = docs.len();
		let items: Vec<Document> = docs.into_iter().skip(offset).take(limit).collect();
		let has_more = offset + items.len() < total;
		Ok(DocumentPage { items, total, offset, has_more })
	}

	async fn delete_document(&self, id: &str) -> hermes_core::Result<bool> {
		self.delete(id).await.map_err(Error::store)
	}

	async fn fetch_chunks(&self, ids: &[String]) -> hermes_core::Result<Vec<StoredChunk>> {
		if ids.is_empty() { return Ok(Vec::new()); }
		let batches = scan(&self.chunks, Some(&in_list("id", ids)), Some(&CHUNK_COLUMNS)).await.map_err(Error::store)?;
		let mut out = Vec::new();
		for batch in &batches {
			out.extend(stored_chunks_from_batch(batch).map_err(Error::store)?);
		}
		Ok(out)
	}

	async fn stats(&self) -> hermes_core::Result<Stats> {
		self.compute_stats().await.map_err(Error::store)
	}
}
