use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::schema::Value;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, warn};

use hermes_core::traits::LexicalIndex;
use hermes_core::types::{Candidate, Chunk, Document, Filters, SourceKind};
use hermes_core::Error;

use crate::query::{build_query, query_terms};
use crate::tantivy_utils::{build_schema, register_tokenizer, resolve_fields, ChunkFields, ANALYZER};

// tantivy refuses smaller per-thread budgets
const MIN_WRITER_BYTES: usize = 15_000_000;

/// Lexical index over chunk text. Cheap to clone; all clones share one
/// writer, and readers are reloaded explicitly after each commit so a
/// completed write is visible to the next search.
#[derive(Clone)]
pub struct TantivyLexicalIndex {
	inner: Arc<Inner>,
}

struct Inner {
	index: Index,
	reader: IndexReader,
	writer: Mutex<IndexWriter>,
	fields: ChunkFields,
}

/// Owned copy of what gets indexed for one chunk, so writes can move to a
/// blocking thread.
struct PendingChunk {
	chunk_id: String,
	text: String,
}

impl TantivyLexicalIndex {
	/// Opens the index under `index_dir`, creating it when absent.
	pub fn open(index_dir: &Path, writer_memory_bytes: usize) -> Result<Self> {
		std::fs::create_dir_all(index_dir).with_context(|| format!("create {}", index_dir.display()))?;
		let dir = MmapDirectory::open(index_dir)?;
		let index = Index::open_or_create(dir, build_schema())?;
		Self::from_index(index, writer_memory_bytes)
	}

	pub fn in_ram() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()), MIN_WRITER_BYTES)
	}

	fn from_index(index: Index, writer_memory_bytes: usize) -> Result<Self> {
		register_tokenizer(&index);
		let fields = resolve_fields(&index.schema())?;
		let writer = index.writer_with_num_threads(1, writer_memory_bytes.max(MIN_WRITER_BYTES))?;
		let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { inner: Arc::new(Inner { index, reader, writer: Mutex::new(writer), fields }) })
	}

	/// Number of indexed chunks visible to searches.
	pub fn num_chunks(&self) -> u64 {
		self.inner.reader.searcher().num_docs()
	}

	fn replace_document(&self, document_id: &str, doc_type: Option<&str>, source: Option<&str>, chunks: &[PendingChunk]) -> Result<()> {
		let f = self.inner.fields;
		let mut writer = self.inner.writer.lock();
		commit_or_rollback(&mut writer, |w| {
			w.delete_term(Term::from_field_text(f.document_id, document_id));
			for c in chunks {
				let mut doc = TantivyDocument::default();
				doc.add_text(f.chunk_id, &c.chunk_id);
				doc.add_text(f.document_id, document_id);
				if let Some(t) = doc_type { doc.add_text(f.doc_type, t); }
				if let Some(s) = source { doc.add_text(f.source, s); }
				doc.add_text(f.text, &c.text);
				w.add_document(doc)?;
			}
			Ok(())
		})?;
		drop(writer);
		self.inner.reader.reload()?;
		Ok(())
	}

	fn remove_document(&self, document_id: &str) -> Result<()> {
		let field = self.inner.fields.document_id;
		let mut writer = self.inner.writer.lock();
		commit_or_rollback(&mut writer, |w| {
			w.delete_term(Term::from_field_text(field, document_id));
			Ok(())
		})?;
		drop(writer);
		self.inner.reader.reload()?;
		Ok(())
	}

	fn search(&self, query_text: &str, k: usize, filters: &Filters) -> Result<Vec<Candidate>> {
		if k == 0 { return Ok(Vec::new()); }
		let mut analyzer = self.inner.index.tokenizers().get(ANALYZER).context("analyzer not registered")?;
		let terms = query_terms(&mut analyzer, query_text);
		let Some(query) = build_query(&self.inner.fields, &terms, filters) else {
			debug!(query = query_text, "no searchable terms");
			return Ok(Vec::new());
		};
		let searcher = self.inner.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let Some(chunk_id) = doc.get_first(self.inner.fields.chunk_id).and_then(|v| v.as_str()) else { continue };
			hits.push(Candidate { chunk_id: chunk_id.to_string(), score, source: SourceKind::Lexical });
		}
		Ok(hits)
	}
}

/// Runs `stage` and commits. On any failure the staged operations are
/// discarded, so the next commit on the shared writer cannot publish them.
fn commit_or_rollback(writer: &mut IndexWriter, stage: impl FnOnce(&mut IndexWriter) -> Result<()>) -> Result<()> {
	let outcome = stage(writer).and_then(|()| writer.commit().map(|_| ()).map_err(Into::into));
	if outcome.is_err() {
		if let Err(e) = writer.rollback() {
			warn!(error = %e, "lexical rollback failed");
		}
	}
	outcome
}

async fn blocking<T, F>(f: F) -> hermes_core::Result<T>
where
	T: Send + 'static,
	F: FnOnce() -> Result<T> + Send + 'static,
{
	tokio::task::spawn_blocking(f).await.map_err(Error::lexical)?.map_err(|e| Error::lexical(format!("{e:#}")))
}

#[async_trait]
impl LexicalIndex for TantivyLexicalIndex {
	async fn index_chunks(&self, document: &Document, chunks: &[Chunk]) -> hermes_core::Result<()> {
		let this = self.clone();
		let document_id = document.id.clone();
		let doc_type = document.doc_type.clone();
		let source = document.source.clone();
		let pending: Vec<PendingChunk> = chunks.iter().map(|c| PendingChunk { chunk_id: c.id.clone(), text: c.text.clone() }).collect();
		debug!(document_id = %document_id, chunks = pending.len(), "lexical index");
		blocking(move || this.replace_document(&document_id, doc_type.as_deref(), source.as_deref(), &pending)).await
	}

	async fn delete_document(&self, document_id: &str) -> hermes_core::Result<()> {
		let this = self.clone();
		let id = document_id.to_string();
		blocking(move || this.remove_document(&id)).await
	}

	async fn search_lexical(&self, query: &str, k: usize, filters: &Filters) -> hermes_core::Result<Vec<Candidate>> {
		let this = self.clone();
		let query = query.to_string();
		let filters = filters.clone();
		blocking(move || this.search(&query, k, &filters)).await
	}
}
