use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::DistanceType;
use tracing::debug;

use hermes_core::traits::DenseIndex;
use hermes_core::types::{Candidate, Filters, SourceKind};
use hermes_core::Error;

use crate::schema::VECTOR_COLUMN;
use crate::store::LanceStore;
use crate::table::filter_predicate;
use crate::writer::distances_from_batch;

impl LanceStore {
	/// Nearest chunks by cosine distance, ascending.
	pub async fn nearest(&self, query: &[f32], k: usize, filters: &Filters) -> Result<Vec<(String, f32)>> {
		if self.chunks.count_rows(None).await? == 0 { return Ok(Vec::new()); }
		let mut q = self
			.chunks
			.vector_search(query.to_vec())?
			.column(VECTOR_COLUMN)
			.distance_type(DistanceType::Cosine)
			.nprobes(self.options.nprobes)
			.limit(k)
			.select(Select::columns(&["id"]));
		if let Some(r) = self.options.refine_factor { q = q.refine_factor(r); }
		if let Some(p) = filter_predicate(filters) { q = q.only_if(p); }
		let batches = q.execute().await?.try_collect::<Vec<_>>().await?;
		let mut hits = Vec::new();
		for batch in &batches { hits.extend(distances_from_batch(batch)?); }
		hits.sort_by(|a, b| a.1.total_cmp(&b.1));
		hits.truncate(k);
		Ok(hits)
	}
}

#[async_trait]
impl DenseIndex for LanceStore {
	async fn search_dense(&self, query: &[f32], k: usize, filters: &Filters) -> hermes_core::Result<Vec<Candidate>> {
		if k == 0 { return Ok(Vec::new()); }
		if query.len() != self.dim() {
			return Err(Error::Validation(format!("query vector has {} dims, index has {}", query.len(), self.dim())));
		}
		let hits = self.nearest(query, k, filters).await.map_err(|e| Error::vector(format!("{e:#}")))?;
		debug!(k, hits = hits.len(), "dense search");
		Ok(hits.into_iter().map(|(chunk_id, distance)| Candidate { chunk_id, score: distance, source: SourceKind::Dense }).collect())
	}
}
