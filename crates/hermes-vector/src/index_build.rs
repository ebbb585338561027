//! IVF_PQ index training for the chunk vectors.
//!
//! Flat (exhaustive) search is exact and fast enough for small corpora, so
//! the index is only built once enough vectors exist to train PQ codebooks.
//! After a build, `nprobes` and `refine_factor` trade recall for latency.
use anyhow::Result;
use arrow_array::cast::AsArray;
use arrow_array::{Array, FixedSizeListArray};
use lancedb::index::{vector::IvfPqIndexBuilder, Index};
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::DistanceType;
use tracing::info;

use crate::schema::VECTOR_COLUMN;
use crate::store::LanceStore;
use crate::table::scan;

/// PQ trains 256 centroids per sub-vector.
pub const MIN_TRAINING_ROWS: usize = 256;
pub const INDEX_NAME: &str = "chunks_vector_ivfpq";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvfPqParams {
	pub nlist: usize,
	pub m: usize,
	pub nbits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuildOutcome {
	Built { rows: usize, params: IvfPqParams },
	Skipped { rows: usize },
}

pub fn compute_ivfpq_params(total_ready: usize, dim: usize) -> IvfPqParams {
	let sqrt_n = (total_ready as f64).sqrt() as usize;
	let mut nlist = std::cmp::min(2 * sqrt_n, 65536);
	// Clamp nlist to be less than total_ready for tiny datasets
	nlist = if total_ready > 1 { nlist.clamp(1, total_ready - 1) } else { 1 };
	let preferred = if dim >= 1024 { 32 } else { 16 };
	let m = [preferred, 16, 8, 4, 2, 1].into_iter().find(|m| dim % m == 0).unwrap_or(1);
	IvfPqParams { nlist, m, nbits: 8 }
}

impl LanceStore {
	pub async fn count_ready_vectors(&self) -> Result<usize> {
		let mut cnt = 0usize;
		for batch in scan(&self.chunks, None, Some(&[VECTOR_COLUMN])).await? {
			if let Some(fsl) = batch.column_by_name(VECTOR_COLUMN).and_then(|a| a.as_any().downcast_ref::<FixedSizeListArray>()) {
				cnt += (0..fsl.len()).filter(|&i| fsl.is_valid(i)).count();
			}
		}
		Ok(cnt)
	}

	/// Trains and (re)builds the cosine IVF_PQ index over chunk vectors.
	pub async fn build_vector_index(&self) -> Result<IndexBuildOutcome> {
		let rows = self.count_ready_vectors().await?;
		if rows < MIN_TRAINING_ROWS {
			info!(rows, min = MIN_TRAINING_ROWS, "too few vectors for IVF_PQ; flat search stays in use");
			return Ok(IndexBuildOutcome::Skipped { rows });
		}
		let params = compute_ivfpq_params(rows, self.dim());
		info!(rows, nlist = params.nlist, m = params.m, "building IVF_PQ index");
		self.chunks
			.create_index(
				&[VECTOR_COLUMN],
				Index::IvfPq(
					IvfPqIndexBuilder::default()
						.distance_type(DistanceType::Cosine)
						.num_partitions(params.nlist as u32)
						.num_sub_vectors(params.m as u32),
				),
			)
			.name(INDEX_NAME.to_string())
			.execute()
			.await?;
		Ok(IndexBuildOutcome::Built { rows, params })
	}

	/// Very simple validation: sample up to `sample` vectors and ensure top-k returns non-empty.
	pub async fn validate_vector_index(&self, k: usize, sample: usize) -> Result<bool> {
		let batches = self.chunks.query().select(Select::columns(&[VECTOR_COLUMN])).limit(sample).execute().await?;
		let batches = futures::TryStreamExt::try_collect::<Vec<_>>(batches).await?;
		let mut ok = 0usize;
		for batch in &batches {
			let Some(fsl) = batch.column_by_name(VECTOR_COLUMN).and_then(|a| a.as_any().downcast_ref::<FixedSizeListArray>()) else { continue };
			for i in 0..batch.num_rows() {
				if !fsl.is_valid(i) { continue; }
				let inner = fsl.value(i);
				let q = inner.as_primitive::<arrow_array::types::Float32Type>().values().to_vec();
				let hits = self.nearest(&q, k, &Default::default()).await?;
				if !hits.is_empty() { ok += 1; }
			}
		}
		Ok(ok > 0)
	}
}
