//! Arrow encoding and decoding of document and chunk rows.
use anyhow::{anyhow, Context, Result};
use arrow_array::{
	Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, StringArray, TimestampMillisecondArray,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use hermes_core::types::{Chunk, Document, Meta, StoredChunk};

use crate::schema::{build_chunks_schema, build_documents_schema};

pub fn chunks_to_record_batch(document: &Document, chunks: &[Chunk], dim: usize) -> Result<RecordBatch> {
	let mut ids = Vec::with_capacity(chunks.len());
	let mut doc_ids = Vec::with_capacity(chunks.len());
	let mut chunk_indices = Vec::with_capacity(chunks.len());
	let mut texts = Vec::with_capacity(chunks.len());
	let mut enriched: Vec<Option<String>> = Vec::with_capacity(chunks.len());
	let mut token_counts = Vec::with_capacity(chunks.len());
	let mut created = Vec::with_capacity(chunks.len());
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
	for c in chunks {
		ids.push(c.id.clone());
		doc_ids.push(c.document_id.clone());
		chunk_indices.push(i32::try_from(c.chunk_index).context("chunk_index overflows i32")?);
		texts.push(c.text.clone());
		enriched.push(c.enriched_text.clone());
		token_counts.push(i32::try_from(c.token_count).context("token_count overflows i32")?);
		created.push(c.created_at.timestamp_millis());
		vectors.push(if c.embedding.is_empty() { None } else { Some(c.embedding.iter().map(|&x| Some(x)).collect()) });
	}
	let doc_types: Vec<Option<String>> = vec![document.doc_type.clone(); chunks.len()];
	let sources: Vec<Option<String>> = vec![document.source.clone(); chunks.len()];
	let record_batch = RecordBatch::try_new(build_chunks_schema(dim), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(doc_ids)),
		Arc::new(Int32Array::from(chunk_indices)),
		Arc::new(StringArray::from(texts)),
		Arc::new(StringArray::from(enriched)),
		Arc::new(Int32Array::from(token_counts)),
		Arc::new(StringArray::from(doc_types)),
		Arc::new(StringArray::from(sources)),
		Arc::new(TimestampMillisecondArray::from(created)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim as i32)),
	])?;
	Ok(record_batch)
}

pub fn document_to_record_batch(document: &Document) -> Result<RecordBatch> {
	let metadata = serde_json::to_string(&document.metadata)?;
	let record_batch = RecordBatch::try_new(build_documents_schema(), vec![
		Arc::new(StringArray::from(vec![document.id.clone()])),
		Arc::new(StringArray::from(vec![document.title.clone()])),
		Arc::new(StringArray::from(vec![document.source.clone()])),
		Arc::new(StringArray::from(vec![document.doc_type.clone()])),
		Arc::new(StringArray::from(vec![metadata])),
		Arc::new(Int32Array::from(vec![i32::try_from(document.chunk_count).context("chunk_count overflows i32")?])),
		Arc::new(TimestampMillisecondArray::from(vec![document.created_at.timestamp_millis()])),
		Arc::new(TimestampMillisecondArray::from(vec![document.updated_at.timestamp_millis()])),
	])?;
	Ok(record_batch)
}

pub(crate) fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| anyhow!("column '{name}' missing or of unexpected type"))
}

fn opt_str(arr: &StringArray, i: usize) -> Option<String> {
	if arr.is_null(i) { None } else { Some(arr.value(i).to_string()) }
}

fn timestamp(arr: &TimestampMillisecondArray, i: usize) -> Result<DateTime<Utc>> {
	DateTime::from_timestamp_millis(arr.value(i)).ok_or_else(|| anyhow!("timestamp out of range"))
}

pub fn documents_from_batch(batch: &RecordBatch) -> Result<Vec<Document>> {
	let id = column::<StringArray>(batch, "id")?;
	let title = column::<StringArray>(batch, "title")?;
	let source = column::<StringArray>(batch, "source")?;
	let doc_type = column::<StringArray>(batch, "doc_type")?;
	let metadata = column::<StringArray>(batch, "metadata")?;
	let chunk_count = column::<Int32Array>(batch, "chunk_count")?;
	let created_at = column::<TimestampMillisecondArray>(batch, "created_at")?;
	let updated_at = column::<TimestampMillisecondArray>(batch, "updated_at")?;
	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let meta: Meta = serde_json::from_str(metadata.value(i)).with_context(|| format!("metadata of {}", id.value(i)))?;
		out.push(Document {
			id: id.value(i).to_string(),
			title: title.value(i).to_string(),
			source: opt_str(source, i),
			doc_type: opt_str(doc_type, i),
			metadata: meta,
			chunk_count: chunk_count.value(i).max(0) as usize,
			created_at: timestamp(created_at, i)?,
			updated_at: timestamp(updated_at, i)?,
		});
	}
	Ok(out)
}

pub fn stored_chunks_from_batch(batch: &RecordBatch) -> Result<Vec<StoredChunk>> {
	let id = column::<StringArray>(batch, "id")?;
	let document_id = column::<StringArray>(batch, "document_id")?;
	let chunk_index = column::<Int32Array>(batch, "chunk_index")?;
	let text = column::<StringArray>(batch, "chunk_text")?;
	let enriched = column::<StringArray>(batch, "enriched_text")?;
	let token_count = column::<Int32Array>(batch, "token_count")?;
	Ok((0..batch.num_rows())
		.map(|i| StoredChunk {
			id: id.value(i).to_string(),
			document_id: document_id.value(i).to_string(),
			chunk_index: chunk_index.value(i).max(0) as usize,
			text: text.value(i).to_string(),
			enriched_text: opt_str(enriched, i),
			token_count: token_count.value(i).max(0) as usize,
		})
		.collect())
}

/// `(chunk_id, distance)` pairs from a vector search result batch. Rows with
/// a non-finite distance (no usable embedding) are skipped.
pub fn distances_from_batch(batch: &RecordBatch) -> Result<Vec<(String, f32)>> {
	let id = column::<StringArray>(batch, "id")?;
	let distance = column::<Float32Array>(batch, crate::schema::DISTANCE_COLUMN)?;
	Ok((0..batch.num_rows())
		.filter(|&i| distance.is_valid(i) && distance.value(i).is_finite())
		.map(|i| (id.value(i).to_string(), distance.value(i)))
		.collect())
}
