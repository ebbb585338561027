use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const VECTOR_COLUMN: &str = "vector";
pub const DISTANCE_COLUMN: &str = "_distance";

fn timestamp() -> DataType { DataType::Timestamp(TimeUnit::Millisecond, None) }

pub fn vector_type(dim: usize) -> DataType {
	DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32)
}

/// One row per chunk. `doc_type` and `source` are copied from the owning
/// document so that filters can be pushed into the vector search.
pub fn build_chunks_schema(dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("document_id", DataType::Utf8, false),
		Field::new("chunk_index", DataType::Int32, false),
		Field::new("chunk_text", DataType::Utf8, false),
		Field::new("enriched_text", DataType::Utf8, true),
		Field::new("token_count", DataType::Int32, false),
		Field::new("doc_type", DataType::Utf8, true),
		Field::new("source", DataType::Utf8, true),
		Field::new("created_at", timestamp(), false),
		Field::new(VECTOR_COLUMN, vector_type(dim), true),
	]))
}

/// One row per document; `metadata` is a JSON object of string values.
pub fn build_documents_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("title", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, true),
		Field::new("doc_type", DataType::Utf8, true),
		Field::new("metadata", DataType::Utf8, false),
		Field::new("chunk_count", DataType::Int32, false),
		Field::new("created_at", timestamp(), false),
		Field::new("updated_at", timestamp(), false),
	]))
}

/// Vector width declared by a chunks table schema.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
	match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
		DataType::FixedSizeList(_, n) => Some(*n as usize),
		_ => None,
	}
}
