use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const ANALYZER: &str = "text_with_stopwords";

/// Field handles resolved once per index.
#[derive(Debug, Clone, Copy)]
pub struct ChunkFields {
	pub chunk_id: Field,
	pub document_id: Field,
	pub doc_type: Field,
	pub source: Field,
	pub text: Field,
}

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("chunk_id", STRING | STORED);
	schema_builder.add_text_field("document_id", STRING | STORED);
	// exact-match filter fields; never returned, so not stored
	schema_builder.add_text_field("doc_type", STRING);
	schema_builder.add_text_field("source", STRING);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(ANALYZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	schema_builder.add_text_field("text", TextOptions::default().set_indexing_options(text_field_indexing));
	schema_builder.build()
}

pub fn resolve_fields(schema: &Schema) -> tantivy::Result<ChunkFields> {
	Ok(ChunkFields {
		chunk_id: schema.get_field("chunk_id")?,
		document_id: schema.get_field("document_id")?,
		doc_type: schema.get_field("doc_type")?,
		source: schema.get_field("source")?,
		text: schema.get_field("text")?,
	})
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(ANALYZER, build_analyzer());
}

pub fn build_analyzer() -> TextAnalyzer {
	let stop_words = [
		"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
	];
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build()
}
