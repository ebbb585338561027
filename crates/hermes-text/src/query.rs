use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::tokenizer::{TextAnalyzer, TokenStream};
use tantivy::Term;

use hermes_core::types::Filters;

use crate::tantivy_utils::ChunkFields;

/// Replaces every non-alphanumeric character with a space and collapses runs
/// of whitespace. The result contains no query-grammar operators.
pub fn sanitize_query(raw: &str) -> String {
	let replaced: String = raw.chars().map(|c| if c.is_alphanumeric() { c } else { ' ' }).collect();
	replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Distinct analyzer terms of the sanitized query, in first-seen order.
pub fn query_terms(analyzer: &mut TextAnalyzer, raw: &str) -> Vec<String> {
	let clean = sanitize_query(raw);
	let mut terms: Vec<String> = Vec::new();
	let mut stream = analyzer.token_stream(&clean);
	while stream.advance() {
		let text = &stream.token().text;
		if !terms.iter().any(|t| t == text) { terms.push(text.clone()); }
	}
	terms
}

/// Disjunction of term queries over the text field, ANDed with exact-match
/// filter clauses. `None` when no searchable term survives analysis.
pub fn build_query(fields: &ChunkFields, terms: &[String], filters: &Filters) -> Option<Box<dyn Query>> {
	if terms.is_empty() { return None; }
	let should: Vec<(Occur, Box<dyn Query>)> = terms
		.iter()
		.map(|t| {
			let q: Box<dyn Query> = Box::new(TermQuery::new(Term::from_field_text(fields.text, t), IndexRecordOption::WithFreqs));
			(Occur::Should, q)
		})
		.collect();
	let text_query: Box<dyn Query> = Box::new(BooleanQuery::new(should));
	if filters.is_empty() { return Some(text_query); }

	let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, text_query)];
	if let Some(doc_type) = &filters.doc_type {
		clauses.push((Occur::Must, Box::new(TermQuery::new(Term::from_field_text(fields.doc_type, doc_type), IndexRecordOption::Basic))));
	}
	if let Some(source) = &filters.source {
		clauses.push((Occur::Must, Box::new(TermQuery::new(Term::from_field_text(fields.source, source), IndexRecordOption::Basic))));
	}
	Some(Box::new(BooleanQuery::new(clauses)))
}
