//! hermes-text
//!
//! Tantivy-backed lexical index over chunk text. Queries are built from
//! analyzer tokens, never parsed, so arbitrary user text is safe to search.
pub mod tantivy_utils;
pub mod query;
pub mod index;

pub use index::TantivyLexicalIndex;
pub use query::sanitize_query;
