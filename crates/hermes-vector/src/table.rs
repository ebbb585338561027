//! LanceDB connection and housekeeping helpers.
//!
//! Opens connections with strong read consistency, creates empty tables on
//! first use, and builds the SQL predicates pushed into scans and searches.
use anyhow::Result;
use arrow_array::{RecordBatch, RecordBatchIterator};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{connect, Connection, Table};
use std::sync::Arc;
use std::time::Duration;

use hermes_core::types::Filters;

/// Every read observes the latest committed version of each table.
pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).read_consistency_interval(Duration::ZERO).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<Table> {
    let names = conn.table_names().execute().await?;
    if !names.iter().any(|n| n == name) {
        // create empty table with 0 rows
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
        conn.create_table(name, Box::new(iter)).execute().await?;
    }
    Ok(conn.open_table(name).execute().await?)
}

pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn eq(column: &str, value: &str) -> String {
    format!("{column} = {}", quote(value))
}

pub fn in_list(column: &str, values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("{column} IN ({})", items.join(", "))
}

/// `None` when no filter is set.
pub fn filter_predicate(filters: &Filters) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(t) = &filters.doc_type { parts.push(eq("doc_type", t)); }
    if let Some(s) = &filters.source { parts.push(eq("source", s)); }
    if parts.is_empty() { None } else { Some(parts.join(" AND ")) }
}

/// Full scan of `columns`, optionally filtered.
pub async fn scan(table: &Table, predicate: Option<&str>, columns: Option<&[&str]>) -> Result<Vec<RecordBatch>> {
    let mut query = table.query();
    if let Some(p) = predicate { query = query.only_if(p); }
    if let Some(cols) = columns { query = query.select(Select::columns(cols)); }
    let batches = query.execute().await?.try_collect::<Vec<_>>().await?;
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(eq("id", "o'brien"), "id = 'o''brien'");
        assert_eq!(in_list("id", &["a".into(), "b'c".into()]), "id IN ('a', 'b''c')");
    }

    #[test]
    fn predicate_combines_set_filters() {
        assert_eq!(filter_predicate(&Filters::default()), None);
        let f = Filters { doc_type: Some("lei".into()), source: Some("x.txt".into()) };
        assert_eq!(filter_predicate(&f).as_deref(), Some("doc_type = 'lei' AND source = 'x.txt'"));
    }
}
