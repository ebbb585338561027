use chrono::{Duration, Utc};
use hermes_core::traits::{DenseIndex, DocumentStore};
use hermes_core::types::{chunk_id, Chunk, Document, Filters, SourceKind};
use hermes_core::Error;
use hermes_vector::{LanceStore, StoreOptions};

const DIM: usize = 4;

fn options() -> StoreOptions {
    StoreOptions { documents_table: "documents".into(), chunks_table: "chunks".into(), dim: DIM, nprobes: 20, refine_factor: None }
}

async fn open(dir: &tempfile::TempDir) -> LanceStore {
    LanceStore::open(&dir.path().to_string_lossy(), options()).await.expect("open store")
}

fn unit(axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[axis] = 1.0;
    v
}

fn document(id: &str, doc_type: Option<&str>, age_secs: i64) -> Document {
    let at = Utc::now() - Duration::seconds(age_secs);
    Document {
        id: id.into(),
        title: format!("Title {id}"),
        source: Some(format!("{id}.txt")),
        doc_type: doc_type.map(str::to_string),
        metadata: [("filename".to_string(), format!("{id}.txt"))].into_iter().collect(),
        chunk_count: 0,
        created_at: at,
        updated_at: at,
    }
}

fn with_chunks(mut doc: Document, vectors: &[Vec<f32>]) -> (Document, Vec<Chunk>) {
    let chunks: Vec<Chunk> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| Chunk {
            id: chunk_id(&doc.id, i),
            document_id: doc.id.clone(),
            chunk_index: i,
            text: format!("chunk {i} of {}", doc.id),
            enriched_text: Some(format!("[{}] chunk {i}", doc.title)),
            token_count: 4,
            embedding: v.clone(),
            created_at: doc.created_at,
        })
        .collect();
    doc.chunk_count = chunks.len();
    (doc, chunks)
}

#[tokio::test]
async fn insert_then_read_back() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open(&tmp).await;
    let (doc, chunks) = with_chunks(document("a", Some("lei"), 0), &[unit(0), unit(1)]);
    store.insert_document(&doc, &chunks).await.expect("insert");

    let got = store.get_document("a").await.unwrap().expect("document present");
    assert_eq!(got.title, "Title a");
    assert_eq!(got.chunk_count, 2);
    assert_eq!(got.metadata.get("filename").map(String::as_str), Some("a.txt"));
    assert_eq!(got.created_at.timestamp_millis(), doc.created_at.timestamp_millis());

    let fetched = store.fetch_chunks(&["a:1".to_string(), "missing:0".to_string()]).await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].chunk_index, 1);
    assert_eq!(fetched[0].enriched_text.as_deref(), Some("[Title a] chunk 1"));
    assert!(store.get_document("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn dense_search_orders_by_cosine_distance() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open(&tmp).await;
    let (doc, chunks) = with_chunks(document("a", None, 0), &[unit(0), vec![0.7, 0.7, 0.0, 0.0], unit(2)]);
    store.insert_document(&doc, &chunks).await.unwrap();

    let hits = store.search_dense(&unit(0), 10, &Filters::default()).await.expect("search");
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].chunk_id, "a:0");
    assert!(hits[0].score.abs() < 1e-4, "identical vector has distance 0");
    assert_eq!(hits[1].chunk_id, "a:1");
    assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));
    assert!(hits.iter().all(|h| h.source == SourceKind::Dense));

    let top1 = store.search_dense(&unit(0), 1, &Filters::default()).await.unwrap();
    assert_eq!(top1.len(), 1);
}

#[tokio::test]
async fn dense_search_applies_filters() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open(&tmp).await;
    let (a, ca) = with_chunks(document("a", Some("lei"), 10), &[unit(0)]);
    let (b, cb) = with_chunks(document("b", Some("nota"), 0), &[unit(0)]);
    store.insert_document(&a, &ca).await.unwrap();
    store.insert_document(&b, &cb).await.unwrap();

    let hits = store.search_dense(&unit(0), 10, &Filters::doc_type("nota")).await.unwrap();
    assert_eq!(hits.iter().map(|h| h.chunk_id.as_str()).collect::<Vec<_>>(), vec!["b:0"]);
}

#[tokio::test]
async fn empty_store_search_is_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open(&tmp).await;
    assert!(store.search_dense(&unit(1), 5, &Filters::default()).await.unwrap().is_empty());
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.document_count, 0);
    assert_eq!(stats.total_tokens, 0);
}

#[tokio::test]
async fn wrong_dimension_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open(&tmp).await;
    let (doc, chunks) = with_chunks(document("a", None, 0), &[vec![1.0, 0.0]]);
    assert!(matches!(store.insert_document(&doc, &chunks).await, Err(Error::Validation(_))));
    assert!(store.get_document("a").await.unwrap().is_none());
    assert!(matches!(store.search_dense(&[1.0], 3, &Filters::default()).await, Err(Error::Validation(_))));
}

#[tokio::test]
async fn delete_removes_document_and_chunks() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open(&tmp).await;
    let (doc, chunks) = with_chunks(document("a", None, 0), &[unit(0), unit(1)]);
    store.insert_document(&doc, &chunks).await.unwrap();

    assert!(store.delete_document("a").await.unwrap());
    assert!(!store.delete_document("a").await.unwrap());
    assert_eq!(store.chunk_count().await.unwrap(), 0);
    assert!(store.search_dense(&unit(0), 5, &Filters::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_is_newest_first_with_pagination() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open(&tmp).await;
    for (id, age, t) in [("old", 30, Some("lei")), ("mid", 20, None), ("new", 10, Some("lei"))] {
        let (doc, chunks) = with_chunks(document(id, t, age), &[unit(0)]);
        store.insert_document(&doc, &chunks).await.unwrap();
    }
    let page = store.list_documents(0, 2, &Filters::default()).await.unwrap();
    assert_eq!(page.items.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), vec!["new", "mid"]);
    assert_eq!(page.total, 3);
    assert!(page.has_more);

    let rest = store.list_documents(2, 2, &Filters::default()).await.unwrap();
    assert_eq!(rest.items.len(), 1);
    assert!(!rest.has_more);

    let typed = store.list_documents(0, 10, &Filters::doc_type("lei")).await.unwrap();
    assert_eq!(typed.total, 2);
}

#[tokio::test]
async fn stats_group_by_type_with_unknown_bucket() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open(&tmp).await;
    for (id, t) in [("a", Some("lei")), ("b", Some("lei")), ("c", None)] {
        let (doc, chunks) = with_chunks(document(id, t, 0), &[unit(0), unit(3)]);
        store.insert_document(&doc, &chunks).await.unwrap();
    }
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.document_count, 3);
    assert_eq!(stats.chunk_count, 6);
    assert_eq!(stats.total_tokens, 24);
    assert_eq!(stats.counts_by_type.get("lei"), Some(&2));
    assert_eq!(stats.counts_by_type.get("unknown"), Some(&1));
}

#[tokio::test]
async fn find_by_source_returns_newest_match() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open(&tmp).await;
    let (mut older, c1) = with_chunks(document("v1", None, 60), &[unit(0)]);
    older.source = Some("shared.txt".into());
    let (mut newer, c2) = with_chunks(document("v2", None, 0), &[unit(0)]);
    newer.source = Some("shared.txt".into());
    store.insert_document(&older, &c1).await.unwrap();
    store.insert_document(&newer, &c2).await.unwrap();

    let found = store.find_by_source("shared.txt").await.unwrap().expect("match");
    assert_eq!(found.id, "v2");
    assert!(store.find_by_source("other.txt").await.unwrap().is_none());
}

#[tokio::test]
async fn reopening_with_another_dimension_fails() {
    let tmp = tempfile::tempdir().unwrap();
    drop(open(&tmp).await);
    let mut wrong = options();
    wrong.dim = 8;
    assert!(LanceStore::open(&tmp.path().to_string_lossy(), wrong).await.is_err());
}

#[tokio::test]
async fn index_build_is_skipped_for_small_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let store = open(&tmp).await;
    let (doc, chunks) = with_chunks(document("a", None, 0), &[unit(0)]);
    store.insert_document(&doc, &chunks).await.unwrap();
    let outcome = store.build_vector_index().await.unwrap();
    assert_eq!(outcome, hermes_vector::IndexBuildOutcome::Skipped { rows: 1 });
    assert!(store.validate_vector_index(1, 4).await.unwrap());
}
