use std::sync::atomic::Ordering;
use std::time::Duration;

use hermes_core::types::{DocumentSummary, Filters, RankedResult, SourceKind};
use hermes_hybrid::cache::{normalize_query, CachedSearch, Fingerprint, LruResultCache, ResultCache};

fn result(id: &str) -> RankedResult {
    RankedResult {
        chunk_id: id.to_string(),
        chunk_index: 0,
        text: format!("text of {id}"),
        document: DocumentSummary { id: "doc".into(), title: "Doc".into(), source: None, doc_type: None, metadata: Default::default() },
        rerank_score: Some(1.5),
        fused_score: 1.0 / 61.0,
        sources: vec![SourceKind::Dense],
    }
}

fn entry(ids: &[&str]) -> CachedSearch {
    CachedSearch { results: ids.iter().map(|id| result(id)).collect(), total_candidates: 20 }
}

fn key(q: &str) -> Fingerprint {
    Fingerprint::new(q, 5, &Filters::default(), true)
}

#[test]
fn put_then_get_returns_same_results() {
    let cache = LruResultCache::new(8);
    let search = entry(&["a", "b"]);
    cache.put(&key("q"), &search, Duration::from_secs(60)).unwrap();
    let hit = cache.get(&key("q")).unwrap().expect("hit");
    assert_eq!(hit, search);
    assert_eq!(hit.total_candidates, 20);
    assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
}

#[test]
fn unknown_key_is_a_miss() {
    let cache = LruResultCache::new(8);
    assert_eq!(cache.get(&key("never stored")).unwrap(), None);
    assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 1);
}

#[test]
fn expired_entries_are_misses_and_removed() {
    let cache = LruResultCache::new(8);
    cache.put(&key("q"), &entry(&["a"]), Duration::from_millis(10)).unwrap();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(cache.get(&key("q")).unwrap(), None);
    assert!(cache.is_empty());
}

#[test]
fn least_recently_used_entry_is_evicted() {
    let cache = LruResultCache::new(2);
    let ttl = Duration::from_secs(60);
    cache.put(&key("a"), &entry(&["a"]), ttl).unwrap();
    cache.put(&key("b"), &entry(&["b"]), ttl).unwrap();
    cache.get(&key("a")).unwrap();
    cache.put(&key("c"), &entry(&["c"]), ttl).unwrap();

    assert!(cache.get(&key("a")).unwrap().is_some());
    assert!(cache.get(&key("b")).unwrap().is_none());
    assert_eq!(cache.stats().evictions.load(Ordering::Relaxed), 1);
}

#[test]
fn clear_drops_everything() {
    let cache = LruResultCache::new(4);
    cache.put(&key("a"), &entry(&["a"]), Duration::from_secs(60)).unwrap();
    cache.clear().unwrap();
    assert_eq!(cache.len(), 0);
}

#[test]
fn fingerprint_normalizes_case_and_whitespace() {
    assert_eq!(normalize_query("  Progressão   de\tREGIME "), "progressão de regime");
    assert_eq!(key("Progressão de Regime"), key("  progressão  de regime"));
}

#[test]
fn fingerprint_covers_every_result_parameter() {
    let base = Fingerprint::new("q", 5, &Filters::default(), true);
    assert_ne!(base, Fingerprint::new("q", 6, &Filters::default(), true));
    assert_ne!(base, Fingerprint::new("q", 5, &Filters::doc_type("lei"), true));
    assert_ne!(base, Fingerprint::new("q", 5, &Filters::default(), false));
    let swapped_a = Filters { doc_type: Some("x".into()), source: None };
    let swapped_b = Filters { doc_type: None, source: Some("x".into()) };
    assert_ne!(Fingerprint::new("q", 5, &swapped_a, true), Fingerprint::new("q", 5, &swapped_b, true));
}

#[test]
fn huge_ttl_never_expires_instead_of_overflowing() {
    let cache = LruResultCache::new(4);
    cache.put(&key("q"), &entry(&["a"]), Duration::MAX).unwrap();
    cache.put(&key("r"), &entry(&["b"]), Duration::from_secs(u64::MAX)).unwrap();
    assert!(cache.get(&key("q")).unwrap().is_some());
    assert!(cache.get(&key("r")).unwrap().is_some());
}
