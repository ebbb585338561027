use std::collections::HashSet;

use hermes_core::config::ModelSettings;
use hermes_core::traits::Reranker;
use hermes_core::types::RerankCandidate;
use hermes_embed::{load_reranker, LexicalOverlapReranker};

fn candidates(texts: &[&str]) -> Vec<RerankCandidate> {
    texts.iter().enumerate().map(|(i, t)| RerankCandidate { chunk_id: format!("c{i}"), text: t.to_string() }).collect()
}

#[test]
fn rerank_returns_bounded_permutation_subset() {
    let reranker = LexicalOverlapReranker;
    let input = candidates(&["prazo recursal", "regime fechado progressão", "regime", "nada a ver"]);
    let out = reranker.rerank("progressão de regime", &input, 3).expect("rerank");
    assert_eq!(out.len(), 3);
    let ids: HashSet<&str> = input.iter().map(|c| c.chunk_id.as_str()).collect();
    let seen: HashSet<&str> = out.iter().map(|s| s.chunk_id.as_str()).collect();
    assert_eq!(seen.len(), out.len(), "no duplicates");
    assert!(seen.is_subset(&ids));
    assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(out[0].chunk_id, "c1");
}

#[test]
fn top_n_larger_than_input_returns_everything() {
    let reranker = LexicalOverlapReranker;
    let out = reranker.rerank("q", &candidates(&["a", "b"]), 10).expect("rerank");
    assert_eq!(out.len(), 2);
    assert!(reranker.rerank("q", &[], 10).expect("empty").is_empty());
}

#[test]
fn equal_scores_keep_input_order() {
    let reranker = LexicalOverlapReranker;
    let out = reranker.rerank("zzz", &candidates(&["one", "two", "three"]), 3).expect("rerank");
    assert_eq!(out.iter().map(|s| s.chunk_id.as_str()).collect::<Vec<_>>(), vec!["c0", "c1", "c2"]);
}

#[test]
fn load_reranker_honours_fake_setting() {
    let settings = ModelSettings { use_fake: true, ..ModelSettings::default() };
    let reranker = load_reranker(&settings).expect("fake reranker");
    assert_eq!(reranker.model_id(), "lexical-overlap");
}
