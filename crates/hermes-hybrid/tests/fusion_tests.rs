use hermes_core::types::{Candidate, SourceKind};
use hermes_hybrid::fusion::{fuse, FusionSettings};

fn dense(ids: &[&str]) -> Vec<Candidate> {
    ids.iter().enumerate().map(|(i, id)| Candidate { chunk_id: id.to_string(), score: 0.1 * i as f32, source: SourceKind::Dense }).collect()
}

fn lexical(ids: &[&str]) -> Vec<Candidate> {
    ids.iter().enumerate().map(|(i, id)| Candidate { chunk_id: id.to_string(), score: 10.0 - i as f32, source: SourceKind::Lexical }).collect()
}

#[test]
fn single_source_top_rank_scores_one_over_sixty_one() {
    let fused = fuse(&dense(&["a"]), &[], 5, &FusionSettings::default());
    assert_eq!(fused.len(), 1);
    assert!((fused[0].fused_score - 1.0 / 61.0).abs() < 1e-12);
    assert_eq!(fused[0].dense_rank, Some(1));
    assert_eq!(fused[0].lexical_rank, None);
}

#[test]
fn swapped_ranks_fuse_to_equal_scores() {
    // A first dense / second lexical, B the other way round
    let fused = fuse(&dense(&["A", "B"]), &lexical(&["B", "A"]), 5, &FusionSettings::default());
    assert_eq!(fused.len(), 2);
    assert!((fused[0].fused_score - fused[1].fused_score).abs() < 1e-12);
    let expected = 1.0 / 61.0 + 1.0 / 62.0;
    assert!((fused[0].fused_score - expected).abs() < 1e-12);
    // tie broken by lower dense distance
    assert_eq!(fused[0].chunk_id, "A");
}

#[test]
fn results_are_bounded_and_descending() {
    let fused = fuse(&dense(&["a", "b", "c", "d"]), &lexical(&["d", "e", "a"]), 3, &FusionSettings::default());
    assert_eq!(fused.len(), 3);
    assert!(fused.windows(2).all(|w| w[0].fused_score >= w[1].fused_score));
    assert_eq!(fused[0].chunk_id, "a");
    assert_eq!(fused[0].sources(), vec![SourceKind::Dense, SourceKind::Lexical]);
}

#[test]
fn lexical_only_chunks_participate() {
    let fused = fuse(&[], &lexical(&["x", "y"]), 10, &FusionSettings::default());
    assert_eq!(fused.iter().map(|f| f.chunk_id.as_str()).collect::<Vec<_>>(), vec!["x", "y"]);
    assert!(fused.iter().all(|f| f.dense_distance.is_none()));
}

#[test]
fn duplicates_within_a_list_count_once() {
    let fused = fuse(&dense(&["a", "a", "b"]), &[], 10, &FusionSettings::default());
    let a = fused.iter().find(|f| f.chunk_id == "a").unwrap();
    assert!((a.fused_score - 1.0 / 61.0).abs() < 1e-12);
    let b = fused.iter().find(|f| f.chunk_id == "b").unwrap();
    assert_eq!(b.dense_rank, Some(3));
}

#[test]
fn weights_scale_each_path() {
    let settings = FusionSettings { c: 60.0, dense_weight: 0.7, lexical_weight: 0.3 };
    let fused = fuse(&dense(&["d"]), &lexical(&["l"]), 10, &settings);
    assert_eq!(fused[0].chunk_id, "d");
    assert!((fused[0].fused_score - 0.7 / 61.0).abs() < 1e-12);
    assert!((fused[1].fused_score - 0.3 / 61.0).abs() < 1e-12);
}

#[test]
fn empty_inputs_fuse_to_nothing() {
    assert!(fuse(&[], &[], 10, &FusionSettings::default()).is_empty());
    assert!(fuse(&dense(&["a"]), &[], 0, &FusionSettings::default()).is_empty());
}

#[test]
fn dense_provenance_wins_ties_across_paths() {
    let fused = fuse(&dense(&["y"]), &lexical(&["x"]), 10, &FusionSettings::default());
    assert!((fused[0].fused_score - fused[1].fused_score).abs() < 1e-12);
    assert_eq!(fused[0].chunk_id, "y");
    assert_eq!(fused[1].chunk_id, "x");
}
