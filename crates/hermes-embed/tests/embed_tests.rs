use hermes_core::config::ModelSettings;
use hermes_core::traits::Embedder;
use hermes_embed::{load_embedder, FakeEmbedder};

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(1024);
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    assert!((norm(v1) - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={})", norm(v1));
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn batch_matches_single_calls() {
    let embedder = FakeEmbedder::new(64);
    let texts: Vec<String> = ["alpha beta", "gamma", "delta epsilon zeta"].iter().map(|s| s.to_string()).collect();
    let batch = embedder.embed_batch(&texts).expect("batch");
    assert_eq!(batch.len(), texts.len());
    for (t, v) in texts.iter().zip(&batch) {
        assert_eq!(&embedder.embed(t).expect("single"), v);
    }
}

#[test]
fn shared_tokens_are_closer_than_disjoint_ones() {
    let embedder = FakeEmbedder::new(256);
    let q = embedder.embed("regime fechado").unwrap();
    let near = embedder.embed("regime semiaberto").unwrap();
    let far = embedder.embed("habeas corpus").unwrap();
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    assert!(dot(&q, &near) > dot(&q, &far));
}

#[test]
fn blank_text_still_yields_unit_vector() {
    let v = FakeEmbedder::new(8).embed("   ").unwrap();
    assert!((norm(&v) - 1.0).abs() < 1e-6);
}

#[test]
fn load_embedder_honours_fake_setting() {
    let settings = ModelSettings { use_fake: true, embedding_dim: 32, ..ModelSettings::default() };
    let embedder = load_embedder(&settings).expect("fake embedder");
    assert_eq!(embedder.dim(), 32);
    assert!(embedder.model_id().starts_with("fake"));
}

#[test]
fn missing_model_dir_is_model_unavailable() {
    if hermes_embed::fake_models_forced() { return; }
    let settings = ModelSettings { embedding_dir: "/nonexistent/hermes/model".into(), ..ModelSettings::default() };
    let err = load_embedder(&settings).err().expect("load must fail");
    assert!(matches!(err, hermes_core::Error::ModelUnavailable(_)));
}
