//! Embeds a couple of strings with the configured model and reranks them
//! against a query. `APP_USE_FAKE_EMBEDDINGS=1` runs without weights.
use hermes_core::config::Config;
use hermes_core::types::RerankCandidate;
use hermes_embed::{load_embedder, load_reranker};

fn main() -> anyhow::Result<()> {
    let settings = Config::load()?.settings()?;
    let embedder = load_embedder(&settings.models)?;
    let texts = vec!["hello world".to_string(), "rust embeddings".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("model={} B={} dim={}", embedder.model_id(), embs.len(), embedder.dim());

    let reranker = load_reranker(&settings.models)?;
    let candidates: Vec<RerankCandidate> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| RerankCandidate { chunk_id: i.to_string(), text: t.clone() })
        .collect();
    for s in reranker.rerank("embeddings in rust", &candidates, 2)? {
        println!("{} {:.4}", s.chunk_id, s.score);
    }
    Ok(())
}
