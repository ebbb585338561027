use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use hermes_core::config::{Config, Settings};
use hermes_core::types::{Filters, NewDocument};
use hermes_hybrid::{RagService, SearchRequest};
use hermes_vector::{IndexBuildOutcome, LanceStore, StoreOptions};

const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Parser)]
#[command(name = "hermes", about = "Hybrid dense + lexical document retrieval")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a text file, or every .txt/.md file under a directory
    Ingest {
        path: PathBuf,
        /// Title for a single file (defaults to the file stem)
        #[arg(long)]
        title: Option<String>,
        #[arg(long = "type")]
        doc_type: Option<String>,
        /// Re-ingest files whose path was already ingested
        #[arg(long)]
        force: bool,
    },
    /// Hybrid search
    Search {
        query: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long = "type")]
        doc_type: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        no_rerank: bool,
        #[arg(long)]
        no_cache: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one document
    Get { id: String },
    /// List documents, newest first
    List {
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long = "type")]
        doc_type: Option<String>,
    },
    /// Delete a document and all of its chunks
    Delete { id: String },
    Stats,
    /// Load both models and run one embedding and one rerank
    Warmup,
    /// Train the IVF_PQ index over chunk vectors
    BuildIndex,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;

    match cli.command {
        Command::BuildIndex => build_index(&settings).await,
        command => {
            let service = RagService::open(&settings).await?;
            run(&service, command).await
        }
    }
}

async fn run(service: &RagService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Ingest { path, title, doc_type, force } => ingest(service, &path, title, doc_type, force).await?,
        Command::Search { query, top_k, doc_type, source, no_rerank, no_cache, json } => {
            let mut request = SearchRequest::new(query).filters(Filters { doc_type, source });
            if let Some(k) = top_k { request = request.top_k(k); }
            if no_rerank { request = request.reranker(false); }
            if no_cache { request = request.no_cache(); }
            let response = service.search_with(request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response.results)?);
                return Ok(());
            }
            if let Some(path) = response.degraded { println!("⚠️  {path:?} search unavailable; partial results"); }
            println!("🔍 {} results ({} candidates, {} ms{})", response.results.len(), response.total_candidates, response.elapsed_ms, if response.cached { ", cached" } else { "" });
            for (i, r) in response.results.iter().enumerate() {
                let score = r.rerank_score.map_or_else(|| format!("rrf={:.4}", r.fused_score), |s| format!("rerank={s:.4}"));
                println!("\n  {}. {}  [{}]  chunk={}  {:?}", i + 1, r.document.title, score, r.chunk_index, r.sources);
                println!("     {}", snippet(&r.text, 240));
            }
        }
        Command::Get { id } => {
            let doc = service.get_document(&id).await?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Command::List { offset, limit, doc_type } => {
            let page = service.list_documents(offset, limit, Filters { doc_type, source: None }).await?;
            for d in &page.items {
                println!("{}  {}  type={}  chunks={}  {}", d.id, d.created_at.format("%Y-%m-%d %H:%M"), d.doc_type.as_deref().unwrap_or("-"), d.chunk_count, d.title);
            }
            println!("📊 {}..{} of {}{}", page.offset, page.offset + page.items.len(), page.total, if page.has_more { " (more)" } else { "" });
        }
        Command::Delete { id } => {
            service.delete_document(&id).await?;
            service.clear_cache()?;
            println!("✅ Deleted {id}");
        }
        Command::Stats => {
            let stats = service.get_stats().await?;
            println!("📊 documents={} chunks={} tokens={}", stats.document_count, stats.chunk_count, stats.total_tokens);
            for (t, n) in &stats.counts_by_type { println!("  {t}: {n}"); }
        }
        Command::Warmup => {
            let elapsed = service.warmup().await?;
            println!("✅ Models warm in {} ms", elapsed.as_millis());
        }
        Command::BuildIndex => unreachable!("handled before the service is opened"),
    }
    Ok(())
}

async fn ingest(service: &RagService, path: &Path, title: Option<String>, doc_type: Option<String>, force: bool) -> anyhow::Result<()> {
    let files: Vec<PathBuf> = if path.is_dir() {
        WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|x| x.to_str()).is_some_and(|x| TEXT_EXTENSIONS.contains(&x)))
            .collect()
    } else {
        vec![path.to_path_buf()]
    };
    let title = if files.len() == 1 { title } else { None };

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(200));
    let (mut ingested, mut skipped, mut failed, mut chunks) = (0usize, 0usize, 0usize, 0usize);
    for file in &files {
        bar.set_message(file.display().to_string());
        let source = file.to_string_lossy().into_owned();
        if !force && service.find_by_source(&source).await?.is_some() {
            skipped += 1;
            bar.inc(1);
            continue;
        }
        match ingest_file(service, file, source, title.clone(), doc_type.clone()).await {
            Ok(n) => {
                ingested += 1;
                chunks += n;
            }
            Err(e) => {
                failed += 1;
                warn!(file = %file.display(), error = %e, "ingest failed");
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    if ingested > 0 { service.clear_cache()?; }
    println!("✅ Ingested {ingested} files ({chunks} chunks), skipped {skipped}, failed {failed}");
    Ok(())
}

async fn ingest_file(service: &RagService, file: &Path, source: String, title: Option<String>, doc_type: Option<String>) -> anyhow::Result<usize> {
    let text = fs::read_to_string(file)?;
    let filename = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let title = title.unwrap_or_else(|| file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| filename.clone()));
    let mut doc = NewDocument::new(title, text.as_str())
        .source(source)
        .meta("filename", filename)
        .meta("size_chars", text.chars().count().to_string());
    if let Some(t) = doc_type { doc = doc.doc_type(t); }
    Ok(service.ingest_document(doc).await?.chunk_count)
}

async fn build_index(settings: &Settings) -> anyhow::Result<()> {
    let store = LanceStore::open(&settings.storage.lancedb_path().to_string_lossy(), StoreOptions::from_settings(settings)).await?;
    match store.build_vector_index().await? {
        IndexBuildOutcome::Built { rows, params } => {
            println!("✅ IVF_PQ index built over {rows} vectors (nlist={}, m={}, nbits={})", params.nlist, params.m, params.nbits);
            if !store.validate_vector_index(5, 16).await? { println!("⚠️  Index validation returned no hits"); }
        }
        IndexBuildOutcome::Skipped { rows } => println!("ℹ️  Only {rows} vectors; flat search stays in use"),
    }
    Ok(())
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}
