use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use liftrules_core::config::{resolve_with_base, AppConfig, Config, LoggingConfig};
use liftrules_core::traits::Embedder;
use liftrules_core::ChunkStore;
use liftrules_embed::get_default_embedder;
use liftrules_hybrid::{render_for_agent, RuleSearch, RulesRetriever};
use liftrules_vector::{warm_cache, EmbeddingCache};

#[derive(Parser)]
#[command(name = "liftrules")]
#[command(about = "Hybrid keyword + semantic search over the powerlifting rulebook")]
#[command(version)]
struct Cli {
    /// Rule corpus (JSON array of {id?, text}); overrides corpus.path
    #[arg(short, long, global = true)]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question and exit
    Search {
        query: String,

        /// Number of rules to return
        #[arg(short)]
        k: Option<usize>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read questions from stdin until EOF or `exit`
    Interactive {
        #[arg(short)]
        k: Option<usize>,
    },

    /// Embed the corpus into the on-disk cache and exit
    WarmCache,
}

fn init_tracing(logging: &LoggingConfig) {
    let debug = std::env::var("DEBUG").map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false);
    let level = if debug { "debug".to_string() } else { logging.level.clone() };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Wraps the embedder with the on-disk cache when enabled (always for `warm-cache`).
async fn cached_embedder(app: &AppConfig, store: &ChunkStore, embedder: Arc<dyn Embedder>, force: bool) -> anyhow::Result<Arc<dyn Embedder>> {
    if !(app.cache.enabled || force) {
        return Ok(embedder);
    }
    let uri = resolve_with_base(&std::env::current_dir()?, &app.cache.uri);
    let cache = EmbeddingCache::open(&uri.to_string_lossy(), &app.cache.table)
        .await
        .with_context(|| format!("opening embedding cache at {}", uri.display()))?;
    let warmed = warm_cache(&cache, embedder, store.chunks()).await?;
    info!(cached = warmed.cached(), uri = %uri.display(), "embedding cache ready");
    Ok(Arc::new(warmed))
}

fn print_search(search: &RuleSearch, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(search)?);
        return Ok(());
    }
    if let Some(reason) = &search.degraded_reason {
        println!("(degraded: keyword matches only, {reason})");
    }
    for (i, hit) in search.hits.iter().enumerate() {
        let label = hit.label.as_deref().map(|l| format!(" [{l}]")).unwrap_or_default();
        let fmt_signal = |s: Option<f32>| s.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"));
        println!(
            "{}.{} score={:.3} lexical={} semantic={}",
            i + 1,
            label,
            hit.score,
            fmt_signal(hit.lexical_score),
            fmt_signal(hit.semantic_score)
        );
        println!("   {}", hit.text);
    }
    Ok(())
}

fn interactive(retriever: &RulesRetriever, k: usize) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("rules> ");
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let question = line.trim();
        if matches!(question, "exit" | "quit") {
            break;
        }
        if !question.is_empty() {
            match retriever.search(question, k) {
                Ok(search) => print!("{}", render_for_agent(&search)),
                Err(e) => println!("Error searching rules: {e}"),
            }
        }
        print!("rules> ");
        stdout.flush()?;
    }
    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let app = config.app()?;
    init_tracing(&app.logging);

    let corpus_path = match cli.corpus {
        Some(path) => path,
        None => resolve_with_base(&std::env::current_dir()?, &app.corpus.path),
    };
    let store = ChunkStore::load_json_file(&corpus_path).with_context(|| format!("loading corpus {}", corpus_path.display()))?;
    info!(chunks = store.len(), path = %corpus_path.display(), "corpus loaded");

    let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder(&app.embedding)?);
    let warm_only = matches!(cli.command, Commands::WarmCache);
    let embedder = cached_embedder(&app, &store, embedder, warm_only).await?;
    if warm_only {
        println!("Embedding cache holds {} chunks for {}", store.len(), embedder.embedder_id());
        return Ok(());
    }

    let retriever = RulesRetriever::new(app.retrieval.clone())?;
    retriever.initialize(store.chunks(), embedder)?;

    match cli.command {
        Commands::Search { query, k, json } => {
            let search = retriever.search(&query, k.unwrap_or(app.retrieval.default_k))?;
            print_search(&search, json)?;
        }
        Commands::Interactive { k } => interactive(&retriever, k.unwrap_or(app.retrieval.default_k))?,
        Commands::WarmCache => {}
    }
    Ok(())
}
