use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comics_core::{ComicId, SledStore};
use comics_crawler::{fetch_range, load_cached, HttpFetcher, WorkerPool, DEFAULT_CONCURRENCY};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "crawler")]
#[command(about = "Download comic metadata into a local store", long_about = None)]
struct Cli {
    /// Base URL of the comics source
    #[arg(long, global = true, default_value = "https://xkcd.com")]
    source_url: String,
    /// Request timeout seconds
    #[arg(long, global = true, default_value_t = 12)]
    timeout_secs: u64,
    /// User-Agent string sent with every request
    #[arg(long, global = true, default_value = "comics-crawler/0.1")]
    user_agent: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan forward from the first comic until the source runs out, skipping stored comics
    Crawl {
        /// Store directory
        #[arg(long, default_value = "./data/comics.db")]
        db: String,
        /// Concurrency (number of workers)
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Fetch a closed id range and write it as JSONL
    Range {
        /// First comic id
        #[arg(long)]
        start: Option<ComicId>,
        /// Last comic id; the latest published comic when omitted
        #[arg(long)]
        end: Option<ComicId>,
        /// Output JSONL file path
        #[arg(long, default_value = "./data/range.jsonl")]
        output: String,
    },
}

#[derive(Serialize)]
struct OutComic<'a> {
    id: ComicId,
    url: &'a str,
    keywords: &'a [String],
    fetched_at: &'a str,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let fetcher = Arc::new(HttpFetcher::new(&cli.source_url, Duration::from_secs(cli.timeout_secs), &cli.user_agent)?);

    match cli.command {
        Commands::Crawl { db, concurrency } => crawl(fetcher, &db, concurrency).await,
        Commands::Range { start, end, output } => range(fetcher, start, end, &output).await,
    }
}

async fn crawl(fetcher: Arc<HttpFetcher>, db: &str, concurrency: usize) -> Result<()> {
    if let Some(dir) = Path::new(db).parent() {
        fs::create_dir_all(dir).ok();
    }
    let store = Arc::new(SledStore::open(db).with_context(|| format!("opening store {db}"))?);
    let cache = load_cached(store.as_ref());
    tracing::info!(stored = cache.len(), db, "store loaded");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping crawl");
            on_signal.cancel();
        }
    });

    let pool = WorkerPool::new(fetcher, store, concurrency);
    let outcome = pool.crawl(Arc::new(cache), &cancel).await?;
    tracing::info!(persisted = outcome.persisted, interrupted = outcome.interrupted, "crawl done");
    Ok(())
}

async fn range(fetcher: Arc<HttpFetcher>, start: Option<ComicId>, end: Option<ComicId>, output: &str) -> Result<()> {
    if let Some(dir) = Path::new(output).parent() {
        fs::create_dir_all(dir).ok();
    }
    let comics = fetch_range(fetcher, start, end).await?;
    let fetched_at = time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();

    let mut ids: Vec<ComicId> = comics.keys().copied().collect();
    ids.sort_unstable();
    let mut out = BufWriter::new(File::create(output).with_context(|| format!("creating {output}"))?);
    for id in ids {
        let entry = &comics[&id];
        let rec = OutComic { id, url: &entry.url, keywords: &entry.keywords, fetched_at: &fetched_at };
        serde_json::to_writer(&mut out, &rec)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    tracing::info!(written = comics.len(), output, "range written");
    Ok(())
}
