use anyhow::{Context, Result};
use clap::Parser;
use comics_core::{Catalog, SledStore};
use comics_crawler::{load_cached, CrawlFiller, HttpFetcher, DEFAULT_CONCURRENCY};
use comics_server::{build_app, AppState, DEFAULT_MAX_RESULTS};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Store directory
    #[arg(long, default_value = "./data/comics.db")]
    db: String,
    /// Base URL of the comics source
    #[arg(long, default_value = "https://xkcd.com")]
    source_url: String,
    /// Crawl concurrency used by /update
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
    /// User-Agent string sent to the source
    #[arg(long, default_value = "comics-server/0.1")]
    user_agent: String,
    /// Maximum comics returned per search
    #[arg(long, default_value_t = DEFAULT_MAX_RESULTS)]
    max_results: usize,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let store = Arc::new(SledStore::open(&args.db).with_context(|| format!("opening store {}", args.db))?);
    let entries = load_cached(store.as_ref());
    let fetcher = Arc::new(HttpFetcher::new(&args.source_url, Duration::from_secs(args.timeout_secs), &args.user_agent)?);
    let filler = Arc::new(CrawlFiller::new(fetcher, store, args.concurrency));
    let catalog = Arc::new(Catalog::new(entries, filler));

    let shutdown = CancellationToken::new();
    let app = build_app(AppState::from_env(catalog, args.max_results, shutdown.clone()));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down");
            }
            shutdown.cancel();
        })
        .await?;
    Ok(())
}
