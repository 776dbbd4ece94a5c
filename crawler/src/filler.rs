use crate::fetcher::Fetcher;
use crate::pool::WorkerPool;
use anyhow::bail;
use async_trait::async_trait;
use comics_core::{EntryUniverse, Filler, Store};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Stored universe, or an empty one if the store cannot be read.
pub fn load_cached(store: &dyn Store) -> EntryUniverse {
    match store.read() {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(error = %err, "reading stored comics failed, starting empty");
            EntryUniverse::new()
        }
    }
}

/// Full refresh: stored comics plus a streaming crawl for everything missing.
pub struct CrawlFiller {
    pool: WorkerPool,
    store: Arc<dyn Store>,
}

impl CrawlFiller {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn Store>, concurrency: usize) -> Self {
        Self { pool: WorkerPool::new(fetcher, store.clone(), concurrency), store }
    }
}

#[async_trait]
impl Filler for CrawlFiller {
    async fn fill_missed_comics(&self, cancel: &CancellationToken) -> anyhow::Result<EntryUniverse> {
        let cache = Arc::new(load_cached(self.store.as_ref()));
        let outcome = self.pool.crawl(cache.clone(), cancel).await?;
        if outcome.interrupted {
            bail!("crawl interrupted after persisting {} comics", outcome.persisted);
        }

        let mut entries = Arc::try_unwrap(cache).unwrap_or_else(|shared| (*shared).clone());
        entries.extend(outcome.entries.into_iter().filter(|(_, entry)| !entry.is_sentinel()));
        Ok(entries)
    }
}
