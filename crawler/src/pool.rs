//! Streaming crawl: an open-ended forward scan over comic ids driven through
//! a fixed pool of workers.
//!
//! Ids go out in batches of `concurrency` through a bounded request queue and
//! come back through a bounded result queue of the same capacity. The next
//! batch is released only after every result of the previous one has been
//! consumed, so at most about `concurrency` requests are outstanding.
//!
//! The scan ends at the first sentinel result (a failed fetch, read as "past
//! the last comic") or on cancellation. Either way every result still in the
//! pipeline is drained and persisted before `crawl` returns. A transient
//! failure is indistinguishable from the end of the sequence.

use crate::fetcher::Fetcher;
use comics_core::{ComicId, Entry, EntryUniverse, Store, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CONCURRENCY: usize = 500;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("persisting comic {id}: {source}")]
    Store {
        id: ComicId,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// Every id the crawl produced a result for; failed ids hold the sentinel.
    pub entries: EntryUniverse,
    /// Entries written to the store during this crawl.
    pub persisted: usize,
    pub interrupted: bool,
}

struct Fetched {
    id: ComicId,
    entry: Entry,
    cached: bool,
}

pub struct WorkerPool {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn Store>,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn Store>, concurrency: usize) -> Self {
        Self { fetcher, store, concurrency: concurrency.max(1) }
    }

    pub fn concurrency(&self) -> usize { self.concurrency }

    /// Scan forward from id 1. Ids whose cached entry has keywords are served
    /// from `cache` without a request and are not written again.
    pub async fn crawl(&self, cache: Arc<EntryUniverse>, cancel: &CancellationToken) -> Result<CrawlOutcome, CrawlError> {
        let n = self.concurrency;
        let (id_tx, id_rx) = mpsc::channel::<ComicId>(n);
        let (result_tx, mut result_rx) = mpsc::channel::<Fetched>(n);
        let id_rx = Arc::new(Mutex::new(id_rx));

        let mut workers = JoinSet::new();
        for _ in 0..n {
            workers.spawn(worker(
                self.fetcher.clone(),
                cache.clone(),
                id_rx.clone(),
                result_tx.clone(),
                cancel.clone(),
            ));
        }
        drop(result_tx);
        tracing::info!(concurrency = n, cached = cache.len(), "crawl started");

        let mut outcome = CrawlOutcome::default();
        let mut next_id: ComicId = 1;
        let mut received = 0usize;
        loop {
            if received % n == 0 {
                if cancel.is_cancelled() || !enqueue_batch(&id_tx, &mut next_id, n, cancel).await {
                    break;
                }
            }
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = result_rx.recv() => match next {
                    Some(fetched) => fetched,
                    None => break,
                },
            };
            received += 1;
            let stop = fetched.entry.is_sentinel() || cancel.is_cancelled();
            self.record(fetched, &mut outcome)?;
            if stop {
                break;
            }
        }

        // No more ids; workers finish what they hold and the result queue closes.
        drop(id_tx);
        outcome.interrupted = cancel.is_cancelled();
        if outcome.interrupted {
            tracing::warn!("crawl interrupted, flushing buffered results");
        }
        while let Some(fetched) = result_rx.recv().await {
            self.record(fetched, &mut outcome)?;
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(err) = joined {
                tracing::warn!(error = %err, "crawl worker failed");
            }
        }

        tracing::info!(
            persisted = outcome.persisted,
            seen = outcome.entries.len(),
            last_enqueued = next_id.saturating_sub(1),
            interrupted = outcome.interrupted,
            "crawl finished"
        );
        Ok(outcome)
    }

    fn record(&self, fetched: Fetched, outcome: &mut CrawlOutcome) -> Result<(), CrawlError> {
        let Fetched { id, entry, cached } = fetched;
        if !entry.is_sentinel() && !cached {
            self.store.write_one(id, &entry).map_err(|source| CrawlError::Store { id, source })?;
            outcome.persisted += 1;
            if outcome.persisted % 100 == 0 {
                tracing::info!(persisted = outcome.persisted, last = id, "crawl progress");
            }
        }
        outcome.entries.insert(id, entry);
        Ok(())
    }
}

/// Push the next `n` ids. Returns false if cancelled or the workers are gone.
async fn enqueue_batch(tx: &mpsc::Sender<ComicId>, next_id: &mut ComicId, n: usize, cancel: &CancellationToken) -> bool {
    for _ in 0..n {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            sent = tx.send(*next_id) => if sent.is_err() { return false; },
        }
        *next_id += 1;
    }
    true
}

async fn worker(
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<EntryUniverse>,
    ids: Arc<Mutex<mpsc::Receiver<ComicId>>>,
    results: mpsc::Sender<Fetched>,
    cancel: CancellationToken,
) {
    loop {
        let next = ids.lock().await.recv().await;
        let Some(id) = next else { break };
        // ids still queued at cancellation are never requested
        if cancel.is_cancelled() {
            break;
        }
        let fetched = match cache.get(&id) {
            Some(entry) if !entry.keywords.is_empty() => Fetched { id, entry: entry.clone(), cached: true },
            _ => match fetcher.fetch(id).await {
                Ok((num, entry)) => Fetched { id: num, entry, cached: false },
                Err(err) => {
                    tracing::debug!(id, error = %err, "comic fetch failed");
                    Fetched { id, entry: Entry::sentinel(), cached: false }
                }
            },
        };
        if results.send(fetched).await.is_err() {
            break;
        }
    }
}
